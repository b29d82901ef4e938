use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::terminal::state::{AppState, Focus};

fn border(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn field<'a>(title: &'a str, value: &'a str, focused: bool) -> Paragraph<'a> {
    Paragraph::new(value)
        .block(
            Block::default()
                .title(format!(" {title} "))
                .borders(Borders::ALL)
                .border_style(border(focused)),
        )
        .wrap(Wrap { trim: false })
}

pub fn render(f: &mut Frame, state: &AppState) {
    let [main, footer] = Layout::vertical([Constraint::Min(0), Constraint::Length(1)])
        .margin(1)
        .areas(f.area());

    let [login, from, subject, body, sentiment, reply] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Percentage(45),
        Constraint::Length(3),
        Constraint::Fill(1),
    ])
    .areas(main);

    let [user_area, password_area] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(login);
    let password = state.masked_password();
    f.render_widget(
        field("User", &state.user, state.focus == Focus::User),
        user_area,
    );
    f.render_widget(
        field("Password", &password, state.focus == Focus::Password),
        password_area,
    );

    f.render_widget(field("From", &state.view.from, false), from);
    f.render_widget(field("Subject", &state.view.subject, false), subject);

    let body_title = format!("Body (email {})", state.view.index + 1);
    f.render_widget(field(&body_title, &state.view.body, false), body);

    let [label_area, score_area] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
            .areas(sentiment);
    f.render_widget(field("Sentiment", &state.sentiment, false), label_area);
    f.render_widget(field("Score", &state.score, false), score_area);

    f.render_widget(
        field("Reply", &state.reply, state.focus == Focus::Reply),
        reply,
    );

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let hint = Paragraph::new(Line::from(vec![
        Span::styled("F2", bold),
        Span::raw(" fetch  "),
        Span::styled("F3", bold),
        Span::raw(" load  "),
        Span::styled("F5/F6", bold),
        Span::raw(" prev/next  "),
        Span::styled("F7", bold),
        Span::raw(" generate  "),
        Span::styled("F8", bold),
        Span::raw(" reply  "),
        Span::styled("Tab", bold),
        Span::raw(" focus  "),
        Span::styled("Esc", bold),
        Span::raw(" quit"),
    ]));
    f.render_widget(hint, footer);

    if let Some(label) = state.busy {
        render_popup(f, " Working ".to_string(), label, Color::Cyan);
    } else if let Some(p) = &state.popup {
        let color = if p.is_error { Color::Red } else { Color::Green };
        let title = format!(" {} (Enter to close) ", p.title);
        render_popup(f, title, &p.message, color);
    }
}

fn render_popup(f: &mut Frame, title: String, message: &str, color: Color) {
    let area = centered(f.area(), 60, 7);
    f.render_widget(Clear, area);
    let p = Paragraph::new(message)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

fn centered(area: Rect, percent_x: u16, height: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [cell] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(row);
    cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{Terminal, backend::TestBackend};

    fn screen(state: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|f| render(f, state)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn busy_popup_cannot_be_dismissed() {
        let mut state = AppState::new("me", "");
        state.busy = Some("Generating reply");
        let text = screen(&state);
        assert!(text.contains("Working"));
        assert!(text.contains("Generating reply"));
        assert!(!text.contains("Enter to close"));
    }

    #[test]
    fn status_popup_says_how_to_close() {
        let mut state = AppState::new("me", "");
        state.show_status("Sent");
        assert!(screen(&state).contains("Enter to close"));
    }
}
