use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::warn;

use crate::controller::{Controller, Direction};
use crate::secrets;
use crate::terminal::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Fetch,
    Load,
    Prev,
    Next,
    Generate,
    Reply,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Action::Fetch => "Fetching emails...",
            Action::Load => "Loading emails...",
            Action::Prev => "Previous email...",
            Action::Next => "Next email...",
            Action::Generate => "Generating response...",
            Action::Reply => "Sending reply...",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Quit,
    Run(Action),
}

pub fn handle_key(key: KeyEvent, state: &mut AppState) -> KeyOutcome {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyOutcome::Quit;
    }

    if state.popup.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            state.dismiss_popup();
        }
        return KeyOutcome::Continue;
    }

    match key.code {
        KeyCode::Esc => return KeyOutcome::Quit,
        KeyCode::F(2) => return KeyOutcome::Run(Action::Fetch),
        KeyCode::F(3) => return KeyOutcome::Run(Action::Load),
        KeyCode::F(5) => return KeyOutcome::Run(Action::Prev),
        KeyCode::F(6) => return KeyOutcome::Run(Action::Next),
        KeyCode::F(7) => return KeyOutcome::Run(Action::Generate),
        KeyCode::F(8) => return KeyOutcome::Run(Action::Reply),

        KeyCode::Tab => state.focus_next(),
        KeyCode::BackTab => state.focus_prev(),
        KeyCode::Enter => state.insert_newline(),
        KeyCode::Backspace => state.backspace(),
        KeyCode::Char(c) => state.insert_char(c),
        _ => {}
    }
    KeyOutcome::Continue
}

/// Run one action against the controller. Failures end up in the popup and
/// leave the visible state as it was.
pub fn perform(action: Action, state: &mut AppState, controller: &Controller<'_>) {
    match action {
        Action::Fetch => {
            let creds = state.credentials();
            match controller.fetch(&creds) {
                Ok(msg) => {
                    state.show_status(msg);
                    if state.remember_password && !creds.user.is_empty() {
                        if let Err(e) = secrets::save_password(&creds.user, &creds.password) {
                            warn!("could not save password to keyring: {e}");
                        }
                    }
                }
                Err(e) => state.show_error(&e),
            }
        }
        Action::Load => match controller.load() {
            Ok(view) => state.show_view(view),
            Err(e) => state.show_error(&e),
        },
        Action::Prev | Action::Next => {
            let direction = if action == Action::Next {
                Direction::Next
            } else {
                Direction::Prev
            };
            match controller.navigate(direction, state.view.index) {
                Ok(view) => state.show_view(view),
                Err(e) => state.show_error(&e),
            }
        }
        Action::Generate => {
            match controller.generate(&state.view.body, &state.view.subject) {
                Ok(ctx) => state.apply_reply_context(ctx),
                Err(e) => state.show_error(&e),
            }
        }
        Action::Reply => {
            let creds = state.credentials();
            match controller.reply(&creds, state.view.index, &state.reply) {
                Ok(outcome) => {
                    state.show_status(outcome.message);
                    state.show_view(outcome.view);
                    state.clear_reply();
                }
                Err(e) => state.show_error(&e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::email::{Credentials, EmailRecord, EmailView, ReplyContext, Sentiment};
    use crate::mail::MailGateway;
    use crate::rag::responder::ResponseGenerator;
    use crate::store::repo::EmailCache;
    use crate::store::xlsx::XlsxCache;
    use anyhow::{Result, anyhow};
    use std::cell::RefCell;

    struct Inbox(Vec<EmailRecord>, RefCell<Vec<String>>);

    impl MailGateway for Inbox {
        fn fetch_unseen(&self, creds: &Credentials) -> Result<Vec<EmailRecord>> {
            if creds.password.is_empty() {
                return Err(anyhow!("connection error: Login failed"));
            }
            Ok(self.0.clone())
        }

        fn reply(&self, _creds: &Credentials, message_id: &str, _body: &str) -> Result<String> {
            self.1.borrow_mut().push(message_id.to_string());
            Ok("Reply sent successfully.".to_string())
        }
    }

    struct Offline;

    impl ResponseGenerator for Offline {
        fn generate(&self, _body: &str, _subject: &str) -> Result<ReplyContext> {
            Err(anyhow!("model server unreachable"))
        }
    }

    struct Polite;

    impl ResponseGenerator for Polite {
        fn generate(&self, _body: &str, subject: &str) -> Result<ReplyContext> {
            Ok(ReplyContext {
                sentiment: Sentiment {
                    label: "Positive".to_string(),
                    score: 0.75,
                },
                reply: format!("About {subject}: thank you."),
            })
        }
    }

    fn record(n: u32) -> EmailRecord {
        EmailRecord {
            email_id: n.to_string(),
            message_id: format!("<m{n}@example.com>"),
            from: format!("user{n}@example.com"),
            subject: format!("Subject {n}"),
            body: format!("Body {n}"),
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn function_keys_map_to_actions() {
        let mut s = AppState::default();
        assert_eq!(handle_key(key(KeyCode::F(2)), &mut s), KeyOutcome::Run(Action::Fetch));
        assert_eq!(handle_key(key(KeyCode::F(6)), &mut s), KeyOutcome::Run(Action::Next));
        assert_eq!(handle_key(key(KeyCode::F(8)), &mut s), KeyOutcome::Run(Action::Reply));
        assert_eq!(handle_key(key(KeyCode::Esc), &mut s), KeyOutcome::Quit);
        assert_eq!(
            handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), &mut s),
            KeyOutcome::Quit
        );
    }

    #[test]
    fn popup_swallows_keys_until_dismissed() {
        let mut s = AppState::default();
        s.show_status("done");
        assert_eq!(handle_key(key(KeyCode::F(2)), &mut s), KeyOutcome::Continue);
        assert_eq!(handle_key(key(KeyCode::Char('x')), &mut s), KeyOutcome::Continue);
        assert!(s.user.is_empty());
        handle_key(key(KeyCode::Enter), &mut s);
        assert!(s.popup.is_none());
    }

    #[test]
    fn fetch_load_navigate_and_reply() {
        let dir = tempfile::tempdir().unwrap();
        let cache = XlsxCache::new(dir.path().join("emails.xlsx"));
        let mail = Inbox(vec![record(1), record(2)], RefCell::default());
        let c = Controller::new(&cache, &mail, &Polite);
        let mut s = AppState::new("me@example.com", "secret");

        perform(Action::Fetch, &mut s, &c);
        assert!(!s.popup.as_ref().unwrap().is_error);
        assert_eq!(cache.all().unwrap().len(), 2);
        s.dismiss_popup();

        perform(Action::Load, &mut s, &c);
        assert_eq!(s.view, EmailView::of(&record(1), 0));
        perform(Action::Next, &mut s, &c);
        perform(Action::Next, &mut s, &c);
        assert_eq!(s.view.index, 1);

        perform(Action::Generate, &mut s, &c);
        assert_eq!(s.reply, "About Subject 2: thank you.");
        assert_eq!(s.sentiment, "Positive");

        perform(Action::Reply, &mut s, &c);
        assert_eq!(*mail.1.borrow(), ["<m2@example.com>"]);
        assert_eq!(s.view.index, 1);
        assert!(s.reply.is_empty() && s.sentiment.is_empty());
        assert_eq!(
            s.popup.as_ref().map(|p| p.message.as_str()),
            Some("Reply sent successfully.")
        );
    }

    #[test]
    fn failures_keep_the_prior_state() {
        let dir = tempfile::tempdir().unwrap();
        let cache = XlsxCache::new(dir.path().join("emails.xlsx"));
        cache.replace_all(&[record(1)]).unwrap();
        let mail = Inbox(vec![record(7)], RefCell::default());
        let c = Controller::new(&cache, &mail, &Offline);
        let mut s = AppState::new("me@example.com", "");

        perform(Action::Load, &mut s, &c);
        s.reply = "draft".to_string();

        perform(Action::Fetch, &mut s, &c);
        assert!(s.popup.as_ref().unwrap().is_error);
        assert_eq!(cache.all().unwrap(), vec![record(1)]);
        s.dismiss_popup();

        perform(Action::Generate, &mut s, &c);
        let popup = s.popup.clone().unwrap();
        assert!(popup.is_error);
        assert!(popup.message.contains("model server unreachable"));
        assert_eq!(s.reply, "draft");
        assert_eq!(s.view, EmailView::of(&record(1), 0));
    }
}
