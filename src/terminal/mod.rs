pub mod events;
pub mod state;
pub mod ui;

use anyhow::{Result, anyhow};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;

use crate::controller::Controller;
use crate::terminal::events::{KeyOutcome, handle_key, perform};
use crate::terminal::state::AppState;

pub fn run_tui(controller: &Controller<'_>, state: AppState) -> Result<()> {
    color_eyre::install().map_err(|e| anyhow!(e.to_string()))?;

    let terminal = ratatui::init();
    let result = run(terminal, controller, state);

    ratatui::restore();

    result
}

fn run(
    mut terminal: DefaultTerminal,
    controller: &Controller<'_>,
    mut state: AppState,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::render(f, &state))?;
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match handle_key(key, &mut state) {
            KeyOutcome::Quit => break,
            KeyOutcome::Continue => {}
            KeyOutcome::Run(action) => {
                // actions block, so draw the busy marker first
                state.busy = Some(action.label());
                terminal.draw(|f| ui::render(f, &state))?;
                perform(action, &mut state, controller);
                state.busy = None;
            }
        }
    }
    Ok(())
}
