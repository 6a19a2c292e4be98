use tracing::debug;

use super::{App, AppAction, AppCommand};
use crate::core::focus::ReloadIntent;

pub(super) fn handle_terminal_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::FocusTerminal => {
            app.ui.focus_terminal();
            None
        }
        AppAction::ToggleTerminal => {
            app.ui.toggle_terminal();
            None
        }
        AppAction::FocusSearch => {
            app.ui.focus_terminal();
            if app.ui.terminal.input_text().trim().is_empty() {
                app.ui.terminal.set_input("search ");
            }
            None
        }
        AppAction::LeaveTerminal => {
            app.ui.terminal.focused = false;
            None
        }
        AppAction::TerminalSubmit => submit(app),
        AppAction::TerminalComplete => {
            let command = app.ui.terminal.input_text();
            if command.trim().is_empty() {
                return None;
            }
            let uuid = app.current_uuid()?;
            Some(AppCommand::Autocomplete { uuid, command })
        }
        AppAction::TerminalHistory { older } => {
            app.ui.terminal.recall(older);
            None
        }
        _ => None,
    }
}

fn submit(app: &mut App) -> Option<AppCommand> {
    let command = app.ui.terminal.input_text().trim().to_string();
    if command.is_empty() {
        return None;
    }
    let uuid = app.current_uuid()?;
    debug!(%command, worksheet = %uuid, "Submitting terminal command");
    app.ui.terminal.record_history(&command);
    app.ui.terminal.push_output(format!("> {command}"));
    app.ui.terminal.set_input("");
    Some(AppCommand::ExecuteCommand {
        uuid,
        command,
        intent: ReloadIntent::Relocate {
            after_sort_key: None,
        },
    })
}
