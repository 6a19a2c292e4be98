//! Bulk commands run against the current selection.
//!
//! A bulk command is an ordinary server CLI line whose positional arguments
//! are the selected bundle uuids. The runner only builds the line, executes
//! it and classifies the result; the controller owns the toast, the dialog
//! and the follow-up reload.

use std::fmt;

use tracing::{debug, info};

use crate::api::WorksheetApi;
use crate::core::dialog::DialogState;
use crate::core::error::ErrorKind;
use crate::core::focus::ReloadIntent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkCommand {
    Rm,
    Kill,
    Detach,
}

impl BulkCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            BulkCommand::Rm => "rm",
            BulkCommand::Kill => "kill",
            BulkCommand::Detach => "detach",
        }
    }

    pub fn confirm_dialog(self) -> DialogState {
        match self {
            BulkCommand::Rm => DialogState::confirm_delete(),
            BulkCommand::Kill => DialogState::ConfirmKill,
            BulkCommand::Detach => DialogState::ConfirmDetach,
        }
    }

    pub fn toast_text(self) -> String {
        format!("Executing {self} command")
    }

    /// Focus policy for the reload that follows a successful run. `rm` that
    /// printed nothing removed nothing, so the layout is unchanged.
    pub fn reload_intent(self, output: &str) -> ReloadIntent {
        match self {
            BulkCommand::Rm if output.trim().is_empty() => ReloadIntent::KeepFocus,
            BulkCommand::Rm | BulkCommand::Detach => ReloadIntent::Relocate {
                after_sort_key: None,
            },
            BulkCommand::Kill => ReloadIntent::KeepFocus,
        }
    }
}

impl fmt::Display for BulkCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `rm [--force] U1 U2…`, `kill U1…`, `detach U1…`. `force` is ignored for
/// anything but `rm`.
pub fn build_command(command: BulkCommand, uuids: &[String], force: bool) -> String {
    let mut parts = vec![command.as_str().to_string()];
    if force && command == BulkCommand::Rm {
        parts.push("--force".to_string());
    }
    parts.extend(uuids.iter().cloned());
    parts.join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    Succeeded {
        output: String,
        intent: ReloadIntent,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

/// Run `command` on the server for `worksheet_uuid`.
pub async fn execute_bulk(
    api: &dyn WorksheetApi,
    worksheet_uuid: &str,
    command: BulkCommand,
    uuids: &[String],
    force: bool,
) -> BulkOutcome {
    let line = build_command(command, uuids, force);
    info!(command = %line, worksheet = %worksheet_uuid, "Running bulk command");
    match api.execute_command(worksheet_uuid, &line, false).await {
        Ok(response) => match response.exception {
            Some(exception) if !exception.is_empty() => {
                debug!(command = %command, %exception, "Bulk command failed");
                BulkOutcome::Failed {
                    kind: ErrorKind::CommandFailed,
                    message: exception,
                }
            }
            _ => BulkOutcome::Succeeded {
                intent: command.reload_intent(&response.output),
                output: response.output,
            },
        },
        Err(err) => BulkOutcome::Failed {
            kind: err.kind(),
            message: err.user_message(),
        },
    }
}
