mod bulk;
mod editing;
mod navigation;
mod results;
mod terminal;

use ratatui::prelude::Size;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::App;
use crate::api::{AddItemsRequest, ApiError, CliCommandResponse, UserInfo, WorksheetApi, WorksheetPayload};
use crate::core::bulk::{execute_bulk, BulkCommand, BulkOutcome};
use crate::core::dialog::DialogInput;
use crate::core::focus::ReloadIntent;
use crate::core::poller::PollUpdate;

#[derive(Debug)]
pub enum AppAction {
    // Navigation
    MoveUp,
    MoveDown,
    MoveTop,
    MoveEnd,
    OpenFocused,
    OpenFocusedExternally,
    ToggleSelection,
    InsertFocusedUuid,
    ToggleWidth,
    Refresh,
    Back,
    Forward,
    ShowHelp,
    CloseModal,
    OpenWorksheet {
        uuid: String,
    },
    Quit,

    // Editing
    EnterSource,
    SaveSource,
    ExitSource,
    StartInsertText,
    StartUpload,
    StartNewRun,
    StartRerun,
    EditTitle,
    EditBundleName,
    SubmitPrompt,
    CancelPrompt,
    DeleteFocused,
    DownloadFocused,

    // Bulk, dialogs and clipboard
    Copy,
    Cut,
    Paste,
    Kill,
    Detach,
    DeleteWorksheet,
    ShowCopy,
    ShowPaste,
    Dialog {
        input: DialogInput,
    },

    // Terminal
    FocusTerminal,
    ToggleTerminal,
    FocusSearch,
    LeaveTerminal,
    TerminalSubmit,
    TerminalComplete,
    TerminalHistory {
        older: bool,
    },

    // Results of AppCommands
    WorksheetLoaded {
        uuid: String,
        intent: ReloadIntent,
        result: Result<WorksheetPayload, ApiError>,
    },
    PollResult {
        update: PollUpdate,
    },
    ItemsAdded {
        uuid: String,
        intent: ReloadIntent,
        result: Result<(), ApiError>,
    },
    SourceSaved {
        uuid: String,
        raw_line: usize,
        result: Result<(), ApiError>,
    },
    WorksheetDeleted {
        uuid: String,
        result: Result<(), ApiError>,
    },
    BulkFinished {
        uuid: String,
        command: BulkCommand,
        outcome: BulkOutcome,
    },
    CommandFinished {
        uuid: String,
        command: String,
        intent: ReloadIntent,
        result: Result<CliCommandResponse, ApiError>,
    },
    CompletionsLoaded {
        result: Result<CliCommandResponse, ApiError>,
    },
    FieldsUpdated {
        uuid: String,
        result: Result<(), ApiError>,
    },
    UserLoaded {
        result: Result<UserInfo, ApiError>,
    },
    SetToast {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AppActionContext {
    pub term_width: u16,
    pub term_height: u16,
}

pub struct AppActionEnvelope {
    pub action: AppAction,
    pub context: AppActionContext,
}

#[derive(Clone)]
pub struct AppActionDispatcher {
    tx: mpsc::UnboundedSender<AppActionEnvelope>,
}

impl AppActionDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<AppActionEnvelope>) -> Self {
        Self { tx }
    }

    pub fn dispatch_many<I>(&self, actions: I, ctx: AppActionContext)
    where
        I: IntoIterator<Item = AppAction>,
    {
        for action in actions.into_iter() {
            let _ = self.tx.send(AppActionEnvelope {
                action,
                context: ctx,
            });
        }
    }

    /// Send one action that does not depend on the terminal size.
    pub fn dispatch(&self, action: AppAction) {
        self.dispatch_many([action], AppActionContext::default());
    }
}

/// Async work requested by an action. Every variant names the worksheet it
/// was issued for so the result can be checked for staleness.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    FetchWorksheet {
        uuid: String,
        intent: ReloadIntent,
    },
    AddItems {
        uuid: String,
        request: AddItemsRequest,
        intent: ReloadIntent,
    },
    SaveSource {
        uuid: String,
        lines: Vec<String>,
        raw_line: usize,
    },
    DeleteWorksheet {
        uuid: String,
    },
    RunBulk {
        uuid: String,
        command: BulkCommand,
        uuids: Vec<String>,
        force: bool,
    },
    ExecuteCommand {
        uuid: String,
        command: String,
        intent: ReloadIntent,
    },
    Autocomplete {
        uuid: String,
        command: String,
    },
    UpdateWorksheetFields {
        uuid: String,
        attributes: Map<String, Value>,
    },
    UpdateBundleMetadata {
        uuid: String,
        bundle_uuid: String,
        metadata: Map<String, Value>,
    },
    CopyToSystemClipboard {
        text: String,
    },
    FetchUser,
}

pub fn apply_actions(
    app: &mut App,
    envelopes: impl IntoIterator<Item = AppActionEnvelope>,
) -> Vec<AppCommand> {
    let mut commands = Vec::new();
    for envelope in envelopes {
        if let Some(cmd) = apply_action(app, envelope.action, envelope.context) {
            commands.push(cmd);
        }
    }
    commands
}

pub fn apply_action(app: &mut App, action: AppAction, ctx: AppActionContext) -> Option<AppCommand> {
    if ctx.term_width > 0 && ctx.term_height > 0 {
        app.ui.last_term_size = Size::new(ctx.term_width, ctx.term_height);
    }
    match action {
        AppAction::MoveUp
        | AppAction::MoveDown
        | AppAction::MoveTop
        | AppAction::MoveEnd
        | AppAction::OpenFocused
        | AppAction::OpenFocusedExternally
        | AppAction::ToggleSelection
        | AppAction::InsertFocusedUuid
        | AppAction::ToggleWidth
        | AppAction::Refresh
        | AppAction::Back
        | AppAction::Forward
        | AppAction::ShowHelp
        | AppAction::CloseModal
        | AppAction::OpenWorksheet { .. }
        | AppAction::Quit => navigation::handle_navigation_action(app, action),

        AppAction::EnterSource
        | AppAction::SaveSource
        | AppAction::ExitSource
        | AppAction::StartInsertText
        | AppAction::StartUpload
        | AppAction::StartNewRun
        | AppAction::StartRerun
        | AppAction::EditTitle
        | AppAction::EditBundleName
        | AppAction::SubmitPrompt
        | AppAction::CancelPrompt
        | AppAction::DeleteFocused
        | AppAction::DownloadFocused => editing::handle_editing_action(app, action),

        AppAction::Copy
        | AppAction::Cut
        | AppAction::Paste
        | AppAction::Kill
        | AppAction::Detach
        | AppAction::DeleteWorksheet
        | AppAction::ShowCopy
        | AppAction::ShowPaste
        | AppAction::Dialog { .. } => bulk::handle_bulk_action(app, action),

        AppAction::FocusTerminal
        | AppAction::ToggleTerminal
        | AppAction::FocusSearch
        | AppAction::LeaveTerminal
        | AppAction::TerminalSubmit
        | AppAction::TerminalComplete
        | AppAction::TerminalHistory { .. } => terminal::handle_terminal_action(app, action),

        AppAction::WorksheetLoaded { .. }
        | AppAction::PollResult { .. }
        | AppAction::ItemsAdded { .. }
        | AppAction::SourceSaved { .. }
        | AppAction::WorksheetDeleted { .. }
        | AppAction::BulkFinished { .. }
        | AppAction::CommandFinished { .. }
        | AppAction::CompletionsLoaded { .. }
        | AppAction::FieldsUpdated { .. }
        | AppAction::UserLoaded { .. }
        | AppAction::SetToast { .. } => results::handle_result_action(app, action),
    }
}

/// Run one command against the server. The returned action carries the
/// outcome back to [`apply_action`].
pub async fn execute(api: &dyn WorksheetApi, command: AppCommand) -> Option<AppAction> {
    match command {
        AppCommand::FetchWorksheet { uuid, intent } => {
            let result = api.fetch_worksheet(&uuid, false).await;
            Some(AppAction::WorksheetLoaded {
                uuid,
                intent,
                result,
            })
        }
        AppCommand::AddItems {
            uuid,
            request,
            intent,
        } => {
            let result = api.add_items(&uuid, &request).await;
            Some(AppAction::ItemsAdded {
                uuid,
                intent,
                result,
            })
        }
        AppCommand::SaveSource {
            uuid,
            lines,
            raw_line,
        } => {
            let result = api.save_raw_source(&uuid, &lines).await;
            Some(AppAction::SourceSaved {
                uuid,
                raw_line,
                result,
            })
        }
        AppCommand::DeleteWorksheet { uuid } => {
            let result = api.delete_worksheet(&uuid).await;
            Some(AppAction::WorksheetDeleted { uuid, result })
        }
        AppCommand::RunBulk {
            uuid,
            command,
            uuids,
            force,
        } => {
            let outcome = execute_bulk(api, &uuid, command, &uuids, force).await;
            Some(AppAction::BulkFinished {
                uuid,
                command,
                outcome,
            })
        }
        AppCommand::ExecuteCommand {
            uuid,
            command,
            intent,
        } => {
            let result = api.execute_command(&uuid, &command, false).await;
            Some(AppAction::CommandFinished {
                uuid,
                command,
                intent,
                result,
            })
        }
        AppCommand::Autocomplete { uuid, command } => {
            let result = api.execute_command(&uuid, &command, true).await;
            Some(AppAction::CompletionsLoaded { result })
        }
        AppCommand::UpdateWorksheetFields { uuid, attributes } => {
            let result = api.update_worksheet_fields(&uuid, attributes).await;
            Some(AppAction::FieldsUpdated { uuid, result })
        }
        AppCommand::UpdateBundleMetadata {
            uuid,
            bundle_uuid,
            metadata,
        } => {
            let result = api.update_bundle_metadata(&bundle_uuid, metadata).await;
            Some(AppAction::FieldsUpdated { uuid, result })
        }
        AppCommand::CopyToSystemClipboard { text } => {
            match crate::utils::clipboard::copy_to_clipboard(&text).await {
                Ok(()) => None,
                Err(err) => Some(AppAction::SetToast {
                    message: format!("Clipboard unavailable: {err}"),
                }),
            }
        }
        AppCommand::FetchUser => {
            let result = api.fetch_user().await;
            Some(AppAction::UserLoaded { result })
        }
    }
}
