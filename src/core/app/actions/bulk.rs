use tracing::{debug, warn};

use super::{App, AppAction, AppCommand};
use crate::api::AddItemsRequest;
use crate::core::bulk::BulkCommand;
use crate::core::dialog::{Confirmation, DialogInput, DialogOutcome, DialogState};
use crate::core::focus::ReloadIntent;
use crate::core::selection::parse_instance_id;

const NOTHING_SELECTED: &str = "No bundles selected";

pub(super) fn handle_bulk_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::Copy => {
            copy_selection(app);
            None
        }
        AppAction::Cut => cut_selection(app),
        AppAction::Paste => paste(app),
        AppAction::Kill => {
            open_bulk_dialog(app, BulkCommand::Kill);
            None
        }
        AppAction::Detach => {
            open_bulk_dialog(app, BulkCommand::Detach);
            None
        }
        AppAction::DeleteWorksheet => {
            if app.can_edit() {
                app.store.set_dialog(DialogState::ConfirmDeleteWorksheet);
            } else {
                app.ui
                    .show_timed_toast("You do not have permission to delete this worksheet");
            }
            None
        }
        AppAction::ShowCopy => show_copy(app),
        AppAction::ShowPaste => {
            show_paste(app);
            None
        }
        AppAction::Dialog { input } => handle_dialog_input(app, input),
        _ => None,
    }
}

fn open_bulk_dialog(app: &mut App, command: BulkCommand) {
    if app.selection.is_empty() {
        app.ui.show_timed_toast(NOTHING_SELECTED);
        return;
    }
    app.store.set_dialog(command.confirm_dialog());
}

fn copy_selection(app: &mut App) {
    let entries = app.clipboard_entries();
    if entries.is_empty() {
        app.ui.show_timed_toast(NOTHING_SELECTED);
        return;
    }
    match app.clipboard.copy(&entries) {
        Ok(()) => {
            app.ui.show_paste_button = true;
            app.ui
                .show_timed_toast(format!("Copied {} bundle(s)", entries.len()));
            app.clear_selection();
        }
        Err(err) => {
            warn!(error = %err, "Failed to write clipboard");
            app.ui.show_timed_toast(format!("Copy failed: {err}"));
        }
    }
}

/// Item ids of every checked row, or of the focused row when nothing is
/// checked.
fn cut_item_ids(app: &App) -> Vec<i64> {
    let Some(worksheet) = app.worksheet() else {
        return Vec::new();
    };
    if app.selection.is_empty() {
        return app
            .focused_bundle()
            .and_then(|row| row.item_id)
            .into_iter()
            .collect();
    }
    let mut ids = Vec::new();
    for (uuid, instance) in app.selection.checked_instances() {
        let Some((block, sub)) = parse_instance_id(&instance) else {
            continue;
        };
        match worksheet.bundle_row(block, sub) {
            Some(row) if row.uuid == uuid => ids.extend(row.item_id),
            _ => debug!(%uuid, %instance, "Checked row no longer rendered"),
        }
    }
    ids
}

fn cut_selection(app: &mut App) -> Option<AppCommand> {
    if !app.can_edit() {
        app.ui
            .show_timed_toast("You do not have permission to edit this worksheet");
        return None;
    }
    let uuid = app.current_uuid()?;
    let entries = app.clipboard_entries();
    let item_ids = cut_item_ids(app);
    if entries.is_empty() || item_ids.is_empty() {
        app.ui.show_timed_toast(NOTHING_SELECTED);
        return None;
    }
    match app.clipboard.cut(&entries, item_ids) {
        Ok(request) => {
            app.ui.show_paste_button = true;
            app.ui
                .show_timed_toast(format!("Cut {} bundle(s)", entries.len()));
            app.clear_selection();
            Some(AppCommand::AddItems {
                uuid,
                request,
                intent: ReloadIntent::Relocate {
                    after_sort_key: None,
                },
            })
        }
        Err(err) => {
            warn!(error = %err, "Failed to write clipboard");
            app.ui.show_timed_toast(format!("Cut failed: {err}"));
            None
        }
    }
}

fn paste(app: &mut App) -> Option<AppCommand> {
    if !app.can_edit() {
        app.ui
            .show_timed_toast("You do not have permission to edit this worksheet");
        return None;
    }
    let uuid = app.current_uuid()?;
    let after_sort_key = app.paste_sort_key();
    match app.clipboard.paste_request(Some(after_sort_key)) {
        Ok(Some(request)) => {
            debug!(items = request.items.len(), after_sort_key, "Pasting bundles");
            Some(AppCommand::AddItems {
                uuid,
                request,
                intent: ReloadIntent::Relocate {
                    after_sort_key: Some(after_sort_key),
                },
            })
        }
        Ok(None) => {
            app.ui.show_paste_button = false;
            app.ui.show_timed_toast("Clipboard is empty");
            None
        }
        Err(err) => {
            app.ui.show_timed_toast(format!("Paste failed: {err}"));
            None
        }
    }
}

fn show_copy(app: &mut App) -> Option<AppCommand> {
    let entries = app.clipboard_entries();
    if entries.is_empty() {
        app.ui.show_timed_toast(NOTHING_SELECTED);
        return None;
    }
    let text = entries
        .iter()
        .map(|entry| entry.uuid.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    app.store.set_dialog(DialogState::ShowCopy { text: text.clone() });
    Some(AppCommand::CopyToSystemClipboard { text })
}

fn show_paste(app: &mut App) {
    match app.clipboard.entries() {
        Ok(entries) if !entries.is_empty() => {
            app.store.set_dialog(DialogState::ShowPaste { entries });
        }
        Ok(_) => app.ui.show_timed_toast("Clipboard is empty"),
        Err(err) => app.ui.show_timed_toast(format!("Clipboard unreadable: {err}")),
    }
}

fn handle_dialog_input(app: &mut App, input: DialogInput) -> Option<AppCommand> {
    let mut dialog = app.store.state().dialog.clone();
    let outcome = dialog.handle(input);
    match outcome {
        DialogOutcome::Ignored => None,
        DialogOutcome::Updated | DialogOutcome::Closed => {
            app.store.set_dialog(dialog);
            None
        }
        DialogOutcome::Confirmed(confirmation) => {
            app.store.set_dialog(dialog);
            confirm(app, confirmation)
        }
    }
}

fn confirm(app: &mut App, confirmation: Confirmation) -> Option<AppCommand> {
    let uuid = app.current_uuid()?;
    match confirmation {
        Confirmation::Bulk {
            command,
            force,
            uuids,
        } => {
            let uuids = uuids.unwrap_or_else(|| app.selection.selected_uuids());
            if uuids.is_empty() {
                return None;
            }
            app.ui.show_toast(command.toast_text());
            Some(AppCommand::RunBulk {
                uuid,
                command,
                uuids,
                force,
            })
        }
        Confirmation::DeleteBlock {
            item_type,
            item_ids,
        } => Some(AppCommand::AddItems {
            uuid,
            request: AddItemsRequest::remove(&item_type, item_ids),
            intent: ReloadIntent::Relocate {
                after_sort_key: None,
            },
        }),
        Confirmation::DeleteWorksheet => Some(AppCommand::DeleteWorksheet { uuid }),
        Confirmation::Paste => paste(app),
    }
}
