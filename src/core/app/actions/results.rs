use tracing::{debug, info, warn};

use super::editing::{enter_source, leave_source, open_edit_prompt};
use super::{App, AppAction, AppCommand};
use crate::api::{ApiError, CliCommandResponse, UiAction, WorksheetPayload};
use crate::core::app::reload::focus_after_reload;
use crate::core::app::ui_state::{InfoModal, PromptKind};
use crate::core::bulk::{BulkCommand, BulkOutcome};
use crate::core::dialog::DialogState;
use crate::core::error::ErrorKind;
use crate::core::focus::ReloadIntent;
use crate::core::poller::PollUpdate;
use crate::core::selection::instance_id;
use crate::core::store::Applied;
use crate::core::worksheet::Worksheet;

pub(super) fn handle_result_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::WorksheetLoaded {
            uuid,
            intent,
            result,
        } => {
            worksheet_loaded(app, &uuid, intent, result);
            None
        }
        AppAction::PollResult { update } => {
            poll_result(app, update);
            None
        }
        AppAction::ItemsAdded {
            uuid,
            intent,
            result,
        } => {
            if is_stale(app, &uuid, "add-items") {
                return None;
            }
            match result {
                Ok(()) => app.reload(intent),
                Err(err) => {
                    surface_error(app, &err);
                    None
                }
            }
        }
        AppAction::SourceSaved {
            uuid,
            raw_line,
            result,
        } => source_saved(app, &uuid, raw_line, result),
        AppAction::WorksheetDeleted { uuid, result } => worksheet_deleted(app, &uuid, result),
        AppAction::BulkFinished {
            uuid,
            command,
            outcome,
        } => bulk_finished(app, &uuid, command, outcome),
        AppAction::CommandFinished {
            uuid,
            command,
            intent,
            result,
        } => command_finished(app, &uuid, &command, intent, result),
        AppAction::CompletionsLoaded { result } => {
            match result {
                Ok(response) => apply_completions(app, response.completions.unwrap_or_default()),
                Err(err) => debug!(error = %err, "Autocomplete failed"),
            }
            None
        }
        AppAction::FieldsUpdated { uuid, result } => {
            if is_stale(app, &uuid, "field update") {
                return None;
            }
            match result {
                Ok(()) => app.reload(ReloadIntent::KeepFocus),
                Err(err) => {
                    surface_error(app, &err);
                    None
                }
            }
        }
        AppAction::UserLoaded { result } => {
            match result {
                Ok(user) => app.ui.user = Some(user),
                Err(err) => debug!(error = %err, "Could not load the signed-in user"),
            }
            None
        }
        AppAction::SetToast { message } => {
            app.ui.show_timed_toast(message);
            None
        }
        _ => None,
    }
}

fn is_stale(app: &App, uuid: &str, what: &str) -> bool {
    if app.store.state().is_current(uuid) {
        return false;
    }
    debug!(kind = %ErrorKind::StaleResponse, response = %uuid, what, "Dropping result");
    true
}

/// Route a failed request to the toast or the error dialog.
fn surface_error(app: &mut App, err: &ApiError) {
    let kind = err.kind();
    warn!(%kind, error = %err, "Request failed");
    if !kind.is_surfaced() {
        return;
    }
    if kind.uses_dialog() {
        app.ui.clear_toast();
        app.store.set_dialog(DialogState::ShowError {
            message: err.user_message(),
        });
    } else {
        app.ui.show_timed_toast(err.user_message());
    }
}

fn worksheet_loaded(
    app: &mut App,
    requested: &str,
    intent: ReloadIntent,
    result: Result<WorksheetPayload, ApiError>,
) {
    if is_stale(app, requested, "worksheet") {
        return;
    }
    let payload = match result {
        Ok(payload) => payload,
        Err(ApiError::NotFound) => {
            info!(uuid = %requested, "Worksheet not found");
            app.store.set_not_found(requested);
            app.sync_poller();
            return;
        }
        Err(err) => {
            surface_error(app, &err);
            return;
        }
    };

    if payload.uuid != requested {
        debug!(requested, resolved = %payload.uuid, "Worksheet resolved to a different uuid");
        if app.store.adopt_uuid(requested, &payload.uuid) == Applied::Stale {
            return;
        }
        if app.history.current() == Some(requested) {
            app.history.replace_current(&payload.uuid);
        }
    }

    let old = app.store.state().worksheet.clone();
    let old_focus = app.focus();
    let worksheet = Worksheet::from_payload(payload);
    let present = worksheet.bundle_uuid_set();
    let focus = focus_after_reload(old.as_deref(), &worksheet, old_focus, intent);
    debug!(blocks = worksheet.blocks.len(), ?intent, ?focus, "Installing worksheet");

    if app.store.set_worksheet(worksheet) == Applied::Stale {
        return;
    }
    app.store.set_focus(focus);
    if focus != old_focus {
        app.ui.scroll.request();
    }
    let dropped = app.selection.retain_uuids(&present);
    if dropped > 0 {
        debug!(dropped, "Dropped selections for vanished bundles");
    }
    let moved = match app.store.state().worksheet.clone() {
        Some(worksheet) => app.selection.relocate_instances(|uuid| {
            worksheet
                .bundle_appearances(uuid)
                .into_iter()
                .map(|(block, sub)| instance_id(block, sub))
                .collect()
        }),
        None => 0,
    };
    if dropped > 0 || moved > 0 {
        app.publish_selection();
    }
    app.ui.show_paste_button = app.clipboard.has_entries();
    app.sync_poller();
}

fn poll_result(app: &mut App, update: PollUpdate) {
    let PollUpdate {
        worksheet_uuid,
        tick,
        result,
    } = update;
    if is_stale(app, &worksheet_uuid, "poll") {
        app.sync_poller();
        return;
    }
    if app.store.state().source_mode {
        debug!(tick, "Ignoring poll result in source mode");
        return;
    }
    match result {
        Ok(payload) => {
            app.store.patch_blocks(&payload);
        }
        Err(ApiError::NotFound) => {
            app.store.set_not_found(&worksheet_uuid);
        }
        Err(err) => warn!(tick, error = %err, "Partial refresh failed"),
    }
    app.sync_poller();
}

fn source_saved(
    app: &mut App,
    uuid: &str,
    raw_line: usize,
    result: Result<(), ApiError>,
) -> Option<AppCommand> {
    if is_stale(app, uuid, "source save") {
        return None;
    }
    match result {
        Ok(()) => {
            info!(worksheet = %uuid, raw_line, "Saved worksheet source");
            app.ui.show_timed_toast("Saved");
            leave_source(app, None);
            app.reload(ReloadIntent::FromSource { raw_line })
        }
        Err(err) => {
            // The editor stays open with the text the user typed.
            app.ui.source_saving = false;
            app.ui.clear_toast();
            warn!(error = %err, "Saving source failed");
            app.store.set_dialog(DialogState::ShowError {
                message: err.user_message(),
            });
            None
        }
    }
}

fn worksheet_deleted(app: &mut App, uuid: &str, result: Result<(), ApiError>) -> Option<AppCommand> {
    if is_stale(app, uuid, "delete") {
        return None;
    }
    if let Err(err) = result {
        surface_error(app, &err);
        return None;
    }
    info!(worksheet = %uuid, "Deleted worksheet");
    app.ui.show_timed_toast("Worksheet deleted");
    match app.history.back() {
        Some(previous) => Some(app.open_worksheet(&previous, false)),
        None => {
            app.store.set_not_found(uuid);
            app.sync_poller();
            None
        }
    }
}

fn bulk_finished(
    app: &mut App,
    uuid: &str,
    command: BulkCommand,
    outcome: BulkOutcome,
) -> Option<AppCommand> {
    if is_stale(app, uuid, command.as_str()) {
        return None;
    }
    match outcome {
        BulkOutcome::Succeeded { output, intent } => {
            if !output.trim().is_empty() {
                app.ui.terminal.push_output(output);
            }
            app.clear_selection();
            app.ui.expire_toast_later();
            app.reload(intent)
        }
        BulkOutcome::Failed { kind, message } => {
            warn!(%command, %kind, %message, "Bulk command failed");
            if kind.uses_dialog() {
                app.ui.clear_toast();
                app.store.set_dialog(DialogState::ShowError { message });
            } else {
                app.ui.show_timed_toast(message);
            }
            None
        }
    }
}

fn command_finished(
    app: &mut App,
    uuid: &str,
    command: &str,
    intent: ReloadIntent,
    result: Result<CliCommandResponse, ApiError>,
) -> Option<AppCommand> {
    let response = match result {
        Ok(response) => response,
        Err(err) => {
            app.ui
                .terminal
                .push_output(format!("error: {}", err.user_message()));
            if app.store.state().is_current(uuid) {
                surface_error(app, &err);
            }
            return None;
        }
    };
    if !response.output.is_empty() {
        app.ui.terminal.push_output(&response.output);
    }
    if let Some(exception) = response.exception.as_deref().filter(|e| !e.is_empty()) {
        debug!(%command, %exception, "Command raised");
        app.ui.terminal.push_output(exception);
        if app.store.state().is_current(uuid) {
            app.ui.clear_toast();
            app.store.set_dialog(DialogState::ShowError {
                message: exception.to_string(),
            });
        }
        return None;
    }
    if is_stale(app, uuid, "command") {
        return None;
    }

    let mut handled = false;
    for ui_action in response.ui_actions() {
        match ui_action {
            UiAction::OpenWorksheet(target) => return Some(app.open_worksheet(&target, true)),
            UiAction::SetEditMode(true) => {
                enter_source(app);
                handled = true;
            }
            UiAction::SetEditMode(false) => {
                let entry_focus = app.source_session.as_ref().map(|s| s.entry_focus);
                leave_source(app, entry_focus);
                handled = true;
            }
            UiAction::OpenBundle(bundle) => {
                app.ui.info_modal = Some(InfoModal::BundleInfo { uuid: bundle });
                handled = true;
            }
            UiAction::Upload(_) => {
                let after_sort_key = app.insert_sort_key();
                open_edit_prompt(app, PromptKind::Upload { after_sort_key }, "");
                handled = true;
            }
            UiAction::Unknown(name) => debug!(action = %name, "Ignoring unknown ui action"),
        }
    }
    if handled {
        None
    } else {
        app.reload(intent)
    }
}

/// A single completion replaces the last word; several are listed.
fn apply_completions(app: &mut App, completions: Vec<String>) {
    match completions.as_slice() {
        [] => {}
        [only] => {
            let input = app.ui.terminal.input_text();
            let keep = input.rfind(' ').map_or(0, |index| index + 1);
            let completed = format!("{}{only}", &input[..keep]);
            app.ui.terminal.set_input(&completed);
        }
        many => app.ui.terminal.push_output(many.join("  ")),
    }
}
