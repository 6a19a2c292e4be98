use tracing::debug;

use super::{App, AppAction, AppCommand};
use crate::core::app::ui_state::InfoModal;
use crate::core::focus::{move_down, move_end, move_top, move_up, Focus, ReloadIntent};
use crate::core::selection::instance_id;
use crate::core::worksheet::Block;
use crate::utils::url::{bundle_web_url, worksheet_web_url};

pub(super) fn handle_navigation_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::MoveUp => step_focus(app, move_up),
        AppAction::MoveDown => step_focus(app, move_down),
        AppAction::MoveTop => step_focus(app, |ws, _| move_top(ws)),
        AppAction::MoveEnd => step_focus(app, |ws, _| move_end(ws)),
        AppAction::OpenFocused => open_focused(app),
        AppAction::OpenFocusedExternally => open_focused_externally(app),
        AppAction::ToggleSelection => {
            toggle_focused_selection(app);
            None
        }
        AppAction::InsertFocusedUuid => {
            insert_focused_uuid(app);
            None
        }
        AppAction::ToggleWidth => {
            toggle_width(app);
            None
        }
        AppAction::Refresh => app.reload(ReloadIntent::Relocate {
            after_sort_key: None,
        }),
        AppAction::Back => app
            .history
            .back()
            .map(|uuid| app.open_worksheet(&uuid, false)),
        AppAction::Forward => app
            .history
            .forward()
            .map(|uuid| app.open_worksheet(&uuid, false)),
        AppAction::ShowHelp => {
            app.ui.info_modal = Some(InfoModal::Help);
            None
        }
        AppAction::CloseModal => {
            app.ui.info_modal = None;
            None
        }
        AppAction::OpenWorksheet { uuid } => Some(app.open_worksheet(&uuid, true)),
        AppAction::Quit => {
            app.ui.exit_requested = true;
            None
        }
        _ => None,
    }
}

fn step_focus<F>(app: &mut App, step: F) -> Option<AppCommand>
where
    F: FnOnce(&crate::core::worksheet::Worksheet, Focus) -> Focus,
{
    let focus = app.focus();
    let next = step(app.worksheet()?, focus);
    if next != focus {
        app.store.set_focus(next);
        app.ui.scroll.request();
    }
    None
}

fn open_focused(app: &mut App) -> Option<AppCommand> {
    let focus = app.focus();
    let block = app.focused_block()?;
    let (uuid, is_worksheet) = if let Some(row) = block.bundle_row(focus.sub) {
        (row.uuid.clone(), false)
    } else if let Some(sub) = block.subworksheet(focus.sub) {
        (sub.uuid.clone(), true)
    } else if let Block::Image(rendered) | Block::Graph(rendered) = block {
        (rendered.bundle_uuids.first()?.clone(), false)
    } else {
        return None;
    };
    if is_worksheet {
        return Some(app.open_worksheet(&uuid, true));
    }
    app.ui.info_modal = Some(InfoModal::BundleInfo { uuid });
    None
}

/// The terminal has no second window; the item's web address goes to the
/// system clipboard instead.
fn open_focused_externally(app: &mut App) -> Option<AppCommand> {
    let focus = app.focus();
    let block = app.focused_block()?;
    let url = if let Some(row) = block.bundle_row(focus.sub) {
        bundle_web_url(&app.server_url, &row.uuid)
    } else if let Some(sub) = block.subworksheet(focus.sub) {
        worksheet_web_url(&app.server_url, &sub.uuid)
    } else {
        return None;
    };
    app.ui.show_timed_toast(format!("Copied link {url}"));
    Some(AppCommand::CopyToSystemClipboard { text: url })
}

fn toggle_focused_selection(app: &mut App) {
    let focus = app.focus();
    let Some(uuid) = app.focused_bundle().map(|row| row.uuid.clone()) else {
        return;
    };
    let instance = instance_id(focus.block, focus.sub);
    let reset = App::checkbox_reset(&uuid, focus.block, focus.sub);
    let checked = app.selection.toggle(&uuid, &instance, reset);
    debug!(%uuid, %instance, checked, "Toggled selection");
    app.publish_selection();
}

fn insert_focused_uuid(app: &mut App) {
    let focus = app.focus();
    let Some(block) = app.focused_block() else {
        return;
    };
    let uuid = block
        .subworksheet(focus.sub)
        .map(|sub| sub.uuid.clone())
        .or_else(|| block.bundle_row(focus.sub).map(|row| row.uuid.clone()));
    if let Some(uuid) = uuid {
        app.ui.focus_terminal();
        app.ui.terminal.insert_text(&format!("{uuid} "));
    }
}

fn toggle_width(app: &mut App) {
    app.width = app.width.toggled();
    let mut preferences = app.preferences.load();
    preferences.width = app.width;
    if let Err(err) = app.preferences.save(&preferences) {
        app.ui
            .show_timed_toast(format!("Could not save width preference: {err}"));
    }
}
