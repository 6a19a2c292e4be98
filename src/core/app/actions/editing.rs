use serde_json::{Map, Value};
use tracing::debug;

use super::{App, AppAction, AppCommand};
use crate::api::AddItemsRequest;
use crate::core::app::ui_state::{Prompt, PromptKind};
use crate::core::dialog::DialogState;
use crate::core::focus::{Focus, ReloadIntent};
use crate::core::source::{ExitPlan, SourceSession};
use crate::core::worksheet::Block;

const NO_EDIT_PERMISSION: &str = "You do not have permission to edit this worksheet";
const PREVIEW_CHARS: usize = 60;

pub(super) fn handle_editing_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::EnterSource => {
            enter_source(app);
            None
        }
        AppAction::SaveSource => save_source(app),
        AppAction::ExitSource => {
            let entry_focus = app.source_session.as_ref().map(|s| s.entry_focus);
            leave_source(app, entry_focus);
            None
        }
        AppAction::StartInsertText => {
            let after_sort_key = app.insert_sort_key();
            open_edit_prompt(app, PromptKind::InsertText { after_sort_key }, "");
            None
        }
        AppAction::StartUpload => {
            let after_sort_key = app.insert_sort_key();
            open_edit_prompt(app, PromptKind::Upload { after_sort_key }, "");
            None
        }
        AppAction::StartNewRun => {
            let after_sort_key = app.insert_sort_key();
            open_edit_prompt(app, PromptKind::Run { after_sort_key }, "run ");
            None
        }
        AppAction::StartRerun => {
            start_rerun(app);
            None
        }
        AppAction::EditTitle => {
            let title = app
                .worksheet()
                .map(|ws| ws.display_title().to_string())
                .unwrap_or_default();
            open_edit_prompt(app, PromptKind::EditTitle, &title);
            None
        }
        AppAction::EditBundleName => {
            let Some((bundle_uuid, name)) = app
                .focused_bundle()
                .map(|row| (row.uuid.clone(), row.name.clone()))
            else {
                return None;
            };
            app.ui.prompt = Some(Prompt::new(
                PromptKind::EditBundleName { bundle_uuid },
                &name,
            ));
            None
        }
        AppAction::SubmitPrompt => submit_prompt(app),
        AppAction::CancelPrompt => {
            app.ui.prompt = None;
            None
        }
        AppAction::DeleteFocused => {
            delete_focused(app);
            None
        }
        AppAction::DownloadFocused => download_focused(app),
        _ => None,
    }
}

pub(super) fn enter_source(app: &mut App) {
    if app.store.state().source_mode {
        return;
    }
    let Some(worksheet) = app.worksheet() else {
        return;
    };
    if !worksheet.edit_permission {
        app.ui.show_timed_toast(NO_EDIT_PERMISSION);
        return;
    }
    let session = SourceSession::enter(worksheet, app.focus());
    debug!(entry_line = session.entry_line, focus = ?session.entry_focus, "Entering source mode");
    app.clear_selection();
    app.ui
        .open_source_editor(session.original.clone(), session.entry_line);
    app.source_session = Some(session);
    app.store.set_source_mode(true);
    app.sync_poller();
}

fn save_source(app: &mut App) -> Option<AppCommand> {
    if app.ui.source_saving {
        return None;
    }
    let uuid = app.current_uuid()?;
    let editor = app.ui.source_editor.as_ref()?;
    let cursor_line = editor.cursor().0;
    let session = app.source_session.as_ref()?;
    let mut lines = editor.lines().to_vec();
    // An empty source opens as one blank line.
    if session.original.is_empty() && lines.len() == 1 && lines[0].is_empty() {
        lines.clear();
    }
    let plan = session.plan_exit(app.worksheet()?, lines, cursor_line);
    match plan {
        ExitPlan::Unchanged { focus } => {
            leave_source(app, Some(focus));
            None
        }
        ExitPlan::Save { lines, raw_line } => {
            app.ui.source_saving = true;
            app.ui.show_toast("Saving source");
            Some(AppCommand::SaveSource {
                uuid,
                lines,
                raw_line,
            })
        }
    }
}

/// Close the editor. `focus` is installed when given; a save instead
/// relies on the reload that follows it.
pub(super) fn leave_source(app: &mut App, focus: Option<Focus>) {
    app.ui.close_source_editor();
    app.source_session = None;
    app.store.set_source_mode(false);
    if let Some(focus) = focus {
        app.store.set_focus(focus);
        app.ui.scroll.request();
    }
    app.sync_poller();
}

pub(super) fn open_edit_prompt(app: &mut App, kind: PromptKind, initial: &str) {
    if !app.can_edit() {
        app.ui.show_timed_toast(NO_EDIT_PERMISSION);
        return;
    }
    app.ui.prompt = Some(Prompt::new(kind, initial));
}

fn start_rerun(app: &mut App) {
    let Some(row) = app.focused_bundle() else {
        return;
    };
    if !row.is_run() {
        app.ui.show_timed_toast("Only runs can be rerun");
        return;
    }
    let mut parts = vec!["run".to_string()];
    parts.extend(row.dependencies.iter().map(|dep| format!(":{dep}")));
    if let Some(command) = row.command.as_deref() {
        parts.push(quote_arg(command));
    }
    let prefill = parts.join(" ");
    let after_sort_key = app.insert_sort_key();
    open_edit_prompt(app, PromptKind::Run { after_sort_key }, &prefill);
}

/// Single-quote `arg` for the server's command line when it has spaces or
/// quotes.
pub(super) fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

fn submit_prompt(app: &mut App) -> Option<AppCommand> {
    let prompt = app.ui.prompt.take()?;
    let raw = prompt.text();
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    let uuid = app.current_uuid()?;
    let command = match prompt.kind {
        PromptKind::InsertText { after_sort_key } => AppCommand::AddItems {
            uuid,
            request: AddItemsRequest::markup(raw.clone(), after_sort_key),
            intent: ReloadIntent::Relocate {
                after_sort_key: Some(after_sort_key),
            },
        },
        PromptKind::Upload { after_sort_key } => AppCommand::ExecuteCommand {
            uuid,
            command: format!("upload {} --after_sort_key {after_sort_key}", quote_arg(text)),
            intent: ReloadIntent::Relocate {
                after_sort_key: Some(after_sort_key),
            },
        },
        PromptKind::Run { after_sort_key } => {
            let body = if text == "run" || text.starts_with("run ") {
                text.to_string()
            } else {
                format!("run {text}")
            };
            app.ui.terminal.push_output(format!("> {body}"));
            AppCommand::ExecuteCommand {
                uuid,
                command: format!("{body} --after_sort_key {after_sort_key}"),
                intent: ReloadIntent::Relocate {
                    after_sort_key: Some(after_sort_key),
                },
            }
        }
        PromptKind::EditTitle => {
            let mut attributes = Map::new();
            attributes.insert("title".to_string(), Value::String(text.to_string()));
            AppCommand::UpdateWorksheetFields { uuid, attributes }
        }
        PromptKind::EditBundleName { bundle_uuid } => {
            let mut metadata = Map::new();
            metadata.insert("name".to_string(), Value::String(text.to_string()));
            AppCommand::UpdateBundleMetadata {
                uuid,
                bundle_uuid,
                metadata,
            }
        }
    };
    Some(command)
}

fn preview_of(text: &str) -> String {
    let first = text.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
    if first.chars().count() > PREVIEW_CHARS {
        let head: String = first.chars().take(PREVIEW_CHARS).collect();
        format!("{head}…")
    } else {
        first.to_string()
    }
}

/// What backspace would remove at the focused position.
enum DeleteTarget {
    Bundle { uuid: String },
    Item {
        item_type: &'static str,
        item_ids: Vec<i64>,
        preview: String,
    },
}

fn delete_target(block: &Block, focus: Focus) -> Option<DeleteTarget> {
    if let Some(row) = block.bundle_row(focus.sub) {
        return Some(DeleteTarget::Bundle {
            uuid: row.uuid.clone(),
        });
    }
    let (item_type, item_ids, preview) = match block {
        Block::Subworksheets(list) => {
            let item = list.items.get(focus.sub)?;
            let label = item.title.clone().unwrap_or_else(|| item.name.clone());
            ("worksheet", item.item_id.into_iter().collect::<Vec<i64>>(), label)
        }
        Block::Markup(markup) => ("markup", block.item_ids(), preview_of(&markup.text)),
        Block::Schema(schema) => (
            "directive",
            block.item_ids(),
            format!("schema {}", schema.schema_name),
        ),
        Block::SearchDirective(search) => (
            "directive",
            block.item_ids(),
            format!("search {}", search.keywords.join(" ")),
        ),
        Block::Image(rendered) | Block::Graph(rendered) | Block::Other(rendered) => (
            "directive",
            block.item_ids(),
            rendered.mode.clone(),
        ),
        Block::BundleTable(_) => return None,
    };
    if item_ids.is_empty() {
        return None;
    }
    Some(DeleteTarget::Item {
        item_type,
        item_ids,
        preview,
    })
}

fn delete_focused(app: &mut App) {
    if !app.is_ready() {
        return;
    }
    if !app.selection.is_empty() {
        app.store.set_dialog(DialogState::confirm_delete());
        return;
    }
    let focus = app.focus();
    let Some(target) = app
        .focused_block()
        .and_then(|block| delete_target(block, focus))
    else {
        return;
    };
    match target {
        DeleteTarget::Bundle { uuid } => {
            app.store.set_dialog(DialogState::ConfirmDelete {
                force: false,
                focused: Some(uuid),
            });
        }
        DeleteTarget::Item {
            item_type,
            item_ids,
            preview,
        } => {
            if !app.can_edit() {
                app.ui.show_timed_toast(NO_EDIT_PERMISSION);
                return;
            }
            app.store.set_dialog(DialogState::ConfirmDeleteBlock {
                item_type: item_type.to_string(),
                item_ids,
                preview,
            });
        }
    }
}

fn download_focused(app: &mut App) -> Option<AppCommand> {
    let uuid = app.focused_bundle()?.uuid.clone();
    let url = app.web_url(&format!("rest/bundles/{uuid}/contents/blob/"));
    app.ui.show_timed_toast(format!("Copied download link {url}"));
    Some(AppCommand::CopyToSystemClipboard { text: url })
}
