use super::*;
use crate::api::{AddItemsRequest, CliCommandResponse, StructuredResult, WorksheetPayload};
use crate::core::clipboard::ClipboardEntry;
use crate::core::dialog::{DialogInput, DialogState};
use crate::core::focus::Focus;
use crate::core::poller::PollUpdate;
use crate::core::store::WorksheetView;
use crate::utils::test_utils::{
    create_test_app, markup_block_json, table_block_json, worksheet_json, FakeApi,
};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tui_textarea::CursorMove;

const HOME: &str = "0xABCD";

fn apply(app: &mut App, action: AppAction) -> Option<AppCommand> {
    apply_action(app, action, AppActionContext::default())
}

/// Execute `first` and every command its results produce, feeding each
/// result back into the app.
async fn run(app: &mut App, api: &FakeApi, first: Option<AppCommand>) {
    let mut pending: VecDeque<AppCommand> = first.into_iter().collect();
    while let Some(command) = pending.pop_front() {
        if matches!(command, AppCommand::CopyToSystemClipboard { .. }) {
            continue;
        }
        if let Some(action) = execute(api, command).await {
            pending.extend(apply(app, action));
        }
    }
}

async fn drive(app: &mut App, api: &FakeApi, action: AppAction) {
    let command = apply(app, action);
    run(app, api, command).await;
}

async fn load(app: &mut App, api: &FakeApi, payload: WorksheetPayload) {
    let uuid = payload.uuid.clone();
    api.set_worksheet(payload);
    drive(app, api, AppAction::OpenWorksheet { uuid }).await;
}

fn two_tables() -> WorksheetPayload {
    worksheet_json(vec![
        table_block_json(&[("U1", "ready")], &[10]),
        table_block_json(&[("U2", "ready")], &[20]),
    ])
}

fn select(app: &mut App, block: i64, sub: usize) {
    app.store.set_focus(Focus::new(block, sub));
    apply(app, AppAction::ToggleSelection);
}

/// Four blocks with a nine-line source. Raw line 7 maps to `line7`.
fn source_worksheet(line7: (i64, i64)) -> WorksheetPayload {
    let mut payload = worksheet_json(vec![
        markup_block_json("intro", &[1]),
        table_block_json(&[("U1", "ready"), ("U2", "ready"), ("U3", "ready")], &[2, 3, 4]),
        markup_block_json("middle", &[5]),
        markup_block_json("outro", &[6]),
    ]);
    payload.source = (0..9).map(|i| format!("line {i}")).collect();
    payload.raw_to_block = Some(vec![
        Some((0, 0)),
        Some((1, 0)),
        Some((1, 1)),
        Some((1, 2)),
        Some((2, 0)),
        Some((2, 0)),
        Some((3, 0)),
        Some(line7),
        Some((3, 0)),
    ]);
    payload.block_to_raw = HashMap::from([
        ("0,0".to_string(), 0),
        ("1,0".to_string(), 1),
        ("1,1".to_string(), 2),
        ("1,2".to_string(), 3),
        ("2,0".to_string(), 4),
        ("3,0".to_string(), 6),
    ]);
    payload
}

#[tokio::test]
async fn loading_a_markup_worksheet_focuses_nothing() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, worksheet_json(vec![markup_block_json("hello", &[1])])).await;

    let state = app.store.snapshot();
    assert_eq!(state.view, WorksheetView::Ready);
    assert_eq!(state.focus, Focus::NONE);
    let worksheet = app.worksheet().unwrap();
    assert_eq!(worksheet.display_title(), "Test Worksheet");
    assert!(matches!(&worksheet.blocks[0], crate::core::worksheet::Block::Markup(m) if m.text == "hello"));
    assert!(app.poll_target().is_none());
    assert_eq!(app.history.current(), Some(HOME));
}

#[tokio::test]
async fn empty_worksheet_has_no_focus() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, worksheet_json(Vec::new())).await;
    apply(&mut app, AppAction::MoveDown);
    assert_eq!(app.focus(), Focus::NONE);
}

#[tokio::test]
async fn moving_down_past_trailing_markup_stays_put() {
    let (mut app, api, _dir) = create_test_app();
    load(
        &mut app,
        &api,
        worksheet_json(vec![markup_block_json("a", &[1]), markup_block_json("b", &[2])]),
    )
    .await;
    for _ in 0..4 {
        apply(&mut app, AppAction::MoveDown);
    }
    assert_eq!(app.focus(), Focus::new(1, 0));
    apply(&mut app, AppAction::MoveTop);
    apply(&mut app, AppAction::MoveUp);
    assert_eq!(app.focus(), Focus::NONE);
}

#[tokio::test]
async fn unknown_worksheet_shows_not_found() {
    let (mut app, api, _dir) = create_test_app();
    drive(
        &mut app,
        &api,
        AppAction::OpenWorksheet {
            uuid: "0xMISSING".into(),
        },
    )
    .await;
    assert_eq!(app.store.state().view, WorksheetView::NotFound);
    assert!(app.poll_target().is_none());
}

#[tokio::test]
async fn opening_by_name_adopts_the_resolved_uuid() {
    let (mut app, api, _dir) = create_test_app();
    api.set_alias("home", worksheet_json(vec![markup_block_json("hi", &[1])]));
    drive(
        &mut app,
        &api,
        AppAction::OpenWorksheet {
            uuid: "home".into(),
        },
    )
    .await;
    assert_eq!(app.current_uuid().as_deref(), Some(HOME));
    assert_eq!(app.store.state().view, WorksheetView::Ready);
    assert_eq!(app.history.current(), Some(HOME));
}

#[tokio::test]
async fn running_bundles_are_polled_until_terminal() {
    let (mut app, api, _dir) = create_test_app();
    load(
        &mut app,
        &api,
        worksheet_json(vec![table_block_json(&[("U1", "running")], &[10])]),
    )
    .await;
    let target = app.poll_target().expect("running bundle is tracked");
    assert_eq!(target.tracked, vec!["U1".to_string()]);

    let finished = worksheet_json(vec![table_block_json(&[("U1", "ready")], &[10])]);
    apply(
        &mut app,
        AppAction::PollResult {
            update: PollUpdate {
                worksheet_uuid: HOME.into(),
                tick: 1,
                result: Ok(finished),
            },
        },
    );
    assert!(app.poll_target().is_none());
}

#[tokio::test]
async fn source_mode_suspends_polling() {
    let (mut app, api, _dir) = create_test_app();
    load(
        &mut app,
        &api,
        worksheet_json(vec![table_block_json(&[("U1", "running")], &[10])]),
    )
    .await;
    apply(&mut app, AppAction::EnterSource);
    assert!(app.store.state().source_mode);
    assert!(app.poll_target().is_none());
    apply(&mut app, AppAction::ExitSource);
    assert!(app.poll_target().is_some());
}

#[tokio::test]
async fn stale_worksheet_response_mutates_nothing() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, two_tables()).await;
    let before = app.store.snapshot();

    let mut other = worksheet_json(Vec::new());
    other.uuid = "0xOTHER".into();
    let command = apply(
        &mut app,
        AppAction::WorksheetLoaded {
            uuid: "0xOTHER".into(),
            intent: ReloadIntent::Reset,
            result: Ok(other),
        },
    );
    assert!(command.is_none());
    assert!(Arc::ptr_eq(&before, &app.store.snapshot()));
}

#[tokio::test]
async fn rm_clears_selection_and_reloads() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, two_tables()).await;
    select(&mut app, 0, 0);
    select(&mut app, 1, 0);
    assert!(app.store.state().show_bulk_buttons());

    apply(&mut app, AppAction::DeleteFocused);
    assert_eq!(
        app.store.state().dialog,
        DialogState::confirm_delete()
    );
    let command = apply(
        &mut app,
        AppAction::Dialog {
            input: DialogInput::Confirm,
        },
    );
    assert_eq!(app.ui.toast_message(), Some("Executing rm command"));

    api.set_worksheet(worksheet_json(vec![markup_block_json("gone", &[1])]));
    run(&mut app, &api, command).await;

    assert_eq!(api.commands(), vec!["rm U1 U2".to_string()]);
    assert!(app.selection.is_empty());
    assert!(!app.store.state().show_bulk_buttons());
    assert_eq!(app.ui.toast_message(), Some("Executing rm command"));
    assert!(app.ui.toast.as_ref().and_then(|t| t.expires_at).is_some());
    let present = app.worksheet().unwrap().bundle_uuid_set();
    assert!(!present.contains("U1") && !present.contains("U2"));
}

#[tokio::test]
async fn force_flag_reaches_the_rm_command() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, two_tables()).await;
    select(&mut app, 0, 0);
    select(&mut app, 1, 0);

    apply(&mut app, AppAction::DeleteFocused);
    apply(
        &mut app,
        AppAction::Dialog {
            input: DialogInput::ToggleForce,
        },
    );
    assert!(app.store.state().dialog.force_delete());
    drive(
        &mut app,
        &api,
        AppAction::Dialog {
            input: DialogInput::Confirm,
        },
    )
    .await;
    assert_eq!(api.commands(), vec!["rm --force U1 U2".to_string()]);
}

#[tokio::test]
async fn failed_bulk_command_keeps_selection_and_shows_error() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, two_tables()).await;
    select(&mut app, 0, 0);
    apply(&mut app, AppAction::Kill);
    assert_eq!(app.store.state().dialog, DialogState::ConfirmKill);

    api.push_command_response(CliCommandResponse {
        exception: Some("Permission denied".into()),
        ..Default::default()
    });
    drive(
        &mut app,
        &api,
        AppAction::Dialog {
            input: DialogInput::Confirm,
        },
    )
    .await;
    assert_eq!(api.commands(), vec!["kill U1".to_string()]);
    assert_eq!(
        app.store.state().dialog,
        DialogState::ShowError {
            message: "Permission denied".into()
        }
    );
    assert_eq!(app.selection.selected_uuids(), vec!["U1".to_string()]);
    assert!(app.ui.toast.is_none());
}

#[tokio::test]
async fn bulk_actions_need_a_selection() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, two_tables()).await;
    apply(&mut app, AppAction::Detach);
    assert_eq!(app.store.state().dialog, DialogState::Idle);
    assert_eq!(app.ui.toast_message(), Some("No bundles selected"));
}

#[tokio::test]
async fn paste_goes_after_the_focused_row() {
    let (mut app, api, _dir) = create_test_app();
    app.clipboard
        .copy(&[ClipboardEntry {
            uuid: "U3".into(),
            name: String::new(),
            id: None,
        }])
        .unwrap();
    load(
        &mut app,
        &api,
        worksheet_json(vec![
            markup_block_json("a", &[1]),
            markup_block_json("b", &[2]),
            table_block_json(&[("U1", "ready"), ("U2", "ready")], &[100, 200]),
        ]),
    )
    .await;
    assert!(app.ui.show_paste_button);
    app.store.set_focus(Focus::new(2, 0));

    drive(&mut app, &api, AppAction::Paste).await;
    let requests = api.add_items_requests();
    assert_eq!(requests.len(), 1);
    let (uuid, request) = &requests[0];
    assert_eq!(uuid, HOME);
    assert_eq!(request.items, vec!["U3".to_string()]);
    assert_eq!(request.item_type, "bundle");
    assert_eq!(request.after_sort_key, Some(100));
}

#[tokio::test]
async fn paste_without_focus_goes_to_the_top() {
    let (mut app, api, _dir) = create_test_app();
    app.clipboard
        .copy(&[ClipboardEntry {
            uuid: "U3".into(),
            name: String::new(),
            id: None,
        }])
        .unwrap();
    load(&mut app, &api, worksheet_json(vec![markup_block_json("a", &[5])])).await;
    drive(&mut app, &api, AppAction::Paste).await;
    assert_eq!(api.add_items_requests()[0].1.after_sort_key, Some(-1));
}

#[tokio::test]
async fn cut_copies_and_removes_the_rows() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, two_tables()).await;
    select(&mut app, 0, 0);

    drive(&mut app, &api, AppAction::Cut).await;
    assert_eq!(
        api.add_items_requests(),
        vec![(HOME.to_string(), AddItemsRequest::remove("bundle", vec![1]))]
    );
    assert_eq!(
        app.clipboard.entries().unwrap(),
        vec![ClipboardEntry {
            uuid: "U1".into(),
            name: "name-U1".into(),
            id: Some(1),
        }]
    );
    assert!(app.selection.is_empty());
    assert!(app.ui.show_paste_button);
}

#[tokio::test]
async fn saving_source_focuses_from_the_cursor_line() {
    for (line7, expected) in [((1, 2), Focus::new(1, 2)), ((3, 0), Focus::new(3, 0))] {
        let (mut app, api, _dir) = create_test_app();
        load(&mut app, &api, source_worksheet((0, 0))).await;
        app.store.set_focus(Focus::new(1, 2));

        apply(&mut app, AppAction::EnterSource);
        let editor = app.ui.source_editor.as_mut().expect("editor open");
        assert_eq!(editor.cursor().0, 3);
        editor.move_cursor(CursorMove::Jump(7, 0));
        editor.insert_str("x");

        let command = apply(&mut app, AppAction::SaveSource);
        assert!(matches!(
            command,
            Some(AppCommand::SaveSource { raw_line: 7, .. })
        ));
        api.set_worksheet(source_worksheet(line7));
        run(&mut app, &api, command).await;

        assert_eq!(api.saved_sources()[0].1[7], "xline 7");
        assert!(!app.store.state().source_mode);
        assert!(app.ui.source_editor.is_none());
        assert_eq!(app.focus(), expected);
    }
}

#[tokio::test]
async fn unchanged_source_restores_entry_focus() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, source_worksheet((3, 0))).await;
    app.store.set_focus(Focus::new(1, 2));

    apply(&mut app, AppAction::EnterSource);
    let command = apply(&mut app, AppAction::SaveSource);
    assert!(command.is_none());
    assert!(api.saved_sources().is_empty());
    assert!(!app.store.state().source_mode);
    assert_eq!(app.focus(), Focus::new(1, 2));
}

#[tokio::test]
async fn rejected_source_keeps_the_editor_open() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, source_worksheet((3, 0))).await;
    apply(&mut app, AppAction::EnterSource);
    app.ui
        .source_editor
        .as_mut()
        .unwrap()
        .insert_str("% bogus ");
    api.fail_next_save(400, "Invalid directive");

    drive(&mut app, &api, AppAction::SaveSource).await;
    assert_eq!(
        app.store.state().dialog,
        DialogState::ShowError {
            message: "Invalid directive".into()
        }
    );
    assert!(app.store.state().source_mode);
    assert!(!app.ui.source_saving);
    let editor = app.ui.source_editor.as_ref().unwrap();
    assert!(editor.lines()[0].starts_with("% bogus "));
}

#[tokio::test]
async fn reload_drops_selection_of_vanished_bundles() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, two_tables()).await;
    select(&mut app, 0, 0);
    select(&mut app, 1, 0);

    api.set_worksheet(worksheet_json(vec![table_block_json(&[("U2", "ready")], &[20])]));
    drive(&mut app, &api, AppAction::Refresh).await;
    assert_eq!(app.selection.selected_uuids(), vec!["U2".to_string()]);
    assert!(app.store.state().selection.contains("U2"));
    assert!(!app.store.state().selection.contains("U1"));
}

#[tokio::test]
async fn checked_rows_follow_their_bundle_when_the_layout_shifts() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, two_tables()).await;
    select(&mut app, 1, 0);
    assert!(app.store.state().selection.is_checked("U2", "1,0"));

    let mut shifted = two_tables();
    shifted.blocks.insert(0, Some(markup_block_json("new intro", &[5])));
    api.set_worksheet(shifted);
    drive(&mut app, &api, AppAction::Refresh).await;

    let selection = &app.store.state().selection;
    assert_eq!(selection.uuids(), ["U2".to_string()]);
    assert!(selection.is_checked("U2", "2,0"));
    assert!(!selection.is_checked("U2", "1,0"));

    drive(&mut app, &api, AppAction::Cut).await;
    assert_eq!(
        api.add_items_requests(),
        vec![(HOME.to_string(), AddItemsRequest::remove("bundle", vec![1]))]
    );
    assert!(app.selection.is_empty());
}

#[tokio::test]
async fn cancelling_a_focused_delete_leaves_nothing_selected() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, two_tables()).await;
    app.store.set_focus(Focus::new(0, 0));

    apply(&mut app, AppAction::DeleteFocused);
    assert_eq!(
        app.store.state().dialog,
        DialogState::ConfirmDelete {
            force: false,
            focused: Some("U1".into()),
        }
    );
    assert!(app.selection.is_empty());

    apply(
        &mut app,
        AppAction::Dialog {
            input: DialogInput::Cancel,
        },
    );
    assert_eq!(app.store.state().dialog, DialogState::Idle);
    assert!(app.selection.is_empty());
    assert!(!app.store.state().show_bulk_buttons());
}

#[tokio::test]
async fn confirming_a_focused_delete_removes_that_bundle() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, two_tables()).await;
    app.store.set_focus(Focus::new(1, 0));

    apply(&mut app, AppAction::DeleteFocused);
    api.push_command_response(CliCommandResponse {
        output: "U2".into(),
        ..Default::default()
    });
    drive(
        &mut app,
        &api,
        AppAction::Dialog {
            input: DialogInput::Confirm,
        },
    )
    .await;
    assert_eq!(api.commands()[0], "rm U2");
    assert!(app.selection.is_empty());
}

#[tokio::test]
async fn terminal_command_can_open_another_worksheet() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, two_tables()).await;
    let mut other = worksheet_json(vec![markup_block_json("elsewhere", &[1])]);
    other.uuid = "0xBEEF".into();
    api.set_worksheet(other);
    api.push_command_response(CliCommandResponse {
        output: "Switched to 0xBEEF".into(),
        structured_result: Some(StructuredResult {
            ui_actions: vec![("openWorksheet".into(), json!("0xBEEF"))],
            ..Default::default()
        }),
        ..Default::default()
    });

    apply(&mut app, AppAction::FocusTerminal);
    app.ui.terminal.set_input("work 0xBEEF");
    drive(&mut app, &api, AppAction::TerminalSubmit).await;

    assert_eq!(api.commands(), vec!["work 0xBEEF".to_string()]);
    assert_eq!(app.current_uuid().as_deref(), Some("0xBEEF"));
    assert!(app.ui.terminal.output.contains(&"> work 0xBEEF".to_string()));
    assert!(app.ui.terminal.output.contains(&"Switched to 0xBEEF".to_string()));
    assert_eq!(app.ui.terminal.input_text(), "");

    drive(&mut app, &api, AppAction::Back).await;
    assert_eq!(app.current_uuid().as_deref(), Some(HOME));
    drive(&mut app, &api, AppAction::Forward).await;
    assert_eq!(app.current_uuid().as_deref(), Some("0xBEEF"));
}

#[tokio::test]
async fn single_completion_replaces_the_last_word() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, two_tables()).await;
    app.ui.terminal.set_input("info 0x1");
    api.push_command_response(CliCommandResponse {
        completions: Some(vec!["0x1234".into()]),
        ..Default::default()
    });
    drive(&mut app, &api, AppAction::TerminalComplete).await;
    assert_eq!(api.completions(), vec!["info 0x1".to_string()]);
    assert_eq!(app.ui.terminal.input_text(), "info 0x1234");
}

#[tokio::test]
async fn deleting_the_worksheet_returns_to_the_previous_one() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, two_tables()).await;
    let mut other = worksheet_json(Vec::new());
    other.uuid = "0xBEEF".into();
    load(&mut app, &api, other).await;

    apply(&mut app, AppAction::DeleteWorksheet);
    assert_eq!(app.store.state().dialog, DialogState::ConfirmDeleteWorksheet);
    drive(
        &mut app,
        &api,
        AppAction::Dialog {
            input: DialogInput::Confirm,
        },
    )
    .await;
    assert_eq!(api.deleted(), vec!["0xBEEF".to_string()]);
    assert_eq!(app.current_uuid().as_deref(), Some(HOME));
}

#[tokio::test]
async fn insert_text_adds_markup_after_focus() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, worksheet_json(vec![markup_block_json("a", &[7])])).await;
    app.store.set_focus(Focus::new(0, 0));

    apply(&mut app, AppAction::StartInsertText);
    assert_eq!(app.key_context(), KeyContext::EditingField);
    app.ui.prompt.as_mut().unwrap().textarea.insert_str("new note");
    drive(&mut app, &api, AppAction::SubmitPrompt).await;

    let (_, request) = &api.add_items_requests()[0];
    assert_eq!(request.items, vec!["new note".to_string()]);
    assert_eq!(request.item_type, "markup");
    assert_eq!(request.after_sort_key, Some(7));
    assert!(app.ui.prompt.is_none());
}

#[tokio::test]
async fn rerun_prefills_dependencies_and_command() {
    let (mut app, api, _dir) = create_test_app();
    let mut payload = worksheet_json(vec![table_block_json(&[("U1", "ready")], &[10])]);
    let info = payload.blocks[0]
        .as_mut()
        .and_then(|block| block.bundles_spec.as_mut())
        .and_then(|spec| spec.bundle_infos[0].as_mut())
        .unwrap();
    info.command = Some("python train.py".into());
    info.dependencies = vec![crate::api::DependencyInfo {
        parent_uuid: "0xDATA".into(),
        ..Default::default()
    }];
    load(&mut app, &api, payload).await;
    app.store.set_focus(Focus::new(0, 0));

    apply(&mut app, AppAction::StartRerun);
    let prompt = app.ui.prompt.as_ref().expect("prompt open");
    assert_eq!(prompt.text(), "run :0xDATA 'python train.py'");
}

#[tokio::test]
async fn key_context_prefers_dialogs() {
    let (mut app, api, _dir) = create_test_app();
    load(&mut app, &api, two_tables()).await;
    assert_eq!(app.key_context(), KeyContext::Idle);
    apply(&mut app, AppAction::FocusTerminal);
    assert_eq!(app.key_context(), KeyContext::TerminalFocus);
    apply(&mut app, AppAction::ShowHelp);
    assert_eq!(app.key_context(), KeyContext::InformationModal);
    select(&mut app, 0, 0);
    apply(&mut app, AppAction::Kill);
    assert_eq!(app.key_context(), KeyContext::DialogOpen);
}
