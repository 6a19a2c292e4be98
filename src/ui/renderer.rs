//! Frame composition for the worksheet session.

use std::sync::OnceLock;
use std::time::Instant;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::core::app::ui_state::{InfoModal, TerminalPanel};
use crate::core::app::App;
use crate::core::clipboard::WidthPreference;
use crate::core::dialog::DialogState;
use crate::core::focus::{Focus, ScrollRequest};
use crate::core::store::WorksheetView;
use crate::core::worksheet::Worksheet;
use crate::ui::blocks::{layout_worksheet, BlockRenderers};
use crate::ui::help::help_lines;
use crate::ui::theme::Theme;

/// Widest the block pane gets under [`WidthPreference::Default`].
const DEFAULT_PANE_WIDTH: u16 = 100;
const TERMINAL_HEIGHT: u16 = 10;

fn renderers() -> &'static BlockRenderers {
    static RENDERERS: OnceLock<BlockRenderers> = OnceLock::new();
    RENDERERS.get_or_init(BlockRenderers::standard)
}

pub fn ui(f: &mut Frame, app: &mut App) {
    let theme = Theme::default();
    let terminal_height = if app.ui.terminal.visible {
        TERMINAL_HEIGHT
    } else {
        0
    };
    let prompt_height = if app.ui.prompt.is_some() { 3 } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(terminal_height),
            Constraint::Length(prompt_height),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_top_bar(f, app, &theme, chunks[0]);
    if app.store.state().source_mode && app.ui.source_editor.is_some() {
        draw_source_editor(f, app, &theme, chunks[1]);
    } else {
        draw_body(f, app, &theme, chunks[1]);
    }
    if app.ui.terminal.visible {
        draw_terminal(f, &mut app.ui.terminal, &theme, chunks[2]);
    }
    if app.ui.prompt.is_some() {
        draw_prompt(f, app, &theme, chunks[3]);
    }
    draw_status_line(f, app, &theme, chunks[4]);

    if app.store.state().dialog.is_open() {
        draw_dialog(f, app, &theme);
    } else if let Some(modal) = app.ui.info_modal.clone() {
        draw_info_modal(f, app, &theme, &modal);
    }
}

fn draw_top_bar(f: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let mut spans = vec![
        Span::styled("quire", theme.title_style),
        Span::styled(format!(" · {}", app.server_url), theme.meta_style),
    ];
    let selected = app.store.state().selection.len();
    if selected > 0 {
        spans.push(Span::styled(
            format!(" · {selected} selected"),
            theme.selected_style,
        ));
    }
    if app.ui.show_paste_button {
        spans.push(Span::styled(" · clipboard ready (a v)", theme.hint_style));
    }
    if let Some(user) = &app.ui.user {
        spans.push(Span::styled(format!(" · {}", user.user_name), theme.meta_style));
        if user.notifications > 0 {
            spans.push(Span::styled(
                format!(" ({} new)", user.notifications),
                theme.hint_style,
            ));
        }
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Lines describing the worksheet; also drawn as the sticky header.
fn header_lines(worksheet: &Worksheet, theme: &Theme) -> Vec<Line<'static>> {
    let mut meta = Vec::new();
    if let Some(owner) = &worksheet.owner_name {
        meta.push(format!("by {owner}"));
    }
    if let Some(permission) = &worksheet.permission_spec {
        meta.push(permission.clone());
    }
    if !worksheet.tags.is_empty() {
        meta.push(format!("#{}", worksheet.tags.join(" #")));
    }
    if let Some(modified) = worksheet.date_last_modified {
        meta.push(format!("modified {}", modified.format("%Y-%m-%d %H:%M")));
    }
    if !worksheet.edit_permission {
        meta.push("read-only".to_string());
    }
    vec![
        Line::from(Span::styled(
            worksheet.display_title().to_string(),
            theme.title_style,
        )),
        Line::from(Span::styled(meta.join(" · "), theme.meta_style)),
        Line::default(),
    ]
}

fn pane_area(area: Rect, width: WidthPreference) -> Rect {
    match width {
        WidthPreference::Expanded => area,
        WidthPreference::Default => {
            let pane_width = area.width.min(DEFAULT_PANE_WIDTH);
            Rect {
                x: area.x + (area.width - pane_width) / 2,
                width: pane_width,
                ..area
            }
        }
    }
}

fn draw_body(f: &mut Frame, app: &mut App, theme: &Theme, area: Rect) {
    let state = app.store.snapshot();
    let message = match state.view {
        WorksheetView::Empty | WorksheetView::Loading => Some("Loading worksheet…".to_string()),
        WorksheetView::NotFound => Some(format!(
            "Worksheet not found: {}",
            state.uuid.as_deref().unwrap_or_default()
        )),
        WorksheetView::Ready => None,
    };
    let worksheet = match (message, state.worksheet.as_deref()) {
        (None, Some(worksheet)) => worksheet,
        (message, _) => {
            let text = message.unwrap_or_else(|| "Loading worksheet…".to_string());
            f.render_widget(
                Paragraph::new(Span::styled(text, theme.meta_style)),
                pane_area(area, app.width),
            );
            return;
        }
    };

    let pane = pane_area(area, app.width);
    let header = header_lines(worksheet, theme);
    let header_height = u16::try_from(header.len()).unwrap_or(u16::MAX);
    let sticky = app
        .ui
        .sticky_header_lines
        .min(header_height)
        .min(pane.height);
    let content = layout_worksheet(
        worksheet,
        renderers(),
        theme,
        usize::from(pane.width),
        state.focus,
        &state.selection,
    );

    let mut lines = header.clone();
    lines.extend(content.lines.iter().cloned());
    let total = u16::try_from(lines.len()).unwrap_or(u16::MAX);

    let request = match content.item_span(state.focus) {
        Some(span) if state.focus != Focus::NONE => ScrollRequest {
            item_top: span.start.saturating_add(header_height),
            item_height: span.height,
            viewport_height: pane.height,
            sticky_height: sticky,
        },
        _ => ScrollRequest {
            item_top: 0,
            item_height: 1,
            viewport_height: pane.height,
            sticky_height: 0,
        },
    };
    app.ui.scroll.scroll_into_view(request, Instant::now());
    let max_offset = total.saturating_sub(pane.height);
    if app.ui.scroll.offset > max_offset {
        app.ui.scroll.offset = max_offset;
    }
    let offset = app.ui.scroll.offset;

    f.render_widget(Paragraph::new(lines).scroll((offset, 0)), pane);

    if offset > 0 && sticky > 0 {
        let sticky_area = Rect {
            height: sticky,
            ..pane
        };
        f.render_widget(Clear, sticky_area);
        let pinned: Vec<Line> = header.into_iter().take(usize::from(sticky)).collect();
        f.render_widget(
            Paragraph::new(pinned).style(theme.sticky_header_style),
            sticky_area,
        );
    }
}

fn draw_source_editor(f: &mut Frame, app: &mut App, theme: &Theme, area: Rect) {
    let saving = app.ui.source_saving;
    let Some(editor) = app.ui.source_editor.as_mut() else {
        return;
    };
    let title = if saving {
        "Source · saving…"
    } else {
        "Source · ctrl+s save · esc discard"
    };
    editor.set_block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme.dialog_border_style)
            .title(title),
    );
    editor.set_style(theme.input_text_style);
    editor.set_cursor_style(theme.input_cursor_style);
    editor.set_cursor_line_style(theme.input_cursor_line_style);
    f.render_widget(&*editor, area);
}

fn draw_terminal(f: &mut Frame, panel: &mut TerminalPanel, theme: &Theme, area: Rect) {
    let title = if panel.focused {
        "Terminal · enter run · tab complete · esc leave"
    } else {
        "Terminal · c c to focus"
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.terminal_border_style)
        .title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(inner);

    let visible = usize::from(rows[0].height);
    let skip = panel.output.len().saturating_sub(visible);
    let output: Vec<Line> = panel
        .output
        .iter()
        .skip(skip)
        .map(|line| Line::from(Span::styled(line.clone(), theme.terminal_output_style)))
        .collect();
    f.render_widget(Paragraph::new(output), rows[0]);

    panel.input.set_style(theme.input_text_style);
    panel.input.set_cursor_line_style(theme.input_cursor_line_style);
    if panel.focused {
        panel.input.set_cursor_style(theme.input_cursor_style);
    } else {
        panel.input.set_cursor_style(theme.input_text_style);
    }
    let input_row = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(rows[1]);
    f.render_widget(Paragraph::new(Span::styled("$ ", theme.hint_style)), input_row[0]);
    f.render_widget(&panel.input, input_row[1]);
}

fn draw_prompt(f: &mut Frame, app: &mut App, theme: &Theme, area: Rect) {
    let Some(prompt) = app.ui.prompt.as_mut() else {
        return;
    };
    let label = prompt.kind.label();
    prompt.textarea.set_block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme.dialog_border_style)
            .title(format!("{label} · enter submit · esc cancel")),
    );
    prompt.textarea.set_style(theme.input_text_style);
    prompt.textarea.set_cursor_style(theme.input_cursor_style);
    prompt
        .textarea
        .set_cursor_line_style(theme.input_cursor_line_style);
    f.render_widget(&prompt.textarea, area);
}

fn draw_status_line(f: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let line = match app.ui.toast_message() {
        Some(message) => Line::from(Span::styled(format!(" {message} "), theme.toast_style)),
        None => Line::from(Span::styled(status_hint(app), theme.hint_style)),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn status_hint(app: &App) -> String {
    let focus = app.focus();
    let position = if focus.is_none() {
        String::from("top")
    } else {
        format!("block {} row {}", focus.block, focus.sub)
    };
    let width = match app.width {
        WidthPreference::Default => "",
        WidthPreference::Expanded => " · wide",
    };
    format!("{position}{width} · ? help · q quit")
}

/// A `percent_x` by `percent_y` rectangle centred in `area`.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn dialog_lines(app: &App, dialog: &DialogState, theme: &Theme) -> Vec<Line<'static>> {
    let selected = app.store.state().selection.len();
    let count = |verb: &str| format!("{verb} {selected} selected bundle(s).");
    let confirm_hint = Line::from(Span::styled("enter confirm · esc cancel", theme.hint_style));
    match dialog {
        DialogState::Idle => Vec::new(),
        DialogState::ConfirmDelete { force, focused } => vec![
            Line::from(match focused {
                Some(uuid) => format!("This deletes bundle {uuid}."),
                None => count("This deletes"),
            }),
            Line::from(vec![
                Span::styled("[f] force delete: ", theme.text_style),
                Span::styled(
                    if *force { "on" } else { "off" },
                    if *force {
                        theme.error_style
                    } else {
                        theme.meta_style
                    },
                ),
            ]),
            Line::default(),
            confirm_hint,
        ],
        DialogState::ConfirmKill => vec![Line::from(count("This kills")), Line::default(), confirm_hint],
        DialogState::ConfirmDetach => vec![
            Line::from(count("This detaches")),
            Line::from(Span::styled(
                "The bundles stay on the server.",
                theme.meta_style,
            )),
            Line::default(),
            confirm_hint,
        ],
        DialogState::ConfirmDeleteBlock {
            item_type, preview, ..
        } => vec![
            Line::from(format!("Remove this {item_type} from the worksheet?")),
            Line::from(Span::styled(preview.clone(), theme.quote_style)),
            Line::default(),
            confirm_hint,
        ],
        DialogState::ConfirmDeleteWorksheet => {
            let title = app
                .worksheet()
                .map(|ws| ws.display_title().to_string())
                .unwrap_or_default();
            vec![
                Line::from(format!("Delete \"{title}\"?")),
                Line::from(Span::styled("This cannot be undone.", theme.error_style)),
                Line::default(),
                confirm_hint,
            ]
        }
        DialogState::ShowError { message } => {
            let mut lines: Vec<Line<'static>> = message
                .lines()
                .map(|line| Line::from(Span::styled(line.to_string(), theme.error_style)))
                .collect();
            lines.push(Line::default());
            lines.push(Line::from(Span::styled("enter / esc close", theme.hint_style)));
            lines
        }
        DialogState::ShowCopy { text } => {
            let mut lines: Vec<Line<'static>> =
                text.lines().map(|line| Line::from(line.to_string())).collect();
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                "Also placed on the system clipboard · esc close",
                theme.hint_style,
            )));
            lines
        }
        DialogState::ShowPaste { entries } => {
            let mut lines: Vec<Line<'static>> = entries
                .iter()
                .map(|entry| {
                    Line::from(vec![
                        Span::styled(entry.name.clone(), theme.text_style),
                        Span::styled(format!("  {}", entry.uuid), theme.meta_style),
                    ])
                })
                .collect();
            if lines.is_empty() {
                lines.push(Line::from(Span::styled(
                    "The clipboard is empty.",
                    theme.meta_style,
                )));
            }
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                "enter paste below focus · esc cancel",
                theme.hint_style,
            )));
            lines
        }
    }
}

fn draw_dialog(f: &mut Frame, app: &App, theme: &Theme) {
    let dialog = app.store.state().dialog.clone();
    let area = centered_rect(60, 40, f.area());
    let border = if matches!(dialog, DialogState::ShowError { .. }) {
        theme.error_style
    } else {
        theme.dialog_border_style
    };
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(dialog_lines(app, &dialog, theme))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border)
                    .title(dialog.title()),
            ),
        area,
    );
}

fn bundle_info_lines(app: &App, uuid: &str, theme: &Theme) -> Vec<Line<'static>> {
    let Some(row) = app
        .worksheet()
        .and_then(|ws| ws.bundle_rows().find(|row| row.uuid == uuid))
    else {
        return vec![Line::from(Span::styled(
            format!("Bundle {uuid} is no longer on this worksheet."),
            theme.meta_style,
        ))];
    };
    let field = |name: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{name:<14}"), theme.table_header_style),
            Span::styled(value, theme.text_style),
        ])
    };
    let mut lines = vec![
        field("uuid", row.uuid.clone()),
        field("name", row.name.clone()),
        field("type", row.bundle_type.clone()),
        Line::from(vec![
            Span::styled(format!("{:<14}", "state"), theme.table_header_style),
            Span::styled(row.state.to_string(), theme.state_style(&row.state)),
        ]),
    ];
    if let Some(command) = &row.command {
        lines.push(field("command", command.clone()));
    }
    if !row.dependencies.is_empty() {
        lines.push(field("dependencies", row.dependencies.join(", ")));
    }
    for (key, value) in &row.metadata {
        let shown = match value {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        lines.push(field(key, shown));
    }
    lines
}

fn draw_info_modal(f: &mut Frame, app: &App, theme: &Theme, modal: &InfoModal) {
    let (title, lines) = match modal {
        InfoModal::Help => ("Keyboard shortcuts · esc close", help_lines(theme)),
        InfoModal::BundleInfo { uuid } => ("Bundle · esc close", bundle_info_lines(app, uuid, theme)),
    };
    let area = centered_rect(80, 80, f.area());
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.dialog_border_style)
                .title(title),
        ),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::{apply_action, AppAction, AppActionContext};
    use crate::core::focus::ReloadIntent;
    use crate::utils::test_utils::{
        create_test_app, markup_block_json, table_block_json, worksheet_json,
    };
    use ratatui::{backend::TestBackend, Terminal};

    fn screen(app: &mut App, width: u16, height: u16) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| buffer[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect()
    }

    fn loaded_app(blocks: Vec<crate::api::BlockPayload>) -> (App, tempfile::TempDir) {
        let (mut app, _api, dir) = create_test_app();
        app.open_worksheet("0xABCD", true);
        apply_action(
            &mut app,
            AppAction::WorksheetLoaded {
                uuid: "0xABCD".to_string(),
                intent: ReloadIntent::Reset,
                result: Ok(worksheet_json(blocks)),
            },
            AppActionContext::default(),
        );
        (app, dir)
    }

    #[test]
    fn loading_view_before_the_worksheet_arrives() {
        let (mut app, _api, _dir) = create_test_app();
        app.open_worksheet("0xABCD", true);
        let rows = screen(&mut app, 60, 10);
        assert!(rows.iter().any(|row| row.contains("Loading worksheet")));
    }

    #[test]
    fn ready_worksheet_shows_title_and_rows() {
        let (mut app, _dir) = loaded_app(vec![
            markup_block_json("Hello **world**", &[1]),
            table_block_json(&[("0x1", "running")], &[10]),
        ]);
        let rows = screen(&mut app, 80, 16);
        assert!(rows.iter().any(|row| row.contains("Test Worksheet")));
        assert!(rows.iter().any(|row| row.contains("Hello world")));
        assert!(rows.iter().any(|row| row.contains("0x1") && row.contains("running")));
    }

    #[test]
    fn dialogs_draw_over_the_worksheet() {
        let (mut app, _dir) = loaded_app(vec![markup_block_json("text", &[1])]);
        app.store.set_dialog(DialogState::ShowError {
            message: "boom".to_string(),
        });
        let rows = screen(&mut app, 80, 20);
        assert!(rows.iter().any(|row| row.contains("Error")));
        assert!(rows.iter().any(|row| row.contains("boom")));
    }

    #[test]
    fn focus_below_the_fold_scrolls_into_view() {
        let text = (0..40).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n\n");
        let (mut app, _dir) = loaded_app(vec![
            markup_block_json(&text, &[1]),
            table_block_json(&[("0xlast", "ready")], &[10]),
        ]);
        apply_action(&mut app, AppAction::MoveEnd, AppActionContext::default());
        let rows = screen(&mut app, 80, 12);
        assert!(app.ui.scroll.offset > 0);
        assert!(rows.iter().any(|row| row.contains("0xlast")));
        // The sticky header covers the top of the pane.
        assert!(rows[1].contains("Test Worksheet"));
    }

    #[test]
    fn default_width_is_centred() {
        let area = Rect::new(0, 0, 140, 10);
        assert_eq!(pane_area(area, WidthPreference::Default), Rect::new(20, 0, 100, 10));
        assert_eq!(pane_area(area, WidthPreference::Expanded), area);
    }

    #[test]
    fn help_modal_lists_shortcuts() {
        let (mut app, _dir) = loaded_app(vec![markup_block_json("text", &[1])]);
        app.ui.info_modal = Some(InfoModal::Help);
        let rows = screen(&mut app, 100, 40);
        assert!(rows.iter().any(|row| row.contains("Keyboard shortcuts")));
        assert!(rows.iter().any(|row| row.contains("Go to top")));
    }
}
