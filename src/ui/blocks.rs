//! Per-mode block renderers and the worksheet layout built from them.
//!
//! Every renderer turns one [`Block`] into styled lines plus the line span of
//! each focusable row, so the pane can scroll the focused item into view.
//! Modes without a renderer fall back to a one-line placeholder.

use std::collections::HashMap;

use ratatui::text::{Line, Span};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::core::focus::Focus;
use crate::core::selection::{instance_id, SelectionSnapshot};
use crate::core::worksheet::{Block, Worksheet};
use crate::ui::markup::render_markup;
use crate::ui::theme::Theme;

/// Width of the focus marker plus checkbox gutter in front of every item.
pub const GUTTER_WIDTH: usize = 6;
const FOCUS_MARKER: &str = "▌ ";
const NO_MARKER: &str = "  ";
const COLUMN_GAP: usize = 2;
const MIN_COLUMN_WIDTH: usize = 4;

/// Lines `[start, start + height)` of a rendered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    pub start: u16,
    pub height: u16,
}

#[derive(Debug, Default)]
pub struct BlockLines {
    pub lines: Vec<Line<'static>>,
    /// One span per focusable row, relative to the block's first line.
    pub rows: Vec<RowSpan>,
}

impl BlockLines {
    /// A block that is focusable as a whole.
    fn single(lines: Vec<Line<'static>>) -> Self {
        let height = u16::try_from(lines.len().max(1)).unwrap_or(u16::MAX);
        Self {
            lines,
            rows: vec![RowSpan { start: 0, height }],
        }
    }
}

pub struct BlockContext<'a> {
    pub theme: &'a Theme,
    pub width: usize,
    pub index: i64,
    pub focus: Focus,
    pub selection: &'a SelectionSnapshot,
}

impl BlockContext<'_> {
    fn focused(&self, sub: usize) -> bool {
        self.focus.block == self.index && self.focus.sub == sub
    }

    fn block_focused(&self) -> bool {
        self.focus.block == self.index
    }

    /// Room left for content after the gutter.
    fn content_width(&self) -> usize {
        self.width.saturating_sub(GUTTER_WIDTH).max(8)
    }

    fn marker(&self, focused: bool) -> Span<'static> {
        if focused {
            Span::styled(FOCUS_MARKER, self.theme.focus_marker_style)
        } else {
            Span::raw(NO_MARKER)
        }
    }

    fn checkbox(&self, uuid: &str, sub: usize) -> Span<'static> {
        if self.selection.is_checked(uuid, &instance_id(self.index, sub)) {
            Span::styled("[x] ", self.theme.selected_style)
        } else {
            Span::styled("[ ] ", self.theme.meta_style)
        }
    }

    /// Prefix plain content lines with the focus marker and blank checkbox
    /// column.
    fn gutter(&self, lines: Vec<Line<'static>>, focused: bool) -> Vec<Line<'static>> {
        lines
            .into_iter()
            .map(|line| {
                let mut spans = vec![self.marker(focused), Span::raw("    ")];
                spans.extend(line.spans);
                let line = Line::from(spans);
                if focused {
                    line.patch_style(self.theme.focused_row_style)
                } else {
                    line
                }
            })
            .collect()
    }
}

pub type RenderFn = fn(&Block, &BlockContext<'_>) -> BlockLines;

/// Renderers keyed by block mode.
pub struct BlockRenderers {
    by_mode: HashMap<&'static str, RenderFn>,
}

impl BlockRenderers {
    pub fn standard() -> Self {
        let mut by_mode: HashMap<&'static str, RenderFn> = HashMap::new();
        by_mode.insert("markup_block", render_markup_block);
        by_mode.insert("table_block", render_table_block);
        by_mode.insert("subworksheets_block", render_subworksheets_block);
        by_mode.insert("schema_block", render_schema_block);
        by_mode.insert("search_block", render_search_block);
        by_mode.insert("wsearch_block", render_search_block);
        by_mode.insert("image_block", render_bundle_output_block);
        by_mode.insert("graph_block", render_bundle_output_block);
        Self { by_mode }
    }

    pub fn supports(&self, mode: &str) -> bool {
        self.by_mode.contains_key(mode)
    }

    pub fn render(&self, block: &Block, ctx: &BlockContext<'_>) -> BlockLines {
        let render = self
            .by_mode
            .get(block.mode())
            .copied()
            .unwrap_or(render_unsupported);
        render(block, ctx)
    }
}

impl Default for BlockRenderers {
    fn default() -> Self {
        Self::standard()
    }
}

fn render_unsupported(block: &Block, ctx: &BlockContext<'_>) -> BlockLines {
    let line = Line::from(Span::styled(
        format!("unsupported block: {}", block.mode()),
        ctx.theme.unsupported_style,
    ));
    BlockLines::single(ctx.gutter(vec![line], ctx.block_focused()))
}

fn render_markup_block(block: &Block, ctx: &BlockContext<'_>) -> BlockLines {
    let Block::Markup(markup) = block else {
        return render_unsupported(block, ctx);
    };
    let mut lines = render_markup(&markup.text, ctx.theme, ctx.content_width());
    if lines.is_empty() {
        lines.push(Line::from(Span::styled("(empty)", ctx.theme.meta_style)));
    }
    BlockLines::single(ctx.gutter(lines, ctx.block_focused()))
}

fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if used + ch_width + 1 > width {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    out.push('…');
    out
}

fn pad(text: &str, width: usize) -> String {
    let shown = truncate(text, width);
    let fill = width.saturating_sub(shown.width());
    format!("{shown}{}", " ".repeat(fill))
}

/// Natural column widths shrunk until they fit `available`. The widest
/// column gives up space first.
pub fn fit_columns(natural: &[usize], available: usize) -> Vec<usize> {
    let mut widths: Vec<usize> = natural.iter().map(|w| (*w).max(1)).collect();
    let gaps = COLUMN_GAP * widths.len().saturating_sub(1);
    loop {
        let total: usize = widths.iter().sum::<usize>() + gaps;
        if total <= available {
            break;
        }
        let Some((index, widest)) = widths
            .iter()
            .copied()
            .enumerate()
            .max_by_key(|(_, width)| *width)
        else {
            break;
        };
        if widest <= MIN_COLUMN_WIDTH {
            break;
        }
        widths[index] = (widest - (total - available).min(widest - MIN_COLUMN_WIDTH)).max(MIN_COLUMN_WIDTH);
    }
    widths
}

fn render_table_block(block: &Block, ctx: &BlockContext<'_>) -> BlockLines {
    let Block::BundleTable(table) = block else {
        return render_unsupported(block, ctx);
    };
    let theme = ctx.theme;
    let mut out = BlockLines::default();

    let mut header: Vec<String> = table.header.clone();
    let state_column = !header.iter().any(|column| column == "state");
    if state_column {
        header.push("state".to_string());
    }
    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            let mut cells: Vec<String> = (0..table.header.len())
                .map(|i| row.cells.get(i).cloned().unwrap_or_default())
                .collect();
            if state_column {
                cells.push(row.state.as_str().to_string());
            }
            cells
        })
        .collect();
    let natural: Vec<usize> = (0..header.len())
        .map(|i| {
            cells
                .iter()
                .map(|row| row[i].width())
                .chain(std::iter::once(header[i].width()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let widths = fit_columns(&natural, ctx.content_width());
    let gap = " ".repeat(COLUMN_GAP);

    let header_text = header
        .iter()
        .zip(&widths)
        .map(|(name, width)| pad(name, *width))
        .collect::<Vec<_>>()
        .join(&gap);
    out.lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled(header_text.trim_end().to_string(), theme.table_header_style),
    ]));

    if table.rows.is_empty() {
        let focused = ctx.focused(0);
        out.rows.push(RowSpan { start: 1, height: 1 });
        out.lines.extend(ctx.gutter(
            vec![Line::from(Span::styled("(no bundles)", theme.meta_style))],
            focused,
        ));
        return out;
    }

    for (sub, (row, cells)) in table.rows.iter().zip(&cells).enumerate() {
        let focused = ctx.focused(sub);
        let mut spans = vec![ctx.marker(focused), ctx.checkbox(&row.uuid, sub)];
        for (i, (cell, width)) in cells.iter().zip(&widths).enumerate() {
            if i > 0 {
                spans.push(Span::raw(gap.clone()));
            }
            let is_state = header[i] == "state";
            let style = if is_state {
                theme.state_style(&row.state)
            } else {
                theme.text_style
            };
            spans.push(Span::styled(pad(cell, *width), style));
        }
        let mut line = Line::from(spans);
        if focused {
            line = line.patch_style(theme.focused_row_style);
        }
        out.rows.push(RowSpan {
            start: u16::try_from(out.lines.len()).unwrap_or(u16::MAX),
            height: 1,
        });
        out.lines.push(line);
    }
    out
}

fn render_subworksheets_block(block: &Block, ctx: &BlockContext<'_>) -> BlockLines {
    let Block::Subworksheets(list) = block else {
        return render_unsupported(block, ctx);
    };
    let theme = ctx.theme;
    let mut out = BlockLines::default();
    if list.items.is_empty() {
        out.rows.push(RowSpan { start: 0, height: 1 });
        out.lines.extend(ctx.gutter(
            vec![Line::from(Span::styled("(no worksheets)", theme.meta_style))],
            ctx.focused(0),
        ));
        return out;
    }
    for (sub, item) in list.items.iter().enumerate() {
        let focused = ctx.focused(sub);
        let title = item.title.as_deref().filter(|t| !t.is_empty()).unwrap_or(&item.name);
        let label = truncate(title, ctx.content_width().saturating_sub(4));
        let line = Line::from(vec![
            Span::styled("↳ ", theme.meta_style),
            Span::styled(label, theme.link_style),
            Span::styled(format!("  {}", item.name), theme.meta_style),
        ]);
        out.rows.push(RowSpan {
            start: u16::try_from(out.lines.len()).unwrap_or(u16::MAX),
            height: 1,
        });
        out.lines.extend(ctx.gutter(vec![line], focused));
    }
    out
}

fn render_schema_block(block: &Block, ctx: &BlockContext<'_>) -> BlockLines {
    let Block::Schema(schema) = block else {
        return render_unsupported(block, ctx);
    };
    let theme = ctx.theme;
    let mut lines = vec![Line::from(vec![
        Span::styled("schema ", theme.directive_style),
        Span::styled(schema.schema_name.clone(), theme.heading_style),
    ])];
    for column in &schema.columns {
        let mut spans = vec![Span::styled(format!("  {}", column.name), theme.text_style)];
        if let Some(path) = &column.path {
            spans.push(Span::styled(format!("  {path}"), theme.code_style));
        }
        if let Some(post) = &column.post_processor {
            spans.push(Span::styled(format!("  {post}"), theme.meta_style));
        }
        lines.push(Line::from(spans));
    }
    BlockLines::single(ctx.gutter(lines, ctx.block_focused()))
}

fn render_search_block(block: &Block, ctx: &BlockContext<'_>) -> BlockLines {
    let Block::SearchDirective(search) = block else {
        return render_unsupported(block, ctx);
    };
    let line = Line::from(vec![
        Span::styled("search ", ctx.theme.directive_style),
        Span::styled(search.keywords.join(" "), ctx.theme.code_style),
    ]);
    BlockLines::single(ctx.gutter(vec![line], ctx.block_focused()))
}

fn render_bundle_output_block(block: &Block, ctx: &BlockContext<'_>) -> BlockLines {
    let (Block::Image(rendered) | Block::Graph(rendered)) = block else {
        return render_unsupported(block, ctx);
    };
    let kind = rendered.mode.trim_end_matches("_block");
    let mut lines = vec![Line::from(vec![
        Span::styled(format!("[{kind}] "), ctx.theme.directive_style),
        Span::styled(rendered.bundle_uuids.join(", "), ctx.theme.meta_style),
    ])];
    if let Some(text) = rendered.text.as_deref().filter(|t| !t.trim().is_empty()) {
        lines.extend(
            text.lines()
                .map(|line| Line::from(Span::styled(line.to_string(), ctx.theme.text_style))),
        );
    }
    BlockLines::single(ctx.gutter(lines, ctx.block_focused()))
}

/// Every block of a worksheet stacked with blank separators.
#[derive(Debug, Default)]
pub struct WorksheetLines {
    pub lines: Vec<Line<'static>>,
    items: HashMap<(i64, usize), RowSpan>,
}

impl WorksheetLines {
    pub fn item_span(&self, focus: Focus) -> Option<RowSpan> {
        self.items.get(&(focus.block, focus.sub)).copied()
    }

    pub fn height(&self) -> u16 {
        u16::try_from(self.lines.len()).unwrap_or(u16::MAX)
    }
}

pub fn layout_worksheet(
    worksheet: &Worksheet,
    renderers: &BlockRenderers,
    theme: &Theme,
    width: usize,
    focus: Focus,
    selection: &SelectionSnapshot,
) -> WorksheetLines {
    let mut out = WorksheetLines::default();
    for (index, block) in worksheet.blocks.iter().enumerate() {
        if index > 0 {
            out.lines.push(Line::default());
        }
        let ctx = BlockContext {
            theme,
            width,
            index: index as i64,
            focus,
            selection,
        };
        let rendered = renderers.render(block, &ctx);
        let base = u16::try_from(out.lines.len()).unwrap_or(u16::MAX);
        for (sub, span) in rendered.rows.iter().enumerate() {
            out.items.insert(
                (index as i64, sub),
                RowSpan {
                    start: base.saturating_add(span.start),
                    height: span.height,
                },
            );
        }
        out.lines.extend(rendered.lines);
    }
    if worksheet.blocks.is_empty() {
        out.lines.push(Line::from(Span::styled(
            "This worksheet is empty.",
            theme.meta_style,
        )));
    }
    out
}
