//! Translating focus between the block view and the raw source editor.

use tracing::debug;

use crate::core::error::ErrorKind;
use crate::core::focus::{clamp_focus, Focus};
use crate::core::worksheet::{Block, RawLookup, Worksheet};

/// Raw line the editor cursor should start on for `focus`.
///
/// Search directives expand into many rendered rows but come from a single
/// source line, so their row index is ignored. A missing entry falls back to
/// the block's first row, then to the top of the file.
pub fn raw_line_for_focus(worksheet: &Worksheet, focus: Focus) -> usize {
    if focus.is_none() {
        return 0;
    }
    let sub = match worksheet.block(focus.block) {
        Some(Block::SearchDirective(_)) => 0,
        Some(block) if !block.is_tabular() => 0,
        _ => focus.sub,
    };
    let tables = &worksheet.tables;
    tables
        .raw_line_for(focus.block, sub)
        .or_else(|| tables.raw_line_for(focus.block, 0))
        .unwrap_or(0)
}

/// Focus for a cursor on `raw_line` once the worksheet has been
/// reinterpreted.
pub fn focus_for_raw_line(worksheet: &Worksheet, raw_line: usize) -> Focus {
    if worksheet.blocks.is_empty() {
        return Focus::NONE;
    }
    match worksheet.tables.block_for_raw(raw_line) {
        RawLookup::Found(block, _) if block < 0 => Focus::NONE,
        RawLookup::Found(block, sub) => {
            let (focus, clamped) = clamp_focus(worksheet, Focus::new(block, sub.max(0) as usize));
            if clamped {
                debug!(kind = %ErrorKind::FocusOutOfRange, raw_line, ?focus, "Clamped source focus");
            }
            focus
        }
        RawLookup::Undefined => Focus::new(0, 0),
        RawLookup::NoTable => Focus::NONE,
    }
}

/// State captured when the source editor opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSession {
    pub original: Vec<String>,
    pub entry_focus: Focus,
    pub entry_line: usize,
}

/// What leaving the editor with "save" requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitPlan {
    /// Nothing changed; restore focus locally.
    Unchanged { focus: Focus },
    /// Persist `lines`, then reload and focus from `raw_line`.
    Save { lines: Vec<String>, raw_line: usize },
}

impl SourceSession {
    pub fn enter(worksheet: &Worksheet, focus: Focus) -> Self {
        Self {
            original: worksheet.source.clone(),
            entry_focus: focus,
            entry_line: raw_line_for_focus(worksheet, focus),
        }
    }

    pub fn plan_exit(
        &self,
        worksheet: &Worksheet,
        edited: Vec<String>,
        cursor_line: usize,
    ) -> ExitPlan {
        if edited == self.original {
            let focus = if cursor_line == self.entry_line {
                self.entry_focus
            } else {
                focus_for_raw_line(worksheet, cursor_line)
            };
            return ExitPlan::Unchanged { focus };
        }
        ExitPlan::Save {
            lines: edited,
            raw_line: cursor_line,
        }
    }
}
