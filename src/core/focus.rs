//! Focus coordinates, sentinel resolution, reload relocation and
//! scroll-into-view.
//!
//! Focus is a `(block, sub)` pair. `block == -1` means nothing is focused
//! (the cursor sits above the first block). `sub` addresses a row inside a
//! tabular block and is always 0 elsewhere.

use std::time::{Duration, Instant};

use crate::core::worksheet::Worksheet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Focus {
    pub block: i64,
    pub sub: usize,
}

impl Focus {
    pub const NONE: Focus = Focus { block: -1, sub: 0 };

    pub const fn new(block: i64, sub: usize) -> Self {
        Self { block, sub }
    }

    pub fn is_none(&self) -> bool {
        self.block < 0
    }
}

/// A coordinate that may be the `"end"` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    Index(i64),
    End,
}

/// Force `focus` into range for `worksheet`. The flag reports whether the
/// input had to change.
pub fn clamp_focus(worksheet: &Worksheet, focus: Focus) -> (Focus, bool) {
    let blocks = worksheet.blocks.len() as i64;
    if blocks == 0 || focus.block < 0 {
        return (Focus::NONE, focus != Focus::NONE);
    }
    let block = focus.block.min(blocks - 1);
    let rows = worksheet.row_count(block);
    let sub = focus.sub.min(rows.saturating_sub(1));
    let clamped = Focus::new(block, sub);
    (clamped, clamped != focus)
}

/// Index of the last block that carries bundles, falling back to the last
/// block of any kind.
fn end_block(worksheet: &Worksheet) -> i64 {
    worksheet
        .blocks
        .iter()
        .rposition(|block| block.carries_bundles())
        .map(|index| index as i64)
        .unwrap_or(worksheet.blocks.len() as i64 - 1)
}

/// Normalise sentinels. `End` at block level picks the last bundle-bearing
/// block; `End` at row level picks that block's last row (0 for
/// non-tabular blocks).
pub fn resolve(worksheet: &Worksheet, block: FocusTarget, sub: FocusTarget) -> Focus {
    if worksheet.blocks.is_empty() {
        return Focus::NONE;
    }
    let block = match block {
        FocusTarget::Index(index) => index,
        FocusTarget::End => end_block(worksheet),
    };
    let sub = match sub {
        FocusTarget::Index(index) => index.max(0) as usize,
        FocusTarget::End => match worksheet.block(block) {
            Some(b) if b.is_tabular() => b.row_count().saturating_sub(1),
            _ => 0,
        },
    };
    clamp_focus(worksheet, Focus::new(block, sub)).0
}

/// Uuids of every bundle at or after `focus`: the rest of the focused block
/// from `sub`, then all following blocks.
pub fn downstream_bundle_uuids(worksheet: &Worksheet, focus: Focus) -> Vec<String> {
    let start = focus.block.max(0) as usize;
    let mut uuids = Vec::new();
    for (index, block) in worksheet.blocks.iter().enumerate().skip(start) {
        let from = if index == start && !focus.is_none() {
            focus.sub
        } else {
            0
        };
        uuids.extend(block.bundle_uuids_from(from));
    }
    uuids
}

/// First coordinate whose sort key comes after `after_sort_key`; that is
/// where the server places freshly inserted items.
pub fn focus_after_sort_key(worksheet: &Worksheet, after_sort_key: i64) -> Option<Focus> {
    worksheet
        .blocks
        .iter()
        .enumerate()
        .find_map(|(block_index, block)| {
            block
                .sort_keys()
                .into_iter()
                .find(|(_, key)| *key > after_sort_key)
                .map(|(sub, _)| Focus::new(block_index as i64, sub))
        })
}

/// Where focus lands after a reload that may have changed block
/// boundaries.
///
/// * More bundles than before: the inserted position, computed from
///   `after_sort_key` when the insertion was local, else the end.
/// * Fewer bundles: the first downstream bundle that still exists, else the
///   end.
/// * Same count: the old focus, clamped.
pub fn relocate_after_reload(
    old: &Worksheet,
    new: &Worksheet,
    old_focus: Focus,
    after_sort_key: Option<i64>,
) -> Focus {
    let old_count = old.bundle_count();
    let new_count = new.bundle_count();

    if new_count > old_count {
        return after_sort_key
            .and_then(|key| focus_after_sort_key(new, key))
            .unwrap_or_else(|| resolve(new, FocusTarget::End, FocusTarget::End));
    }

    if new_count < old_count {
        if old_focus.is_none() {
            return Focus::NONE;
        }
        return downstream_bundle_uuids(old, old_focus)
            .iter()
            .find_map(|uuid| new.locate_bundle(uuid))
            .map(|(block, sub)| Focus::new(block, sub))
            .unwrap_or_else(|| resolve(new, FocusTarget::End, FocusTarget::End));
    }

    clamp_focus(new, old_focus).0
}

/// How the focus should be recomputed once a full reload lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadIntent {
    /// A different worksheet (or history step): nothing focused.
    Reset,
    /// Same layout expected; clamp only.
    KeepFocus,
    /// Items were inserted or removed. `after_sort_key` is set when the
    /// insertion point is known locally.
    Relocate { after_sort_key: Option<i64> },
    /// Returning from the source editor with the cursor on `raw_line`.
    FromSource { raw_line: usize },
}

/// One step down. Inside a table this walks rows; past the last block it
/// stays put.
pub fn move_down(worksheet: &Worksheet, focus: Focus) -> Focus {
    if worksheet.blocks.is_empty() {
        return Focus::NONE;
    }
    if focus.is_none() {
        return Focus::new(0, 0);
    }
    let rows = worksheet.row_count(focus.block);
    if focus.sub + 1 < rows {
        return Focus::new(focus.block, focus.sub + 1);
    }
    if (focus.block + 1) < worksheet.blocks.len() as i64 {
        return Focus::new(focus.block + 1, 0);
    }
    focus
}

/// One step up. At row 0 of a table this leaves the table, landing on the
/// last row of the previous block; above block 0 nothing is focused.
pub fn move_up(worksheet: &Worksheet, focus: Focus) -> Focus {
    if focus.is_none() {
        return Focus::NONE;
    }
    if focus.sub > 0 {
        return Focus::new(focus.block, focus.sub - 1);
    }
    if focus.block == 0 {
        return Focus::NONE;
    }
    resolve(
        worksheet,
        FocusTarget::Index(focus.block - 1),
        FocusTarget::End,
    )
}

pub fn move_top(worksheet: &Worksheet) -> Focus {
    if worksheet.blocks.is_empty() {
        Focus::NONE
    } else {
        Focus::new(0, 0)
    }
}

pub fn move_end(worksheet: &Worksheet) -> Focus {
    let last = worksheet.blocks.len() as i64 - 1;
    resolve(worksheet, FocusTarget::Index(last), FocusTarget::End)
}

/// Minimum spacing between two scroll adjustments.
pub const SCROLL_THROTTLE: Duration = Duration::from_millis(30);

/// The lines a focused item occupies in the rendered block pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRequest {
    pub item_top: u16,
    pub item_height: u16,
    pub viewport_height: u16,
    /// Lines at the top of the viewport covered by a sticky header.
    pub sticky_height: u16,
}

/// New offset needed to bring the item into the visible band, or `None`
/// when it is already visible.
pub fn visible_offset(current: u16, request: ScrollRequest) -> Option<u16> {
    let ScrollRequest {
        item_top,
        item_height,
        viewport_height,
        sticky_height,
    } = request;
    let band_top = current.saturating_add(sticky_height);
    let band_bottom = current.saturating_add(viewport_height);
    let item_bottom = item_top.saturating_add(item_height.max(1));

    if item_top >= band_top && item_bottom <= band_bottom {
        return None;
    }
    let aligned_top = item_top.saturating_sub(sticky_height);
    if item_top < band_top {
        return Some(aligned_top);
    }
    let aligned_bottom = item_bottom.saturating_sub(viewport_height);
    // Items taller than the band show their top.
    Some(aligned_bottom.min(aligned_top))
}

/// Scroll position of the block pane with best-effort throttling: while a
/// navigation key is held down, adjustments closer together than
/// [`SCROLL_THROTTLE`] are deferred to the next frame instead of applied.
#[derive(Debug, Clone, Default)]
pub struct ScrollState {
    pub offset: u16,
    last_adjust: Option<Instant>,
    pending: bool,
}

impl ScrollState {
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn request(&mut self) {
        self.pending = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply a pending request. Returns whether the offset moved.
    pub fn scroll_into_view(&mut self, request: ScrollRequest, now: Instant) -> bool {
        if !self.pending {
            return false;
        }
        if let Some(last) = self.last_adjust {
            if now.duration_since(last) < SCROLL_THROTTLE {
                return false;
            }
        }
        self.pending = false;
        match visible_offset(self.offset, request) {
            Some(offset) => {
                self.offset = offset;
                self.last_adjust = Some(now);
                true
            }
            None => false,
        }
    }
}
