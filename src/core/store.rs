//! Single source of truth for the interactive worksheet state.
//!
//! Every mutation replaces the shared [`StoreState`] snapshot with a new one
//! and then notifies subscribers in registration order. Snapshots are
//! immutable once published; readers hold an `Arc` and never observe a
//! half-applied change.

use std::sync::Arc;
use tracing::debug;

use crate::api::WorksheetPayload;
use crate::core::dialog::DialogState;
use crate::core::error::ErrorKind;
use crate::core::focus::{clamp_focus, Focus};
use crate::core::selection::SelectionSnapshot;
use crate::core::worksheet::Worksheet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorksheetView {
    /// Nothing opened yet.
    Empty,
    Loading,
    Ready,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct StoreState {
    /// The worksheet the user is looking at. Responses for any other uuid
    /// are stale.
    pub uuid: Option<String>,
    /// Bumped every time a different worksheet is opened.
    pub epoch: u64,
    pub view: WorksheetView,
    pub worksheet: Option<Arc<Worksheet>>,
    pub focus: Focus,
    pub selection: SelectionSnapshot,
    pub dialog: DialogState,
    pub source_mode: bool,
    pub revision: u64,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            uuid: None,
            epoch: 0,
            view: WorksheetView::Empty,
            worksheet: None,
            focus: Focus::NONE,
            selection: SelectionSnapshot::default(),
            dialog: DialogState::Idle,
            source_mode: false,
            revision: 0,
        }
    }
}

impl StoreState {
    pub fn is_current(&self, uuid: &str) -> bool {
        self.uuid.as_deref() == Some(uuid)
    }

    pub fn show_bulk_buttons(&self) -> bool {
        !self.selection.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn Fn(&StoreState) + Send + Sync>;

/// Result of a mutation that carries a server response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Yes,
    /// The response belonged to another worksheet and was dropped.
    Stale,
}

pub struct WorksheetStore {
    state: Arc<StoreState>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl Default for WorksheetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorksheetStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(StoreState::default()),
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn snapshot(&self) -> Arc<StoreState> {
        Arc::clone(&self.state)
    }

    /// Borrow the current snapshot without bumping the refcount.
    pub fn state(&self) -> &StoreState {
        &self.state
    }

    pub fn worksheet(&self) -> Option<&Worksheet> {
        self.state.worksheet.as_deref()
    }

    pub fn subscribe<F>(&mut self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&StoreState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|(existing, _)| *existing != id);
    }

    fn commit(&mut self, mut next: StoreState) {
        next.revision = self.state.revision + 1;
        self.state = Arc::new(next);
        for (_, subscriber) in &self.subscribers {
            subscriber(&self.state);
        }
    }

    fn draft(&self) -> StoreState {
        (*self.state).clone()
    }

    /// Start showing `uuid`. Everything tied to the previous worksheet is
    /// discarded, which also makes any in-flight response for it stale.
    pub fn open(&mut self, uuid: &str) {
        let next = StoreState {
            uuid: Some(uuid.to_string()),
            epoch: self.state.epoch + 1,
            view: WorksheetView::Loading,
            ..StoreState::default()
        };
        self.commit(next);
    }

    /// The server resolved the name we opened (`requested`) to `resolved`.
    /// The current view adopts the canonical uuid without a new epoch.
    pub fn adopt_uuid(&mut self, requested: &str, resolved: &str) -> Applied {
        if !self.state.is_current(requested) {
            return Applied::Stale;
        }
        if requested != resolved {
            let mut next = self.draft();
            next.uuid = Some(resolved.to_string());
            self.commit(next);
        }
        Applied::Yes
    }

    /// Install a freshly fetched worksheet. Focus is clamped to the new
    /// block list.
    pub fn set_worksheet(&mut self, worksheet: Worksheet) -> Applied {
        if !self.state.is_current(&worksheet.uuid) {
            debug!(
                kind = %ErrorKind::StaleResponse,
                response = %worksheet.uuid,
                current = ?self.state.uuid,
                "Dropping worksheet response"
            );
            return Applied::Stale;
        }
        let mut next = self.draft();
        let (focus, clamped) = clamp_focus(&worksheet, next.focus);
        if clamped {
            debug!(kind = %ErrorKind::FocusOutOfRange, from = ?next.focus, to = ?focus, "Clamped focus after reload");
        }
        next.focus = focus;
        next.worksheet = Some(Arc::new(worksheet));
        next.view = WorksheetView::Ready;
        self.commit(next);
        Applied::Yes
    }

    /// Merge a partial refresh. Unchanged rows (nulls) are left alone and no
    /// snapshot is published when nothing changed.
    pub fn patch_blocks(&mut self, payload: &WorksheetPayload) -> Applied {
        if !self.state.is_current(&payload.uuid) {
            debug!(
                kind = %ErrorKind::StaleResponse,
                response = %payload.uuid,
                "Dropping partial refresh"
            );
            return Applied::Stale;
        }
        let Some(current) = self.state.worksheet.as_deref() else {
            return Applied::Stale;
        };
        let mut worksheet = current.clone();
        if worksheet.merge_partial(payload) {
            let mut next = self.draft();
            next.worksheet = Some(Arc::new(worksheet));
            self.commit(next);
        }
        Applied::Yes
    }

    pub fn set_not_found(&mut self, uuid: &str) -> Applied {
        if !self.state.is_current(uuid) {
            return Applied::Stale;
        }
        let mut next = self.draft();
        next.view = WorksheetView::NotFound;
        next.worksheet = None;
        next.focus = Focus::NONE;
        self.commit(next);
        Applied::Yes
    }

    /// Out-of-range coordinates are clamped rather than rejected; refreshes
    /// routinely arrive with fewer blocks than the focus was computed for.
    pub fn set_focus(&mut self, focus: Focus) {
        let focus = match self.state.worksheet.as_deref() {
            Some(worksheet) => {
                let (clamped_focus, clamped) = clamp_focus(worksheet, focus);
                if clamped {
                    debug!(kind = %ErrorKind::FocusOutOfRange, from = ?focus, to = ?clamped_focus, "Clamped focus");
                }
                clamped_focus
            }
            None => Focus::NONE,
        };
        if focus == self.state.focus {
            return;
        }
        let mut next = self.draft();
        next.focus = focus;
        self.commit(next);
    }

    pub fn set_selection(&mut self, selection: SelectionSnapshot) {
        let mut next = self.draft();
        next.selection = selection;
        self.commit(next);
    }

    pub fn set_dialog(&mut self, dialog: DialogState) {
        let mut next = self.draft();
        next.dialog = dialog;
        self.commit(next);
    }

    pub fn set_source_mode(&mut self, enabled: bool) {
        if self.state.source_mode == enabled {
            return;
        }
        let mut next = self.draft();
        next.source_mode = enabled;
        self.commit(next);
    }
}
