use std::sync::Arc;

use tracing::debug;

use crate::api::WorksheetApi;
use crate::core::clipboard::{
    Clipboard, ClipboardEntry, OriginStore, PreferenceStore, WidthPreference,
};
use crate::core::config::data::Config;
use crate::core::focus::{Focus, ReloadIntent};
use crate::core::poller::{spawn_poller, BackoffSchedule, PollTarget, PollerChange, PollerSlot};
use crate::core::selection::{instance_id, ResetFn, SelectionModel};
use crate::core::source::SourceSession;
use crate::core::store::{WorksheetStore, WorksheetView};
use crate::core::worksheet::{Block, BundleRow, Worksheet};

pub mod actions;
pub mod history;
pub mod reload;
pub mod ui_state;

#[cfg(test)]
mod tests;

pub use actions::{
    apply_action, apply_actions, execute, AppAction, AppActionContext, AppActionDispatcher,
    AppActionEnvelope, AppCommand,
};
pub use history::NavigationHistory;
pub use ui_state::{KeyContext, UiState};

/// Everything needed to build an [`App`].
pub struct AppInit {
    pub api: Arc<dyn WorksheetApi>,
    pub server_url: String,
    pub origin: OriginStore,
    pub poll_schedule: BackoffSchedule,
    pub toast_duration: std::time::Duration,
    pub sticky_header_lines: u16,
}

impl AppInit {
    pub fn from_config(
        config: &Config,
        api: Arc<dyn WorksheetApi>,
        server_url: String,
        origin: OriginStore,
    ) -> Self {
        Self {
            api,
            server_url,
            origin,
            poll_schedule: config.poll_schedule(),
            toast_duration: config.toast_duration(),
            sticky_header_lines: config.sticky_header_lines(),
        }
    }

    #[cfg(test)]
    pub fn default_for_tests() -> Self {
        Self::from_config(
            &Config::default(),
            Arc::new(crate::utils::test_utils::FakeApi::default()),
            "https://worksheets.test".to_string(),
            OriginStore::new(&std::env::temp_dir(), "https://worksheets.test"),
        )
    }
}

/// The interactive worksheet client. Owns the store and every collaborator
/// that mutates it; async work leaves as [`AppCommand`]s and comes back as
/// [`AppAction`]s.
pub struct App {
    pub store: WorksheetStore,
    pub selection: SelectionModel,
    pub clipboard: Clipboard,
    pub preferences: PreferenceStore,
    pub width: WidthPreference,
    pub api: Arc<dyn WorksheetApi>,
    pub server_url: String,
    pub ui: UiState,
    pub history: NavigationHistory,
    pub source_session: Option<SourceSession>,
    pub poll_schedule: BackoffSchedule,
    poller: PollerSlot,
    dispatcher: Option<AppActionDispatcher>,
}

impl App {
    pub fn new(init: AppInit) -> Self {
        let clipboard = Clipboard::new(init.origin.clone());
        let preferences = PreferenceStore::new(init.origin);
        let width = preferences.load().width;
        let mut ui = UiState {
            toast_duration: init.toast_duration,
            sticky_header_lines: init.sticky_header_lines,
            ..UiState::default()
        };
        ui.show_paste_button = clipboard.has_entries();
        Self {
            store: WorksheetStore::new(),
            selection: SelectionModel::new(),
            clipboard,
            preferences,
            width,
            api: init.api,
            server_url: init.server_url,
            ui,
            history: NavigationHistory::default(),
            source_session: None,
            poll_schedule: init.poll_schedule,
            poller: PollerSlot::default(),
            dispatcher: None,
        }
    }

    /// Lets the app start background pollers that report through
    /// `dispatcher`.
    pub fn attach_dispatcher(&mut self, dispatcher: AppActionDispatcher) {
        self.dispatcher = Some(dispatcher);
        self.sync_poller();
    }

    pub fn worksheet(&self) -> Option<&Worksheet> {
        self.store.worksheet()
    }

    pub fn current_uuid(&self) -> Option<String> {
        self.store.state().uuid.clone()
    }

    pub fn focus(&self) -> Focus {
        self.store.state().focus
    }

    pub fn focused_block(&self) -> Option<&Block> {
        let focus = self.focus();
        self.worksheet().and_then(|ws| ws.block(focus.block))
    }

    pub fn focused_bundle(&self) -> Option<&BundleRow> {
        let focus = self.focus();
        self.worksheet()
            .and_then(|ws| ws.bundle_row(focus.block, focus.sub))
    }

    pub fn can_edit(&self) -> bool {
        self.worksheet().is_some_and(|ws| ws.edit_permission)
    }

    pub fn is_ready(&self) -> bool {
        self.store.state().view == WorksheetView::Ready
    }

    /// Sort key new items go after: the focused row's key for tables and
    /// bundle-bearing blocks, `-1` (top of the worksheet) otherwise.
    pub fn paste_sort_key(&self) -> i64 {
        let focus = self.focus();
        match self.focused_block() {
            Some(block) if block.is_tabular() || block.carries_bundles() => {
                block.sort_key_at(focus.sub).unwrap_or(-1)
            }
            _ => -1,
        }
    }

    /// Sort key for inserts relative to whatever is focused, including text
    /// blocks.
    pub fn insert_sort_key(&self) -> i64 {
        let focus = self.focus();
        self.focused_block()
            .and_then(|block| block.sort_key_at(focus.sub))
            .unwrap_or(-1)
    }

    /// Which key vocabulary is live.
    pub fn key_context(&self) -> KeyContext {
        let state = self.store.state();
        if state.dialog.is_open() {
            KeyContext::DialogOpen
        } else if self.ui.info_modal.is_some() {
            KeyContext::InformationModal
        } else if state.source_mode {
            KeyContext::SourceEdit
        } else if self.ui.prompt.is_some() {
            KeyContext::EditingField
        } else if self.ui.terminal.visible && self.ui.terminal.focused {
            KeyContext::TerminalFocus
        } else {
            KeyContext::Idle
        }
    }

    pub fn publish_selection(&mut self) {
        self.store.set_selection(self.selection.snapshot());
    }

    pub fn clear_selection(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        self.selection.clear();
        self.publish_selection();
    }

    /// Checkbox state is drawn from the published snapshot, so clearing has
    /// nothing to undo beyond logging.
    pub(crate) fn checkbox_reset(uuid: &str, block: i64, sub: usize) -> ResetFn {
        let instance = format!("{uuid}@{}", instance_id(block, sub));
        Box::new(move || debug!(%instance, "Checkbox reset"))
    }

    /// Clipboard entries for the selection, or for the focused bundle when
    /// nothing is selected.
    pub fn clipboard_entries(&self) -> Vec<ClipboardEntry> {
        let Some(worksheet) = self.worksheet() else {
            return Vec::new();
        };
        let uuids = if self.selection.is_empty() {
            self.focused_bundle()
                .map(|row| vec![row.uuid.clone()])
                .unwrap_or_default()
        } else {
            self.selection.selected_uuids()
        };
        uuids
            .into_iter()
            .map(|uuid| {
                let row = worksheet.bundle_rows().find(|row| row.uuid == uuid);
                ClipboardEntry {
                    name: row.map(|row| row.name.clone()).unwrap_or_default(),
                    id: row.and_then(|row| row.item_id),
                    uuid,
                }
            })
            .collect()
    }

    /// The poller target the current state calls for. Nothing is polled in
    /// source mode or before a worksheet is ready.
    pub fn poll_target(&self) -> Option<PollTarget> {
        let state = self.store.state();
        if state.source_mode || state.view != WorksheetView::Ready {
            return None;
        }
        let worksheet = state.worksheet.as_deref()?;
        let tracked = worksheet.pollable_uuids();
        if tracked.is_empty() {
            return None;
        }
        Some(PollTarget {
            worksheet_uuid: state.uuid.clone()?,
            tracked,
        })
    }

    /// Converge the live poller on [`App::poll_target`]. Without a
    /// dispatcher there is nowhere to report ticks, so nothing is spawned.
    pub fn sync_poller(&mut self) -> PollerChange {
        let desired = self.poll_target();
        let Some(dispatcher) = self.dispatcher.clone() else {
            return self.poller.stop();
        };
        let api = Arc::clone(&self.api);
        let schedule = self.poll_schedule;
        let change = self.poller.sync(desired, move |target| {
            spawn_poller(api, schedule, target, move |update| {
                dispatcher.dispatch(AppAction::PollResult { update });
            })
        });
        if change != PollerChange::Unchanged && change != PollerChange::Updated {
            debug!(?change, "Poller changed");
        }
        change
    }

    /// Cancel any live poller; used when the session ends.
    pub fn stop_poller(&mut self) {
        if self.poller.stop() == PollerChange::Stopped {
            debug!("Poller stopped");
        }
    }

    pub fn poller_running(&self) -> bool {
        self.poller.is_running()
    }

    /// Switch to `uuid`, dropping everything tied to the current worksheet.
    /// `record` adds a history entry (false for back/forward).
    pub fn open_worksheet(&mut self, uuid: &str, record: bool) -> AppCommand {
        self.selection.clear();
        self.source_session = None;
        self.ui.close_source_editor();
        self.ui.prompt = None;
        self.ui.info_modal = None;
        self.ui.scroll.reset();
        self.store.open(uuid);
        if record {
            self.history.push(uuid);
        }
        self.sync_poller();
        AppCommand::FetchWorksheet {
            uuid: uuid.to_string(),
            intent: ReloadIntent::Reset,
        }
    }

    /// Reload the current worksheet, if any.
    pub fn reload(&self, intent: ReloadIntent) -> Option<AppCommand> {
        self.current_uuid()
            .map(|uuid| AppCommand::FetchWorksheet { uuid, intent })
    }

    pub fn web_url(&self, path: &str) -> String {
        crate::utils::url::construct_api_url(&self.server_url, path)
    }
}
