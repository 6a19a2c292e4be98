//! Keybinding handler implementations
//!
//! Nearly every key maps to one [`AppAction`]; the reducer decides what it
//! means in the current state. Only quitting bypasses the action queue so
//! the loop can stop without waiting for the next drain.

use ratatui::crossterm::event::KeyEvent;
use ratatui::prelude::Size;

use crate::core::app::{AppAction, AppActionContext, AppActionDispatcher};
use crate::ui::worksheet_loop::keybindings::registry::{KeyHandler, KeyResult};
use crate::ui::worksheet_loop::{AppHandle, KeyLoopAction};

/// Dispatches a fresh action built by `make`.
pub struct ActionHandler {
    make: fn() -> AppAction,
}

impl ActionHandler {
    pub fn new(make: fn() -> AppAction) -> Self {
        Self { make }
    }
}

#[async_trait::async_trait]
impl KeyHandler for ActionHandler {
    async fn handle(
        &self,
        _app: &AppHandle,
        dispatcher: &AppActionDispatcher,
        _key: &KeyEvent,
        term_size: Size,
    ) -> KeyResult {
        dispatcher.dispatch_many(
            [(self.make)()],
            AppActionContext {
                term_width: term_size.width,
                term_height: term_size.height,
            },
        );
        KeyResult::Handled
    }
}

/// Handler for Ctrl+C (quit from anywhere)
pub struct ExitHandler;

#[async_trait::async_trait]
impl KeyHandler for ExitHandler {
    async fn handle(
        &self,
        app: &AppHandle,
        _dispatcher: &AppActionDispatcher,
        _key: &KeyEvent,
        _term_size: Size,
    ) -> KeyResult {
        app.update(|app| app.ui.exit_requested = true).await;
        KeyLoopAction::Break.into()
    }
}
