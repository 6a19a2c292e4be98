//! The interactive worksheet session.
//!
//! [`run_worksheet`] sets up the terminal, builds the [`App`], and then runs
//! the event loop: keys become [`AppAction`](crate::core::app::AppAction)s,
//! actions become [`AppCommand`](crate::core::app::AppCommand)s that run on
//! the tokio runtime, and their results come back as actions through the
//! same queue.

mod event_loop;
pub mod keybindings;
mod lifecycle;
mod setup;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::WorksheetApi;
use crate::core::app::App;
use crate::core::config::data::Config;

pub use event_loop::{run_worksheet, UiEvent};
pub use keybindings::KeyLoopAction;

/// What `quire open` hands to the session.
pub struct WorksheetLaunch {
    pub config: Config,
    pub api: Arc<dyn WorksheetApi>,
    pub server_url: String,
    /// Uuid or name of the worksheet to open first.
    pub worksheet: String,
}

/// Shared access to the [`App`] from the loop, key handlers, and spawned
/// tasks.
#[derive(Clone)]
pub struct AppHandle {
    inner: Arc<Mutex<App>>,
}

impl AppHandle {
    pub fn new(inner: Arc<Mutex<App>>) -> Self {
        Self { inner }
    }

    pub async fn read<R>(&self, f: impl FnOnce(&App) -> R) -> R {
        let guard = self.inner.lock().await;
        f(&guard)
    }

    pub async fn update<R>(&self, f: impl FnOnce(&mut App) -> R) -> R {
        let mut guard = self.inner.lock().await;
        f(&mut guard)
    }
}
