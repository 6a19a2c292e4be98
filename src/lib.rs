//! Quire is a full-screen terminal client for collaborative worksheets.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`api`] defines the REST payloads and the [`api::WorksheetApi`] seam the
//!   rest of the crate talks through.
//! - [`core`] owns the worksheet store, focus and selection models, bulk
//!   commands, the clipboard, the run poller and source-mode round trips.
//! - [`ui`] renders the worksheet and runs the interactive event loop that
//!   turns keys into actions.
//! - [`auth`] stores and looks up access tokens.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which loads configuration and dispatches
//! into [`ui::worksheet_loop`] for interactive sessions.

pub mod api;
pub mod auth;
pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
