pub mod app;
pub mod bulk;
pub mod clipboard;
pub mod config;
pub mod dialog;
pub mod error;
pub mod focus;
pub mod poller;
pub mod selection;
pub mod source;
pub mod store;
pub mod worksheet;
