//! Terminal UI layer for interactive worksheet sessions.
//!
//! The UI module owns rendering, keyboard handling, and loop control for the
//! text user interface.
//!
//! Key submodules include:
//! - [`worksheet_loop`]: the main interaction loop that routes keys through
//!   the binding registry and turns them into [`crate::core::app::AppAction`]s.
//! - [`renderer`], [`blocks`], and [`markup`]: view composition and frame output.
//! - [`theme`]: color/style policy.
//! - [`help`]: the shortcut overlay generated from the binding table.
//!
//! Ownership boundary: this layer presents and captures interaction state, while
//! [`crate::core`] owns domain logic and backend coordination.

pub mod blocks;
pub mod help;
pub mod markup;
pub mod renderer;
pub mod theme;
pub mod worksheet_loop;
