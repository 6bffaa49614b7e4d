//! Terminal UI module using ratatui.
//!
//! - `render`: frame rendering for the gated views and toast stack
//! - `input`: keyboard event handling
//! - `styles`: color scheme and text styling

pub mod input;
pub mod render;
pub mod styles;
