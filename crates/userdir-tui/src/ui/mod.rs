//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout, list/detail views and overlays
//! - `input`: keyboard event handling
//! - `styles`: color palette and text styles

pub mod input;
pub mod render;
pub mod styles;
