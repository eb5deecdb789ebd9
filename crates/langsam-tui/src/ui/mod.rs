//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout for the loading, error, list and detail views
//! - `input`: keyboard event handling
//! - `styles`: color scheme and text styling

pub mod input;
pub mod render;
pub mod styles;
