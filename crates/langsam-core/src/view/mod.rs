//! Read-only projections of the session for display.
//!
//! The `ViewController` holds the current mode (loading, error, list or
//! detail) and the projection for it. It never touches the audio transport.

pub mod controller;

pub use controller::{DetailView, ListItem, ListView, ViewController, ViewMode};
