//! Audio player state machine.
//!
//! This module provides:
//! - `Player`: owns the single transport bound to "selected story × selected level"
//! - `Transport`: the seam to the audio backend, with `ClockTransport` as the shipped timeline
//! - `EventBus` / `PlayerEvent`: notifications for view consumers

pub mod events;
pub mod machine;
pub mod transport;

pub use events::{EventBus, PlayerEvent};
pub use machine::{Binding, Player, PlayerError, PlayerState, REWIND_SECONDS};
pub use transport::{
    transport_channel, ClockTransport, MediaSource, PlaybackError, Transport, TransportEvent,
    TransportEvents,
};
