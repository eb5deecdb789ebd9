//! Persisted user preferences.
//!
//! This module provides:
//! - `KeyValueStore`: the durable string store (`FileStore`, `MemoryStore`)
//! - `PreferenceStore`: validated access to the difficulty level and playback speed
//!
//! Stored values are never trusted: malformed entries fall back to defaults
//! and parsed values are clamped into range.

pub mod preferences;
pub mod store;

pub use preferences::{
    clamp_speed, parse_level, parse_speed, PreferenceStore, DEFAULT_SPEED, LEVEL_KEY, MAX_SPEED,
    MIN_SPEED, SPEED_KEY,
};
pub use store::{FileStore, KeyValueStore, MemoryStore};
