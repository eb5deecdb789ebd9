//! Data models for the digest document.
//!
//! - `Digest`: the daily document with its ordered stories
//! - `Story`: headlines, summary and per-level content
//! - `Level`, `Levels`, `LevelContent`: typed difficulty tiers and their text/audio

pub mod digest;

pub use digest::{Digest, Level, LevelContent, Levels, Story};
