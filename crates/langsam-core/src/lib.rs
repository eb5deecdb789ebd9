//! Core library for langsam, a reader and player for the daily slow-news digest.
//!
//! - `models`: the digest document (stories, levels, narration metadata)
//! - `prefs`: persisted difficulty level and playback speed
//! - `api`: the content fetcher for the digest document
//! - `player`: the audio transport state machine and its notifications
//! - `view`: list/detail projections of the session state
//! - `session`: the per-session controller tying the above together
//! - `shell`: the offline shell cache worker (install, activate, serve)

pub mod api;
pub mod config;
pub mod models;
pub mod player;
pub mod prefs;
pub mod session;
pub mod shell;
pub mod utils;
pub mod view;

pub use api::{ContentClient, FetchError};
pub use config::Config;
pub use models::{Digest, Level, LevelContent, Story};
pub use player::{Player, PlayerEvent, PlayerState};
pub use prefs::PreferenceStore;
pub use session::{Session, SessionError};
pub use view::{ViewController, ViewMode};
