//! The player state machine.
//!
//! `Idle` (nothing bound) → `Bound` (story × level bound, paused or playing)
//! → back to `Idle` only through `return_to_list`.
//!
//! Every source swap bumps a generation counter. Transport events carry the
//! generation they belong to; anything older than the current generation is
//! dropped, so a slow load can never overwrite a later selection.

use reqwest::Url;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace, warn};

use super::events::{EventBus, PlayerEvent};
use super::transport::{
    transport_channel, MediaSource, Transport, TransportEvent, TransportEvents,
};
use crate::api::resolve_against;
use crate::models::{Digest, Level, LevelContent, Story};
use crate::prefs::{clamp_speed, PreferenceStore};

/// Seconds skipped back by `rewind`.
pub const REWIND_SECONDS: f64 = 10.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("Story {index} does not exist (digest has {len} stories)")]
    StoryOutOfRange { index: usize, len: usize },
}

/// The story and level the transport is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub story_index: usize,
    pub level: Level,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerState {
    pub bound: Option<Binding>,
    pub has_source: bool,
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: Option<f64>,
}

impl PlayerState {
    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Duration usable for seeking, if known.
    fn seekable_duration(&self) -> Option<f64> {
        self.duration.filter(|d| d.is_finite() && *d > 0.0)
    }
}

/// Owns the single audio transport of a session.
pub struct Player {
    transport: Box<dyn Transport>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    base_url: Url,
    prefs: PreferenceStore,
    bus: EventBus,
    state: PlayerState,
    generation: u64,
    loaded: bool,
}

impl Player {
    /// Build a player. `make_transport` receives the sender the transport
    /// must report its native events on.
    pub fn new<T, F>(base_url: Url, prefs: PreferenceStore, bus: EventBus, make_transport: F) -> Self
    where
        T: Transport + 'static,
        F: FnOnce(TransportEvents) -> T,
    {
        let (tx, rx) = transport_channel();
        Self {
            transport: Box::new(make_transport(tx)),
            transport_rx: rx,
            base_url,
            prefs,
            bus,
            state: PlayerState::default(),
            generation: 0,
            loaded: false,
        }
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.bus.subscribe()
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.prefs
    }

    // =========================================================================
    // Binding
    // =========================================================================

    /// Bind the story at `index` under the current level preference.
    pub fn select_story(&mut self, digest: &Digest, index: usize) -> Result<(), PlayerError> {
        let story = digest.story(index).ok_or(PlayerError::StoryOutOfRange {
            index,
            len: digest.len(),
        })?;
        let level = self.prefs.level();
        self.bind(
            story,
            Binding {
                story_index: index,
                level,
            },
        );
        Ok(())
    }

    /// Persist a new level and, when bound, reload the same story under it.
    ///
    /// Switching level always pauses and restarts from zero; it never auto-plays.
    pub fn change_level(&mut self, digest: &Digest, level: Level) {
        self.prefs.set_level(level);
        let Some(binding) = self.state.bound else {
            return;
        };
        match digest.story(binding.story_index) {
            Some(story) => self.bind(story, Binding { level, ..binding }),
            None => warn!(
                index = binding.story_index,
                "Bound story missing from digest, keeping current source"
            ),
        }
    }

    /// Pause, empty the transport and forget the bound story.
    pub fn return_to_list(&mut self) {
        self.pause();
        self.generation += 1;
        self.loaded = false;
        self.transport.set_source(None, self.generation);
        self.state = PlayerState::default();
        debug!(generation = self.generation, "Player unbound");
    }

    fn bind(&mut self, story: &Story, binding: Binding) {
        self.pause();
        self.generation += 1;
        self.loaded = false;

        let source = story
            .level(binding.level)
            .and_then(|content| self.media_source(content));

        self.state = PlayerState {
            bound: Some(binding),
            has_source: source.is_some(),
            is_playing: false,
            current_time: 0.0,
            duration: source.as_ref().and_then(|s| s.duration_hint),
        };

        debug!(
            story = binding.story_index,
            level = %binding.level,
            has_source = self.state.has_source,
            generation = self.generation,
            "Player bound"
        );

        self.transport.set_source(source, self.generation);
        if self.state.has_source {
            self.transport.set_rate(self.prefs.speed());
        }
    }

    fn media_source(&self, content: &LevelContent) -> Option<MediaSource> {
        let path = content.audio_path()?;
        match resolve_against(&self.base_url, path) {
            Ok(url) => Some(MediaSource {
                url,
                duration_hint: content.duration_hint(),
            }),
            Err(e) => {
                warn!(path, error = %e, "Unresolvable narration path");
                None
            }
        }
    }

    // =========================================================================
    // Transport controls
    // =========================================================================

    /// Request playback. Failures are logged, never surfaced.
    pub fn play(&mut self) {
        if !self.state.has_source || self.state.is_playing {
            return;
        }
        if let Err(e) = self.transport.play() {
            warn!(error = %e, "Audio play failed");
        }
    }

    pub fn pause(&mut self) {
        if self.state.has_source {
            self.transport.pause();
        }
        self.set_playing(false);
    }

    pub fn toggle_play(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Jump to `target` seconds, clamped into the known duration.
    pub fn seek(&mut self, target: f64) {
        if !self.state.has_source || target.is_nan() {
            return;
        }
        let Some(duration) = self.state.seekable_duration() else {
            return;
        };
        let target = target.clamp(0.0, duration);
        self.transport.seek(target);
        self.state.current_time = target;
    }

    /// Scrubber mapping: `fraction` of the duration.
    pub fn seek_fraction(&mut self, fraction: f64) {
        if let Some(duration) = self.state.seekable_duration() {
            self.seek(fraction.clamp(0.0, 1.0) * duration);
        }
    }

    pub fn rewind(&mut self) {
        self.seek((self.state.current_time - REWIND_SECONDS).max(0.0));
    }

    pub fn skip_forward(&mut self) {
        self.seek(self.state.current_time + REWIND_SECONDS);
    }

    /// Persist and apply a playback speed. Returns the clamped value.
    pub fn set_speed(&mut self, speed: f64) -> f64 {
        let speed = clamp_speed(speed);
        self.prefs.set_speed(speed);
        if self.state.has_source {
            self.transport.set_rate(speed);
        }
        speed
    }

    // =========================================================================
    // Native events
    // =========================================================================

    /// Apply every transport event received so far. Returns how many were handled.
    pub fn process_transport_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.transport_rx.try_recv() {
            self.handle_transport_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait for the next transport event and apply it.
    /// Returns false once the transport has gone away.
    pub async fn process_next_transport_event(&mut self) -> bool {
        match self.transport_rx.recv().await {
            Some(event) => {
                self.handle_transport_event(event);
                true
            }
            None => false,
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        if event.generation() != self.generation {
            trace!(?event, current = self.generation, "Dropping stale transport event");
            return;
        }

        match event {
            TransportEvent::Loaded { duration, .. } => {
                self.loaded = true;
                if duration.is_some() {
                    self.state.duration = duration;
                }
                self.bus.publish(PlayerEvent::SourceLoaded {
                    duration: self.state.duration,
                });
            }
            TransportEvent::TimeUpdate { current_time, .. } => {
                if !self.loaded {
                    return;
                }
                self.state.current_time = current_time;
                if let Some(duration) = self.state.seekable_duration() {
                    self.bus.publish(PlayerEvent::TimeUpdated {
                        current_time,
                        duration,
                    });
                }
            }
            TransportEvent::Playing { .. } => self.set_playing(true),
            TransportEvent::Paused { .. } => self.set_playing(false),
            TransportEvent::Ended { .. } => {
                self.set_playing(false);
                self.bus.publish(PlayerEvent::Ended);
            }
            TransportEvent::Failed { error, .. } => {
                warn!(error = %error, "Audio playback error");
                self.set_playing(false);
            }
        }
    }

    fn set_playing(&mut self, is_playing: bool) {
        if self.state.is_playing != is_playing {
            self.state.is_playing = is_playing;
            self.bus.publish(PlayerEvent::PlayStateChanged { is_playing });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
