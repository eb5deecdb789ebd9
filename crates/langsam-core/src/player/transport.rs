//! The audio transport seam.
//!
//! A `Transport` plays one source at a time. Its native events (loaded,
//! time update, play, pause, ended, failure) are pushed onto an mpsc channel
//! tagged with the generation of the source they belong to, so the player
//! can discard events from a source it has already replaced.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Interval between time updates while playing.
const TICK_INTERVAL_MS: u64 = 250;

/// Timeout for checking that a narration file is reachable.
const PROBE_TIMEOUT_SECS: u64 = 15;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("No playable source")]
    NoSource,

    #[error("Playback not allowed: {0}")]
    NotAllowed(String),

    #[error("Media unavailable: {0}")]
    Unavailable(String),
}

/// A narration file to load into the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    pub url: Url,
    /// Length from the digest metadata, used until the transport knows better.
    pub duration_hint: Option<f64>,
}

/// Native transport events.
///
/// Implementations must emit `Loaded` before any `TimeUpdate` or `Playing`
/// for the same generation.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Loaded { generation: u64, duration: Option<f64> },
    TimeUpdate { generation: u64, current_time: f64 },
    Playing { generation: u64 },
    Paused { generation: u64 },
    Ended { generation: u64 },
    Failed { generation: u64, error: PlaybackError },
}

impl TransportEvent {
    pub fn generation(&self) -> u64 {
        match self {
            TransportEvent::Loaded { generation, .. }
            | TransportEvent::TimeUpdate { generation, .. }
            | TransportEvent::Playing { generation }
            | TransportEvent::Paused { generation }
            | TransportEvent::Ended { generation }
            | TransportEvent::Failed { generation, .. } => *generation,
        }
    }
}

pub type TransportEvents = mpsc::UnboundedSender<TransportEvent>;

/// Create the channel a transport reports its native events on.
pub fn transport_channel() -> (TransportEvents, mpsc::UnboundedReceiver<TransportEvent>) {
    mpsc::unbounded_channel()
}

/// A single-source audio transport.
pub trait Transport: Send {
    /// Replace the current source; `None` empties the transport.
    /// Loading completes asynchronously and is reported as `Loaded` or `Failed`.
    fn set_source(&mut self, source: Option<MediaSource>, generation: u64);

    /// Request playback. Starting may be deferred until the source is loaded.
    fn play(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self);

    fn seek(&mut self, seconds: f64);

    fn set_rate(&mut self, rate: f64);
}

// ============================================================================
// Clock transport
// ============================================================================

#[derive(Debug)]
struct Clock {
    generation: u64,
    has_source: bool,
    loaded: bool,
    duration: Option<f64>,
    /// Position at `started` (or the frozen position while paused).
    anchor: f64,
    started: Option<Instant>,
    rate: f64,
    pending_play: bool,
}

impl Clock {
    fn empty(generation: u64, rate: f64) -> Self {
        Self {
            generation,
            has_source: false,
            loaded: false,
            duration: None,
            anchor: 0.0,
            started: None,
            rate,
            pending_play: false,
        }
    }

    fn position(&self) -> f64 {
        let mut position = self.anchor;
        if let Some(started) = self.started {
            position += started.elapsed().as_secs_f64() * self.rate;
        }
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn is_playing(&self) -> bool {
        self.started.is_some()
    }

    fn stop(&mut self) {
        self.anchor = self.position();
        self.started = None;
    }
}

fn lock(clock: &Mutex<Clock>) -> MutexGuard<'_, Clock> {
    clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Transport that keeps a rate-scaled playback timeline without decoding audio.
///
/// When built with an HTTP client it checks that the narration is reachable
/// before reporting the source as loaded.
pub struct ClockTransport {
    http: Option<Client>,
    events: TransportEvents,
    clock: Arc<Mutex<Clock>>,
    loader: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl ClockTransport {
    pub fn new(events: TransportEvents) -> Self {
        Self {
            http: None,
            events,
            clock: Arc::new(Mutex::new(Clock::empty(0, 1.0))),
            loader: None,
            ticker: None,
        }
    }

    pub fn with_probe(events: TransportEvents, http: Client) -> Self {
        let mut transport = Self::new(events);
        transport.http = Some(http);
        transport
    }

    fn abort_tasks(&mut self) {
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Drop for ClockTransport {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

impl Transport for ClockTransport {
    fn set_source(&mut self, source: Option<MediaSource>, generation: u64) {
        self.abort_tasks();
        {
            let mut clock = lock(&self.clock);
            let rate = clock.rate;
            *clock = Clock::empty(generation, rate);
            clock.has_source = source.is_some();
            clock.duration = source.as_ref().and_then(|s| s.duration_hint);
        }

        if let Some(source) = source {
            debug!(url = %source.url, generation, "Loading narration");
            self.loader = Some(tokio::spawn(load_source(
                self.http.clone(),
                source.url,
                self.clock.clone(),
                self.events.clone(),
                generation,
            )));
        }
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        let generation = {
            let mut clock = lock(&self.clock);
            if !clock.has_source {
                return Err(PlaybackError::NoSource);
            }
            if clock.is_playing() {
                return Ok(());
            }
            if !clock.loaded {
                clock.pending_play = true;
                return Ok(());
            }
            // Playing from the end restarts the narration.
            if clock.duration.is_some_and(|d| clock.anchor >= d) {
                clock.anchor = 0.0;
            }
            clock.started = Some(Instant::now());
            let _ = self.events.send(TransportEvent::Playing {
                generation: clock.generation,
            });
            clock.generation
        };

        self.ticker = Some(tokio::spawn(tick_while_playing(
            self.clock.clone(),
            self.events.clone(),
            generation,
        )));
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        let mut clock = lock(&self.clock);
        clock.pending_play = false;
        if clock.is_playing() {
            clock.stop();
            let _ = self.events.send(TransportEvent::Paused {
                generation: clock.generation,
            });
        }
    }

    fn seek(&mut self, seconds: f64) {
        let mut clock = lock(&self.clock);
        if !clock.has_source || seconds.is_nan() {
            return;
        }
        let upper = clock.duration.unwrap_or(f64::INFINITY);
        clock.anchor = seconds.clamp(0.0, upper);
        if clock.is_playing() {
            clock.started = Some(Instant::now());
        }
        let _ = self.events.send(TransportEvent::TimeUpdate {
            generation: clock.generation,
            current_time: clock.anchor,
        });
    }

    fn set_rate(&mut self, rate: f64) {
        let mut clock = lock(&self.clock);
        if clock.is_playing() {
            clock.anchor = clock.position();
            clock.started = Some(Instant::now());
        }
        clock.rate = rate;
    }
}

async fn load_source(
    http: Option<Client>,
    url: Url,
    clock: Arc<Mutex<Clock>>,
    events: TransportEvents,
    generation: u64,
) {
    if let Some(http) = http {
        let result = http
            .head(url.clone())
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .send()
            .await;
        let failure = match result {
            // Some static hosts refuse HEAD but serve GET fine.
            Ok(response)
                if response.status().is_success()
                    || response.status() == StatusCode::METHOD_NOT_ALLOWED =>
            {
                None
            }
            Ok(response) => Some(format!("status {}", response.status())),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = failure {
            warn!(%url, reason = %reason, "Narration unavailable");
            let _ = events.send(TransportEvent::Failed {
                generation,
                error: PlaybackError::Unavailable(reason),
            });
            return;
        }
    }

    let start_now = {
        let mut clock = lock(&clock);
        if clock.generation != generation {
            return;
        }
        clock.loaded = true;
        let _ = events.send(TransportEvent::Loaded {
            generation,
            duration: clock.duration,
        });
        if clock.pending_play {
            clock.pending_play = false;
            clock.started = Some(Instant::now());
            let _ = events.send(TransportEvent::Playing { generation });
            true
        } else {
            false
        }
    };

    if start_now {
        tick_while_playing(clock, events, generation).await;
    }
}

async fn tick_while_playing(clock: Arc<Mutex<Clock>>, events: TransportEvents, generation: u64) {
    let mut interval = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));
    interval.tick().await;
    loop {
        interval.tick().await;
        let keep_going = {
            let mut clock = lock(&clock);
            if clock.generation != generation || !clock.is_playing() {
                false
            } else {
                let position = clock.position();
                let _ = events.send(TransportEvent::TimeUpdate {
                    generation,
                    current_time: position,
                });
                if clock.duration.is_some_and(|d| position >= d) {
                    clock.stop();
                    let _ = events.send(TransportEvent::Paused { generation });
                    let _ = events.send(TransportEvent::Ended { generation });
                    false
                } else {
                    true
                }
            }
        };
        if !keep_going {
            break;
        }
    }
}
