//! Application state for the langsam TUI.
//!
//! `App` wraps one reader `Session` with the terminal-only state: which list
//! row is highlighted, overlays, and the status line. The digest is fetched on
//! a background task and handed over through a channel.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use langsam_core::player::{ClockTransport, EventBus};
use langsam_core::prefs::FileStore;
use langsam_core::{
    Config, ContentClient, Digest, FetchError, Level, Player, PreferenceStore, Session,
    SessionError, ViewMode,
};

// ============================================================================
// Constants
// ============================================================================

/// Playback speeds offered by `[` and `]`.
pub const SPEED_STEPS: [f64; 6] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

/// Number of rows to move on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 5;

// ============================================================================
// App State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    Quitting,
}

pub struct App {
    pub state: AppState,
    pub session: Session,
    pub client: ContentClient,
    pub list_selection: usize,
    pub detail_scroll: u16,
    pub status_message: Option<String>,
    digest_rx: Option<mpsc::Receiver<Result<Digest, FetchError>>>,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        let client = ContentClient::with_timeout(&config.base_url(), config.request_timeout())?
            .with_content_path(config.content_path());
        debug!(base_url = %client.base_url(), "Content client configured");

        let prefs = match Config::preferences_path() {
            Ok(path) => PreferenceStore::new(Arc::new(FileStore::open(path))),
            Err(e) => {
                warn!(error = %e, "No preferences location, settings will not persist");
                PreferenceStore::in_memory()
            }
        };

        let http = client.http().clone();
        let player = Player::new(client.base_url().clone(), prefs, EventBus::default(), |events| {
            ClockTransport::with_probe(events, http)
        });

        Ok(Self::with_session(Session::new(player), client))
    }

    pub fn with_session(session: Session, client: ContentClient) -> Self {
        Self {
            state: AppState::Normal,
            session,
            client,
            list_selection: 0,
            detail_scroll: 0,
            status_message: None,
            digest_rx: None,
        }
    }

    // =========================================================================
    // Background work
    // =========================================================================

    /// Fetch the digest without blocking the event loop. Only the first call
    /// starts a request.
    pub fn start_loading(&mut self) {
        if self.digest_rx.is_some() || !matches!(self.session.view().mode(), ViewMode::Loading) {
            return;
        }
        let (tx, rx) = mpsc::channel(1);
        let client = self.client.clone();
        tokio::spawn(async move {
            let result = client.fetch_digest().await;
            let _ = tx.send(result).await;
        });
        self.digest_rx = Some(rx);
        info!("Digest fetch started");
    }

    /// Apply finished background work and pending player events.
    pub fn check_background_tasks(&mut self) {
        let result = self.digest_rx.as_mut().and_then(|rx| rx.try_recv().ok());
        if let Some(result) = result {
            self.digest_rx = None;
            self.session.apply_digest(result);
            self.list_selection = 0;
        }
        self.session.tick();
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn story_count(&self) -> usize {
        self.session.view().list().map_or(0, |list| list.items.len())
    }

    pub fn in_detail(&self) -> bool {
        matches!(self.session.view().mode(), ViewMode::Detail(_))
    }

    pub fn select_next(&mut self, step: usize) {
        let count = self.story_count();
        if count > 0 {
            self.list_selection = (self.list_selection + step).min(count - 1);
        }
    }

    pub fn select_previous(&mut self, step: usize) {
        self.list_selection = self.list_selection.saturating_sub(step);
    }

    pub fn open_selected(&mut self) {
        match self.session.select_story(self.list_selection) {
            Ok(()) => {
                self.detail_scroll = 0;
                self.status_message = None;
            }
            Err(SessionError::NoDigest) => {}
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    pub fn back_to_list(&mut self) {
        if self.in_detail() {
            self.session.show_list();
        }
    }

    pub fn scroll_detail(&mut self, down: bool) {
        self.detail_scroll = if down {
            self.detail_scroll.saturating_add(1)
        } else {
            self.detail_scroll.saturating_sub(1)
        };
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn set_level(&mut self, level: Level) {
        self.session.change_level(level);
        self.detail_scroll = 0;
        self.status_message = Some(format!("Niveau {} ({})", level, level.cefr()));
    }

    pub fn change_speed(&mut self, faster: bool) {
        let speed = self.session.set_speed(next_speed(self.session.speed(), faster));
        self.status_message = Some(format!("Tempo {}x", speed));
    }
}

/// The neighbouring speed step. Speeds between steps snap to the nearest one
/// in the requested direction.
pub fn next_speed(current: f64, faster: bool) -> f64 {
    const EPSILON: f64 = 1e-6;
    if faster {
        SPEED_STEPS
            .iter()
            .copied()
            .find(|step| *step > current + EPSILON)
            .unwrap_or(SPEED_STEPS[SPEED_STEPS.len() - 1])
    } else {
        SPEED_STEPS
            .iter()
            .rev()
            .copied()
            .find(|step| *step < current - EPSILON)
            .unwrap_or(SPEED_STEPS[0])
    }
}
