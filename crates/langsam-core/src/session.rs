//! Per-session controller.
//!
//! A `Session` owns everything one reader session needs: the digest (fetched
//! once), the preferences, the player and the view projection. Sessions share
//! nothing, so several can run side by side.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};

use crate::api::{ContentClient, FetchError};
use crate::models::{Digest, Level};
use crate::player::{Player, PlayerError, PlayerEvent, PlayerState};
use crate::prefs::PreferenceStore;
use crate::view::{ViewController, ViewMode};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No digest loaded")]
    NoDigest,

    #[error(transparent)]
    Player(#[from] PlayerError),
}

pub struct Session {
    prefs: PreferenceStore,
    player: Player,
    view: ViewController,
    digest: Option<Arc<Digest>>,
    player_events: broadcast::Receiver<PlayerEvent>,
    fetch_attempted: bool,
}

impl Session {
    pub fn new(player: Player) -> Self {
        let player_events = player.subscribe();
        Self {
            prefs: player.preferences().clone(),
            player,
            view: ViewController::new(),
            digest: None,
            player_events,
            fetch_attempted: false,
        }
    }

    pub fn digest(&self) -> Option<&Digest> {
        self.digest.as_deref()
    }

    pub fn view(&self) -> &ViewController {
        &self.view
    }

    pub fn player_state(&self) -> &PlayerState {
        self.player.state()
    }

    pub fn level(&self) -> Level {
        self.prefs.level()
    }

    pub fn speed(&self) -> f64 {
        self.prefs.speed()
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// Fetch the digest. Only the first call per session goes to the network.
    /// Returns true when a digest is available afterwards.
    pub async fn load_digest(&mut self, client: &ContentClient) -> bool {
        if self.fetch_attempted {
            warn!("Digest already fetched for this session, ignoring reload");
            return self.digest.is_some();
        }
        self.fetch_attempted = true;
        let result = client.fetch_digest().await;
        self.apply_digest(result)
    }

    /// Leave the loading state: list view on success, terminal error otherwise.
    pub fn apply_digest(&mut self, result: Result<Digest, FetchError>) -> bool {
        self.fetch_attempted = true;
        match result {
            Ok(digest) => {
                info!(date = %digest.date, stories = digest.len(), "Digest ready");
                if digest.is_empty() {
                    warn!(date = %digest.date, "Digest has no stories");
                }
                let digest = Arc::new(digest);
                self.view.render_list(&digest, self.prefs.level());
                self.digest = Some(digest);
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch digest");
                self.view.show_error(e.to_string());
                false
            }
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn select_story(&mut self, index: usize) -> Result<(), SessionError> {
        let digest = self.digest.clone().ok_or(SessionError::NoDigest)?;
        self.player.select_story(&digest, index)?;
        self.discard_pending_events();
        self.view
            .render_detail(&digest, index, self.prefs.level(), self.player.state());
        Ok(())
    }

    pub fn show_list(&mut self) {
        self.player.return_to_list();
        self.discard_pending_events();
        if let Some(digest) = self.digest.clone() {
            self.view.render_list(&digest, self.prefs.level());
        }
    }

    /// Switch difficulty. Reloads the bound narration and rebuilds the visible view.
    pub fn change_level(&mut self, level: Level) {
        let Some(digest) = self.digest.clone() else {
            self.prefs.set_level(level);
            return;
        };
        self.player.change_level(&digest, level);
        self.discard_pending_events();
        match self.view.mode().clone() {
            ViewMode::Detail(index) => {
                self.view
                    .render_detail(&digest, index, level, self.player.state());
            }
            ViewMode::List => self.view.render_list(&digest, level),
            ViewMode::Loading | ViewMode::Error(_) => {}
        }
    }

    pub fn toggle_german(&mut self) {
        self.view.toggle_german();
    }

    pub fn toggle_english(&mut self) {
        self.view.toggle_english();
    }

    // =========================================================================
    // Transport controls
    // =========================================================================

    pub fn play(&mut self) {
        self.player.play();
    }

    pub fn pause(&mut self) {
        self.player.pause();
    }

    pub fn toggle_play(&mut self) {
        self.player.toggle_play();
    }

    pub fn seek(&mut self, seconds: f64) {
        self.player.seek(seconds);
    }

    pub fn seek_fraction(&mut self, fraction: f64) {
        self.player.seek_fraction(fraction);
    }

    pub fn rewind(&mut self) {
        self.player.rewind();
    }

    pub fn skip_forward(&mut self) {
        self.player.skip_forward();
    }

    pub fn set_speed(&mut self, speed: f64) -> f64 {
        self.player.set_speed(speed)
    }

    /// Apply pending transport events and patch the view from the resulting
    /// notifications. Returns the number of transport events handled.
    pub fn tick(&mut self) -> usize {
        let handled = self.player.process_transport_events();
        loop {
            match self.player_events.try_recv() {
                Ok(event) => self.view.apply_player_event(&event),
                Err(TryRecvError::Lagged(missed)) => {
                    debug!(missed, "View fell behind player, resyncing");
                    self.view.sync_player_state(self.player.state());
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        handled
    }

    /// Drop notifications that describe the binding we just replaced.
    fn discard_pending_events(&mut self) {
        while !matches!(
            self.player_events.try_recv(),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed)
        ) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::player::machine::tests::{digest, harness_with, Call, Harness};
    use crate::player::{TransportEvent, TransportEvents};

    const E2E: &str = r#"{"date":"2024-01-15","stories":[{"headline_en":"X","summary_en":"Y",
        "levels":{"1":{"text_de":"Hallo","text_en":"Hello","audio_url":"a.mp3","audio_duration_seconds":125}}}]}"#;

    /// Transport side of a session under test.
    struct Wire {
        events: TransportEvents,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    fn session() -> (Session, Wire) {
        let Harness {
            player,
            events,
            calls,
        } = harness_with(PreferenceStore::in_memory(), false);
        (Session::new(player), Wire { events, calls })
    }

    #[test]
    fn test_end_to_end_labels() {
        let (mut session, _h) = session();
        assert_eq!(session.view().mode(), &ViewMode::Loading);

        assert!(session.apply_digest(Ok(serde_json::from_str(E2E).unwrap())));
        let list = session.view().list().unwrap();
        assert_eq!(list.items[0].duration.as_deref(), Some("3 Min."));

        session.select_story(0).unwrap();
        let detail = session.view().detail().unwrap();
        assert_eq!(detail.total_time_label(), "2:05");
        assert_eq!(detail.current_time_label(), "0:00");
        assert!(detail.has_audio);
    }

    #[test]
    fn test_empty_digest_shows_empty_list() {
        let (mut session, _h) = session();
        let empty = r#"{"date":"2024-01-15","stories":[]}"#;
        assert!(session.apply_digest(Ok(serde_json::from_str(empty).unwrap())));
        assert_eq!(session.view().mode(), &ViewMode::List);
        assert!(session.view().list().unwrap().items.is_empty());
        assert!(session.select_story(0).is_err());
    }

    #[test]
    fn test_fetch_error_is_terminal() {
        let (mut session, _h) = session();
        assert!(!session.apply_digest(Err(FetchError::RateLimited)));
        assert!(matches!(session.view().mode(), ViewMode::Error(_)));
        assert_eq!(session.select_story(0), Err(SessionError::NoDigest));
    }

    #[tokio::test]
    async fn test_digest_is_fetched_once() {
        let (mut session, _h) = session();
        session.apply_digest(Ok(digest()));
        // Would fail against this unroutable origin if it went to the network.
        let client = ContentClient::new("http://127.0.0.1:9/").unwrap();
        assert!(session.load_digest(&client).await);
        assert_eq!(session.view().mode(), &ViewMode::List);
    }

    #[test]
    fn test_level_change_in_detail_rebuilds_detail_only() {
        let (mut session, h) = session();
        session.apply_digest(Ok(digest()));
        session.select_story(0).unwrap();
        let list_renders = session.view().list_renders();
        let detail_renders = session.view().detail_renders();

        session.change_level(Level::Two);
        assert_eq!(session.view().list_renders(), list_renders);
        assert_eq!(session.view().detail_renders(), detail_renders + 1);
        let detail = session.view().detail().unwrap();
        assert_eq!(detail.level, Level::Two);
        assert_eq!(detail.text_de, "zwei");
        assert_eq!(session.level(), Level::Two);
        assert!(h
            .calls
            .lock()
            .unwrap()
            .contains(&Call::SetSource(Some("/audio/s1_l2.mp3".to_string()), 2)));
    }

    #[test]
    fn test_level_change_in_list_rebuilds_list() {
        let (mut session, _h) = session();
        session.apply_digest(Ok(digest()));
        let renders = session.view().list_renders();
        session.change_level(Level::Two);
        assert_eq!(session.view().list_renders(), renders + 1);
        assert_eq!(
            session.view().list().unwrap().items[0].duration.as_deref(),
            Some("3 Min.")
        );
        assert_eq!(session.view().list().unwrap().items[1].duration, None);
    }

    #[test]
    fn test_time_updates_never_touch_transport() {
        let (mut session, h) = session();
        session.apply_digest(Ok(digest()));
        session.select_story(0).unwrap();
        let calls_before = h.calls.lock().unwrap().len();
        let renders = session.view().detail_renders();

        h.events
            .send(TransportEvent::Loaded {
                generation: 1,
                duration: Some(125.0),
            })
            .unwrap();
        h.events
            .send(TransportEvent::TimeUpdate {
                generation: 1,
                current_time: 30.0,
            })
            .unwrap();
        assert_eq!(session.tick(), 2);

        assert_eq!(h.calls.lock().unwrap().len(), calls_before);
        assert_eq!(session.view().detail_renders(), renders);
        assert_eq!(session.view().detail().unwrap().current_time_label(), "0:30");
    }

    #[test]
    fn test_show_list_unbinds_player() {
        let (mut session, _h) = session();
        session.apply_digest(Ok(digest()));
        session.select_story(1).unwrap();
        assert!(session.player_state().is_bound());
        assert!(!session.player_state().has_source);

        session.show_list();
        assert!(!session.player_state().is_bound());
        assert_eq!(session.view().mode(), &ViewMode::List);
    }
}
