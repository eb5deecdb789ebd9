use tokio::sync::broadcast;

/// Notifications published by the player for view consumers.
///
/// For a freshly bound source the order is `SourceLoaded`, then the first
/// `TimeUpdated`, then `PlayStateChanged`.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    SourceLoaded { duration: Option<f64> },
    TimeUpdated { current_time: f64, duration: f64 },
    PlayStateChanged { is_playing: bool },
    Ended,
}

/// Broadcast bus for player notifications.
///
/// `publish()` is a sync call; events without subscribers are dropped.
/// Slow subscribers receive `RecvError::Lagged(n)` instead of blocking the player.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
