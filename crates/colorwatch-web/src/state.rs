//! Application state.

use colorwatch_core::message::BroadcastEvent;
use tokio::sync::broadcast;

/// Events a slow viewer may fall behind by before it starts skipping.
const CHANNEL_CAPACITY: usize = 100;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub tx: broadcast::Sender<BroadcastEvent>,
}

impl AppState {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Broadcast an event to all connected WebSocket clients.
    ///
    /// Returns how many clients it was queued for. With nobody connected the
    /// event is simply dropped.
    pub fn broadcast(&self, event: BroadcastEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
