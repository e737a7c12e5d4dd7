//! Edge-triggered presence latch.
//!
//! Turns a per-frame "present now" boolean into at most one notification per
//! state change. The latch only flips once a transition is committed, so a
//! transition whose notification could not be delivered is reported again on
//! the next frame.

use crate::message::Notification;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeLatch {
    was_detected: bool,
}

impl EdgeLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn was_detected(&self) -> bool {
        self.was_detected
    }

    /// Transition implied by `present_now`, without changing the latch.
    pub fn pending(&self, present_now: bool) -> Option<Notification> {
        match (present_now, self.was_detected) {
            (true, false) => Some(Notification::Detected),
            (false, true) => Some(Notification::NotDetected),
            _ => None,
        }
    }

    /// Record that `transition` was delivered.
    pub fn commit(&mut self, transition: Notification) {
        self.was_detected = matches!(transition, Notification::Detected);
    }
}
