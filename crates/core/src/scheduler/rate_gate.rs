//! Global pacing of batch dispatches.
//!
//! The gate enforces a minimum wall-clock interval between the start of any
//! two dispatches, across all priorities and submitters.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Minimum-interval gate shared by every dispatcher.
///
/// Callers are served one at a time: the turn lock is held while a caller
/// waits for its turn, so concurrent callers queue up behind it.
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    turn: tokio::sync::Mutex<()>,
    /// When the last turn was granted. Only locked for a read or a write.
    last_turn: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            turn: tokio::sync::Mutex::new(()),
            last_turn: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until `min_interval` has passed since the previous turn, then
    /// record and return the start of this turn.
    ///
    /// The first call returns immediately.
    pub async fn wait_turn(&self) -> Instant {
        let _turn = self.turn.lock().await;

        if let Some(last) = self.last_turn() {
            let ready_at = last + self.min_interval;
            if Instant::now() < ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let now = Instant::now();
        *self.last_turn.lock().unwrap_or_else(|e| e.into_inner()) = Some(now);
        now
    }

    /// Time until the next turn could be granted (zero if available now).
    ///
    /// Never blocks on a caller that is waiting for its turn.
    pub fn next_turn_in(&self) -> Duration {
        match self.last_turn() {
            Some(last) => (last + self.min_interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    fn last_turn(&self) -> Option<Instant> {
        *self.last_turn.lock().unwrap_or_else(|e| e.into_inner())
    }
}
