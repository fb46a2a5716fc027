use std::{sync::Arc, time::Duration};

use tokio::{
    sync::Mutex,
    time::{Instant, sleep_until},
};

/// Enforces a minimum spacing between requests across every clone of the pacer.
///
/// Waiters queue on the inner lock, so concurrent callers are released one interval apart.
#[derive(Clone, Debug)]
pub struct RequestPacer {
    state: Arc<Mutex<PacerState>>,
    interval: Duration,
}

#[derive(Debug, Default)]
struct PacerState {
    last_release: Option<Instant>,
}

impl RequestPacer {
    /// Create a new [`RequestPacer`] releasing at most one request per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self { state: Arc::new(Mutex::new(PacerState::default())), interval }
    }

    /// Minimum spacing between two releases.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next request slot is free and claim it.
    pub async fn wait(&self) {
        let mut state = self.state.lock().await;
        if let Some(last) = state.last_release {
            let next = last + self.interval;
            if Instant::now() < next {
                sleep_until(next).await;
            }
        }
        state.last_release = Some(Instant::now());
    }
}
