//! Wall-clock sources.

use chrono::Utc;
use tokio::time::Instant;

/// Wall-clock source in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Wall clock driven by tokio's monotonic time, so it moves together with
/// `tokio::time::sleep` (including paused and auto-advanced test time).
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base_ms: i64,
    anchor: Instant,
}

impl TokioClock {
    /// Clock reading `base_ms` right now.
    pub fn starting_at(base_ms: i64) -> Self {
        Self {
            base_ms,
            anchor: Instant::now(),
        }
    }

    /// Clock anchored to the current wall time.
    pub fn now() -> Self {
        Self::starting_at(Utc::now().timestamp_millis())
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> i64 {
        self.base_ms + self.anchor.elapsed().as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Clock, TokioClock};

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock::starting_at(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(clock.now_ms(), 91_000);
    }
}
