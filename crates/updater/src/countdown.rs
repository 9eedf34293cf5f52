use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Default number of seconds shown before the update window closes.
pub const DEFAULT_COUNTDOWN_SECS: u32 = 5;

/// Scheduled ticks counting down to zero.
///
/// Each call to [`Countdown::tick`] waits one period and yields the new
/// remaining count; after the tick that reaches zero it yields `None`.
pub struct Countdown {
    remaining: u32,
    ticker: Interval,
}

impl Countdown {
    pub fn new(seconds: u32, period: Duration) -> Self {
        let period = if period.is_zero() {
            Duration::from_millis(1)
        } else {
            period
        };
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            remaining: seconds,
            ticker,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub async fn tick(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        self.ticker.tick().await;
        self.remaining -= 1;
        Some(self.remaining)
    }

    /// Stop the countdown; the next `tick` returns `None` immediately.
    pub fn cancel(&mut self) {
        self.remaining = 0;
    }
}
