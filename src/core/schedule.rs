use crate::domain::ports::DelaySource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};

pub const DEFAULT_MIN_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePolicy {
    Fixed { interval_ms: u64 },
    Randomized { min_delay_ms: u64, max_delay_ms: u64 },
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        SchedulePolicy::Randomized {
            min_delay_ms: DEFAULT_MIN_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl fmt::Display for SchedulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulePolicy::Fixed { interval_ms } => write!(f, "every {}ms", interval_ms),
            SchedulePolicy::Randomized {
                min_delay_ms,
                max_delay_ms,
            } => write!(
                f,
                "after a random delay between {}ms and {}ms",
                min_delay_ms, max_delay_ms
            ),
        }
    }
}

/// Uniform draws from `[min, max)` milliseconds.
pub struct UniformDelay<R: Rng + Send> {
    min_ms: u64,
    max_ms: u64,
    rng: R,
}

impl UniformDelay<StdRng> {
    pub fn from_entropy(min_ms: u64, max_ms: u64) -> Self {
        Self::with_rng(min_ms, max_ms, StdRng::from_os_rng())
    }

    pub fn seeded(min_ms: u64, max_ms: u64, seed: u64) -> Self {
        Self::with_rng(min_ms, max_ms, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> UniformDelay<R> {
    pub fn with_rng(min_ms: u64, max_ms: u64, rng: R) -> Self {
        // An empty range would panic inside random_range.
        let max_ms = max_ms.max(min_ms.saturating_add(1));
        Self { min_ms, max_ms, rng }
    }
}

impl<R: Rng + Send> DelaySource for UniformDelay<R> {
    fn next_delay(&mut self) -> Duration {
        Duration::from_millis(self.rng.random_range(self.min_ms..self.max_ms))
    }
}

/// The emitter's timer. Holds at most one pending fire.
pub enum Ticker {
    Fixed {
        period: Duration,
        interval: Option<Interval>,
    },
    Randomized {
        delays: Box<dyn DelaySource>,
        pending: Option<Pin<Box<Sleep>>>,
    },
}

impl Ticker {
    pub fn fixed(period: Duration) -> Self {
        Ticker::Fixed {
            period,
            interval: None,
        }
    }

    pub fn randomized(delays: impl DelaySource + 'static) -> Self {
        Ticker::Randomized {
            delays: Box::new(delays),
            pending: None,
        }
    }

    pub fn from_policy(policy: &SchedulePolicy) -> Self {
        match *policy {
            SchedulePolicy::Fixed { interval_ms } => {
                Ticker::fixed(Duration::from_millis(interval_ms))
            }
            SchedulePolicy::Randomized {
                min_delay_ms,
                max_delay_ms,
            } => Ticker::randomized(UniformDelay::from_entropy(min_delay_ms, max_delay_ms)),
        }
    }

    /// Schedules the next fire relative to now. The fixed ticker creates its
    /// recurring timer once and ignores later calls.
    pub fn arm(&mut self) {
        match self {
            Ticker::Fixed { period, interval } => {
                if interval.is_none() {
                    let mut recurring = time::interval_at(Instant::now() + *period, *period);
                    recurring.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    *interval = Some(recurring);
                }
            }
            Ticker::Randomized { delays, pending } => {
                let delay = delays.next_delay();
                tracing::debug!("Next emission in {}ms", delay.as_millis());
                *pending = Some(Box::pin(time::sleep(delay)));
            }
        }
    }

    /// Resolves when the armed timer fires. Never resolves while disarmed.
    pub async fn fired(&mut self) {
        match self {
            Ticker::Fixed {
                interval: Some(interval),
                ..
            } => {
                interval.tick().await;
            }
            Ticker::Randomized { pending, .. } if pending.is_some() => {
                if let Some(sleep) = pending.as_mut() {
                    sleep.as_mut().await;
                }
                *pending = None;
            }
            _ => std::future::pending::<()>().await,
        }
    }

    pub fn is_armed(&self) -> bool {
        match self {
            Ticker::Fixed { interval, .. } => interval.is_some(),
            Ticker::Randomized { pending, .. } => pending.is_some(),
        }
    }

    /// Drops the pending timer. Returns whether one was armed.
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.is_armed();
        match self {
            Ticker::Fixed { interval, .. } => *interval = None,
            Ticker::Randomized { pending, .. } => *pending = None,
        }
        was_armed
    }
}

impl fmt::Debug for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ticker::Fixed { period, .. } => f
                .debug_struct("Fixed")
                .field("period", period)
                .field("armed", &self.is_armed())
                .finish(),
            Ticker::Randomized { .. } => f
                .debug_struct("Randomized")
                .field("armed", &self.is_armed())
                .finish(),
        }
    }
}
