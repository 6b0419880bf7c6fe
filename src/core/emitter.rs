use crate::core::schedule::Ticker;
use crate::core::shutdown::ShutdownSignal;
use crate::domain::model::{EmissionState, Emission, EmitterPhase};
use crate::domain::ports::LogSink;
use crate::utils::error::{LogSenderError, Result};
use chrono::Utc;
use std::time::Duration;

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(200);

/// What the process should do once the emitter has terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub final_count: u64,
    pub exit_code: i32,
}

/// Periodic heartbeat emitter.
///
/// Owns its sequence counter and timer; several emitters can run side by side.
/// Emission, cancellation and the final record all happen on the task that
/// drives the emitter, so no locking is involved.
pub struct Emitter<L: LogSink> {
    sink: L,
    state: EmissionState,
    timer: Option<Ticker>,
    grace_period: Duration,
}

impl<L: LogSink> Emitter<L> {
    pub fn new(sink: L) -> Self {
        Self {
            sink,
            state: EmissionState::default(),
            timer: None,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn state(&self) -> &EmissionState {
        &self.state
    }

    pub fn sink(&self) -> &L {
        &self.sink
    }

    pub fn has_pending_timer(&self) -> bool {
        self.timer.as_ref().is_some_and(Ticker::is_armed)
    }

    /// Emits the first heartbeat immediately and arms the timer.
    pub fn start(&mut self, ticker: Ticker) -> Result<()> {
        if self.state.phase != EmitterPhase::Idle {
            return Err(LogSenderError::InvalidTransition {
                from: self.state.phase.to_string(),
                to: EmitterPhase::Running.to_string(),
            });
        }

        tracing::debug!("Emitter starting with {:?}", ticker);
        self.state.phase = EmitterPhase::Running;
        self.timer = Some(ticker);
        self.emit_heartbeat();
        self.rearm();
        Ok(())
    }

    /// Waits for the pending timer, emits, and rearms.
    /// Returns `false` straight away when no timer is active.
    pub async fn tick(&mut self) -> bool {
        let Some(timer) = self.timer.as_mut() else {
            return false;
        };
        timer.fired().await;
        self.emit_heartbeat();
        self.rearm();
        true
    }

    /// Stops emission and writes the final record. Only the first call has any
    /// effect; it returns `true`.
    pub fn shutdown(&mut self) -> bool {
        if self.state.is_shutting_down {
            tracing::debug!("Shutdown already in progress");
            return false;
        }

        self.state.is_shutting_down = true;
        if let Some(mut timer) = self.timer.take() {
            if timer.cancel() {
                tracing::debug!("Cancelled pending emission");
            }
        }

        self.sink.emit(&Emission::Farewell {
            final_count: self.state.sequence,
        });
        self.state.phase = EmitterPhase::Draining;
        true
    }

    /// Waits out the grace period so the log pipeline can flush, then terminates.
    pub async fn drain(&mut self) -> Outcome {
        self.shutdown();

        if self.state.phase == EmitterPhase::Draining {
            tokio::time::sleep(self.grace_period).await;
            self.state.phase = EmitterPhase::Terminated;
            tracing::debug!(
                "Emitter terminated after {}ms grace period",
                self.grace_period.as_millis()
            );
        }

        Outcome {
            final_count: self.state.sequence,
            exit_code: 0,
        }
    }

    /// Runs until `signal` fires, then shuts down and drains.
    pub async fn run(&mut self, ticker: Ticker, mut signal: ShutdownSignal) -> Result<Outcome> {
        self.start(ticker)?;

        loop {
            tokio::select! {
                biased;
                _ = signal.requested() => break,
                ticked = self.tick() => {
                    if !ticked {
                        signal.requested().await;
                        break;
                    }
                }
            }
        }

        self.shutdown();
        Ok(self.drain().await)
    }

    fn emit_heartbeat(&mut self) -> bool {
        if self.state.is_shutting_down {
            return false;
        }
        self.state.sequence += 1;
        self.sink.emit(&Emission::Heartbeat {
            sequence: self.state.sequence,
            timestamp: Utc::now(),
        });
        true
    }

    fn rearm(&mut self) {
        if self.state.is_shutting_down {
            return;
        }
        if let Some(timer) = self.timer.as_mut() {
            timer.arm();
        }
    }
}
