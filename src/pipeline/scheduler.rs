//! Frame scheduler
//!
//! Runs detection at a target interval, decoupled from the host's repaint
//! cadence. On every repaint opportunity the scheduler checks the deadline;
//! when it is due, the deadline moves to `now + interval` and one cycle runs.
//! After the cycle it yields for `budget - cycle duration` (never negative)
//! before asking for the next repaint. Cycles never overlap and a late cycle
//! never produces a burst of catch-up cycles.

use crate::pipeline::cycle::TrackingCore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

/// Source of repaint opportunities
#[async_trait]
pub trait RepaintHost: Send + Sync {
    /// Resolves at the host's next repaint opportunity
    async fn next_repaint(&self);
}

/// Repaint opportunities at a fixed period
#[derive(Debug, Clone, Copy)]
pub struct FixedRateRepaint {
    period: Duration,
}

impl FixedRateRepaint {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn sixty_hz() -> Self {
        Self::new(Duration::from_micros(16_667))
    }
}

#[async_trait]
impl RepaintHost for FixedRateRepaint {
    async fn next_repaint(&self) {
        tokio::time::sleep(self.period).await;
    }
}

/// Millisecond clock relative to the pipeline's creation
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduler decision for one repaint opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    Stopped,
    NotDue,
    Due,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleState {
    running: bool,
    next_deadline_ms: f64,
    frame_interval_ms: f64,
    frame_budget_ms: f64,
}

impl ScheduleState {
    pub fn new(frame_interval_ms: f64, frame_budget_ms: f64) -> Self {
        Self {
            running: false,
            next_deadline_ms: 0.0,
            frame_interval_ms,
            frame_budget_ms,
        }
    }

    /// Start running; the first opportunity is immediately due
    pub fn begin(&mut self, now_ms: f64) {
        self.running = true;
        self.next_deadline_ms = now_ms;
    }

    pub fn halt(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn next_deadline_ms(&self) -> f64 {
        self.next_deadline_ms
    }

    pub fn poll(&mut self, now_ms: f64) -> Poll {
        if !self.running {
            return Poll::Stopped;
        }
        if now_ms < self.next_deadline_ms {
            return Poll::NotDue;
        }
        self.next_deadline_ms = now_ms + self.frame_interval_ms;
        Poll::Due
    }

    /// Time to yield after a cycle that took `cycle_duration`
    pub fn yield_delay(&self, cycle_duration: Duration) -> Duration {
        let remaining_ms = self.frame_budget_ms - cycle_duration.as_secs_f64() * 1000.0;
        if remaining_ms > 0.0 {
            Duration::from_secs_f64(remaining_ms / 1000.0)
        } else {
            Duration::ZERO
        }
    }
}

/// Drives cycles until the shared running flag drops
pub struct FrameScheduler {
    state: ScheduleState,
    host: Arc<dyn RepaintHost>,
    clock: Clock,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl FrameScheduler {
    pub fn new(
        state: ScheduleState,
        host: Arc<dyn RepaintHost>,
        clock: Clock,
        running: Arc<AtomicBool>,
        wake: Arc<Notify>,
    ) -> Self {
        Self {
            state,
            host,
            clock,
            running,
            wake,
        }
    }

    pub async fn run(mut self, core: Arc<Mutex<TrackingCore>>, cycles: Arc<AtomicU64>) {
        self.state.begin(self.clock.now_ms());
        tracing::debug!(
            "Frame scheduler running (interval={:.1}ms)",
            self.state.frame_interval_ms
        );

        loop {
            tokio::select! {
                _ = self.host.next_repaint() => {}
                _ = self.wake.notified() => {}
            }
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let now_ms = self.clock.now_ms();
            match self.state.poll(now_ms) {
                Poll::Stopped => break,
                Poll::NotDue => continue,
                Poll::Due => {}
            }

            let started = Instant::now();
            let report = core.lock().await.run_cycle(now_ms);
            cycles.fetch_add(1, Ordering::SeqCst);

            let delay = self.state.yield_delay(started.elapsed());
            tracing::trace!(
                "Cycle at {:.1}ms: {} moves, {} clicks, yielding {:?}",
                now_ms,
                report.moves,
                report.clicks,
                delay
            );

            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.wake.notified() => {}
                }
            }
        }

        self.state.halt();
        tracing::debug!("Frame scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_respects_deadline() {
        let mut state = ScheduleState::new(33.0, 16.0);
        assert_eq!(state.poll(0.0), Poll::Stopped);

        state.begin(100.0);
        assert_eq!(state.poll(100.0), Poll::Due);
        assert_eq!(state.next_deadline_ms(), 133.0);
        assert_eq!(state.poll(116.0), Poll::NotDue);
        assert_eq!(state.poll(132.9), Poll::NotDue);
        assert_eq!(state.poll(133.0), Poll::Due);

        state.halt();
        assert_eq!(state.poll(500.0), Poll::Stopped);
    }

    #[test]
    fn test_late_cycle_does_not_accumulate() {
        let mut state = ScheduleState::new(33.0, 16.0);
        state.begin(0.0);
        assert_eq!(state.poll(0.0), Poll::Due);

        // Host stalled for several intervals: one cycle, then a fresh deadline
        assert_eq!(state.poll(200.0), Poll::Due);
        assert_eq!(state.poll(201.0), Poll::NotDue);
        assert_eq!(state.next_deadline_ms(), 233.0);
    }

    #[test]
    fn test_yield_delay() {
        let state = ScheduleState::new(33.0, 16.0);
        assert_eq!(state.yield_delay(Duration::ZERO), Duration::from_millis(16));
        assert_eq!(state.yield_delay(Duration::from_millis(10)), Duration::from_millis(6));
        assert_eq!(state.yield_delay(Duration::from_millis(16)), Duration::ZERO);
        assert_eq!(state.yield_delay(Duration::from_millis(40)), Duration::ZERO);
    }
}
