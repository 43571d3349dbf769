//! Heartbeat scheduling for the gateway connection.
//!
//! The scheduler owns a periodic ticker task. The cadence comes from the
//! server's Hello; each tick is delivered to the client loop as a
//! [`HeartbeatTick`] and the loop decides whether to send a Heartbeat.
//! Ticks carry an epoch so a tick queued before a cancel is recognised
//! as stale.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// One heartbeat period elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeartbeatTick {
    /// Epoch of the ticker that produced this tick.
    pub(crate) epoch: u64,
}

/// Owns the periodic heartbeat task.
pub(crate) struct HeartbeatScheduler {
    task: Option<JoinHandle<()>>,
    epoch: u64,
    interval: Option<Duration>,
}

impl HeartbeatScheduler {
    pub(crate) fn new() -> Self {
        Self {
            task: None,
            epoch: 0,
            interval: None,
        }
    }

    /// Start ticking every `interval`, replacing any running ticker.
    ///
    /// The first tick fires one full interval after start.
    pub(crate) fn start(&mut self, interval: Duration, ticks: mpsc::UnboundedSender<HeartbeatTick>) {
        self.cancel();
        if interval.is_zero() {
            debug!("Refusing to start heartbeat with zero interval");
            return;
        }

        let epoch = self.epoch;
        self.interval = Some(interval);
        debug!(
            interval_ms = interval.as_millis(),
            epoch, "Heartbeat scheduler started"
        );
        self.task = Some(tokio::spawn(run_ticker(interval, epoch, ticks)));
    }

    /// Stop future ticks. Ticks already queued become stale.
    pub(crate) fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            trace!(epoch = self.epoch, "Heartbeat scheduler cancelled");
        }
        self.interval = None;
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Whether `tick` came from the currently running ticker.
    pub(crate) fn is_current(&self, tick: HeartbeatTick) -> bool {
        self.task.is_some() && tick.epoch == self.epoch
    }

    /// Interval of the running ticker, if any.
    pub(crate) fn interval(&self) -> Option<Duration> {
        self.interval
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_ticker(interval: Duration, epoch: u64, ticks: mpsc::UnboundedSender<HeartbeatTick>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a tokio interval completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if ticks.send(HeartbeatTick { epoch }).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_interval() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = HeartbeatScheduler::new();
        scheduler.start(Duration::from_millis(1000), tx);

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(rx.try_recv().is_err(), "No tick before one interval");

        tokio::time::sleep(Duration::from_millis(2)).await;
        let tick = rx.try_recv().unwrap();
        assert!(scheduler.is_current(tick));
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks_and_invalidates_queued_ones() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = HeartbeatScheduler::new();
        scheduler.start(Duration::from_millis(100), tx);

        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.cancel();
        let queued = rx.try_recv().unwrap();
        assert!(!scheduler.is_current(queued));
        assert!(scheduler.interval().is_none());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_running_ticker() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = HeartbeatScheduler::new();
        scheduler.start(Duration::from_millis(100), tx.clone());
        scheduler.start(Duration::from_millis(1000), tx);
        assert_eq!(scheduler.interval(), Some(Duration::from_millis(1000)));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err(), "Old ticker must not fire");

        tokio::time::sleep(Duration::from_millis(501)).await;
        let tick = rx.try_recv().unwrap();
        assert!(scheduler.is_current(tick));
    }

    #[tokio::test]
    async fn zero_interval_does_not_start() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scheduler = HeartbeatScheduler::new();
        scheduler.start(Duration::ZERO, tx);
        assert!(scheduler.interval().is_none());
        assert!(!scheduler.is_current(HeartbeatTick { epoch: 1 }));
    }
}
