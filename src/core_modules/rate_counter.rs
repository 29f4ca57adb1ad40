// THEORY:
// The `rate_counter` module measures how fast frames are arriving. The
// receiver ticks a shared atomic counter on every start marker; an
// independent task swaps the counter back to zero once per period and
// publishes the count on a `watch` channel. Consumers that care (a status
// readout, a test) subscribe; nobody else pays anything beyond one relaxed
// atomic increment per frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default publication period.
pub const RATE_PERIOD: Duration = Duration::from_secs(1);

/// Shared frame-start counter. Cloning shares the same underlying count.
#[derive(Debug, Clone, Default)]
pub struct FrameTicks {
    count: Arc<AtomicU64>,
}

impl FrameTicks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one received frame start. Called by the receiver.
    pub fn tick(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Frame starts recorded since the last publication window.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Reads and resets the accumulated count in one step.
    fn take(&self) -> u64 {
        self.count.swap(0, Ordering::Relaxed)
    }
}

/// One published measurement: frames received during the last period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateSample {
    pub frames: u64,
}

/// Periodic publisher of `RateSample`s from a `FrameTicks` counter.
pub struct RateCounter {
    ticks: FrameTicks,
    period: Duration,
    sample_tx: watch::Sender<RateSample>,
}

impl RateCounter {
    pub fn new(ticks: FrameTicks) -> Self {
        Self::with_period(ticks, RATE_PERIOD)
    }

    /// A custom publication period, mainly for tests.
    pub fn with_period(ticks: FrameTicks, period: Duration) -> Self {
        let (sample_tx, _) = watch::channel(RateSample::default());
        Self {
            ticks,
            period,
            sample_tx,
        }
    }

    /// A receiver for published samples. Subscribe before `spawn`.
    pub fn subscribe(&self) -> watch::Receiver<RateSample> {
        self.sample_tx.subscribe()
    }

    /// Publishes one sample per period until the shutdown flag flips. A
    /// dropped shutdown sender also stops the task.
    pub fn spawn(self, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.period) => {
                        let frames = self.ticks.take();
                        let _ = self.sample_tx.send(RateSample { frames });
                    }
                }
            }
            debug!("rate counter stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn ticks_accumulate_and_take_resets() {
        let ticks = FrameTicks::new();
        ticks.tick();
        ticks.tick();
        assert_eq!(ticks.count(), 2);
        assert_eq!(ticks.take(), 2);
        assert_eq!(ticks.count(), 0);
    }

    #[tokio::test]
    async fn publishes_and_resets_per_period() {
        let ticks = FrameTicks::new();
        let counter = RateCounter::with_period(ticks.clone(), Duration::from_millis(20));
        let mut samples = counter.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        ticks.tick();
        ticks.tick();
        ticks.tick();
        let handle = counter.spawn(shutdown_rx);

        timeout(WAIT, samples.changed())
            .await
            .expect("sample in time")
            .expect("counter alive");
        assert_eq!(samples.borrow_and_update().frames, 3);

        // The counter reset on publication; only new ticks show up next.
        ticks.tick();
        timeout(WAIT, samples.changed())
            .await
            .expect("sample in time")
            .expect("counter alive");
        assert_eq!(samples.borrow_and_update().frames, 1);

        shutdown_tx.send(true).expect("task subscribed");
        timeout(WAIT, handle)
            .await
            .expect("stop in time")
            .expect("task join");
    }

    #[tokio::test]
    async fn quiet_periods_still_publish() {
        let counter = RateCounter::with_period(FrameTicks::new(), Duration::from_millis(10));
        let mut samples = counter.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = counter.spawn(shutdown_rx);

        timeout(WAIT, samples.changed())
            .await
            .expect("sample in time")
            .expect("counter alive");
        assert_eq!(samples.borrow_and_update().frames, 0);

        shutdown_tx.send(true).expect("task subscribed");
        timeout(WAIT, handle)
            .await
            .expect("stop in time")
            .expect("task join");
    }

    #[tokio::test]
    async fn dropped_shutdown_sender_stops_the_task() {
        let counter = RateCounter::with_period(FrameTicks::new(), Duration::from_millis(10));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = counter.spawn(shutdown_rx);

        drop(shutdown_tx);
        timeout(WAIT, handle)
            .await
            .expect("stop in time")
            .expect("task join");
    }
}
