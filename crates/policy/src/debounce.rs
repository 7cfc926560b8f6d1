//! Quiet-period debouncing of change notifications.
//!
//! Editors and deploy tools often write a policy file several times for one
//! logical update (truncate, write, rename). The [`Debouncer`] waits until no
//! event has arrived for the quiet period and then yields the whole burst as
//! one [`Burst`], so the directory is reloaded once.
//!
//! The timer restarts on every event. A source that never goes quiet for a
//! full period therefore never yields a burst: reload is eventually
//! consistent, not latency-bounded. There is no maximum-wait override. Only
//! the latest event and a count are held while waiting, so a starved
//! debouncer uses constant memory.

use std::time::Duration;

use tokio::sync::mpsc;

/// Default quiet period before a reload fires.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(1000);

/// A settled run of events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Burst<T> {
    /// The most recent event of the run.
    pub last: T,
    /// How many events the run contained.
    pub count: usize,
}

/// Coalesces a stream of events into quiet-period bursts.
///
/// One debouncer serves one directory, so there is at most one pending timer.
pub struct Debouncer<T> {
    rx: mpsc::UnboundedReceiver<T>,
    quiet: Duration,
}

impl<T> Debouncer<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<T>, quiet: Duration) -> Self {
        Self { rx, quiet }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Wait for the next burst of events to settle.
    ///
    /// Returns `None` once the event source has closed. Events still pending
    /// at that point are discarded: the source only closes on shutdown.
    pub async fn next_burst(&mut self) -> Option<Burst<T>> {
        let first = self.rx.recv().await?;
        let mut burst = Burst { last: first, count: 1 };

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.quiet) => return Some(burst),
                next = self.rx.recv() => match next {
                    Some(event) => {
                        burst.last = event;
                        burst.count += 1;
                    }
                    None => return None,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::time::sleep;

    const QUIET: Duration = Duration::from_secs(1);

    /// Send `count` events `gap` apart, then hold the channel open for a
    /// while so the final burst can fire before the source closes.
    fn spawn_producer(count: usize, gap: Duration) -> mpsc::UnboundedReceiver<usize> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            for i in 0..count {
                tx.send(i).unwrap();
                sleep(gap).await;
            }
            sleep(QUIET * 5).await;
        });
        rx
    }

    async fn collect_bursts(rx: mpsc::UnboundedReceiver<usize>) -> Vec<Burst<usize>> {
        let mut debouncer = Debouncer::new(rx, QUIET);
        let mut bursts = Vec::new();
        while let Some(burst) = debouncer.next_burst().await {
            bursts.push(burst);
        }
        bursts
    }

    #[tokio::test(start_paused = true)]
    async fn burst_within_quiet_period_fires_once() {
        let bursts = collect_bursts(spawn_producer(5, Duration::from_millis(200))).await;
        assert_eq!(bursts, vec![Burst { last: 4, count: 5 }]);
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_events_fire_individually() {
        let bursts = collect_bursts(spawn_producer(4, Duration::from_millis(1500))).await;
        let lasts: Vec<usize> = bursts.iter().map(|b| b.last).collect();
        assert_eq!(lasts, vec![0, 1, 2, 3]);
        assert!(bursts.iter().all(|b| b.count == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn fires_only_after_full_quiet_period() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(rx, QUIET);
        tx.send(1).unwrap();

        let started = tokio::time::Instant::now();
        let burst = debouncer.next_burst().await.unwrap();
        assert_eq!(burst, Burst { last: 1, count: 1 });
        assert!(started.elapsed() >= QUIET);
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn continuous_events_starve_reload() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(rx, QUIET);

        tokio::spawn(async move {
            for i in 0..20 {
                tx.send(i).unwrap();
                sleep(QUIET / 2).await;
            }
            sleep(QUIET * 5).await;
        });

        let started = tokio::time::Instant::now();
        let burst = debouncer.next_burst().await.unwrap();
        assert_eq!(burst, Burst { last: 19, count: 20 });
        // Nothing fired while events kept arriving.
        assert!(started.elapsed() >= QUIET / 2 * 19 + QUIET);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_source_ends_stream_and_drops_pending() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(rx, QUIET);
        tx.send(7).unwrap();
        drop(tx);
        assert!(debouncer.next_burst().await.is_none());
    }

    /// Counts live instances so retention can be observed.
    struct Tracked(Arc<AtomicUsize>);

    impl Tracked {
        fn new(live: &Arc<AtomicUsize>) -> Self {
            live.fetch_add(1, Ordering::SeqCst);
            Self(Arc::clone(live))
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn starved_debouncer_retains_only_latest_event() {
        let live = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = tokio::spawn(async move { Debouncer::new(rx, QUIET).next_burst().await });

        for _ in 0..1_000 {
            tx.send(Tracked::new(&live)).unwrap();
            sleep(QUIET / 2).await;
            assert!(live.load(Ordering::SeqCst) <= 1, "debouncer retained past events");
        }
        assert!(!pending.is_finished());

        sleep(QUIET * 2).await;
        let burst = pending.await.unwrap().unwrap();
        assert_eq!(burst.count, 1_000);
        assert_eq!(live.load(Ordering::SeqCst), 1);
        drop(burst);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
