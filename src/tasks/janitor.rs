//! Expiration Janitor
//!
//! Background loop that periodically sweeps expired items out of a cache.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Weak;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};

// == Sweep ==
/// Anything the janitor can periodically clean.
pub trait Sweep: Send + Sync {
    /// Removes expired entries and returns how many were removed.
    fn sweep(&self) -> usize;
}

// == Janitor Handle ==
/// Handle to a running sweep loop.
///
/// The loop lives on its own `cache-janitor` thread driving a single-threaded
/// runtime, so it never depends on the caller's runtime. Dropping the handle
/// stops the loop.
pub struct Janitor {
    interval: Duration,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    worker: thread::JoinHandle<()>,
}

impl Janitor {
    /// Starts a sweep loop over `target` firing every `interval`.
    ///
    /// The loop holds only a weak reference and exits on its own once the
    /// target is dropped.
    ///
    /// # Arguments
    /// * `target` - The cache to sweep
    /// * `interval` - Time between sweeps, must be non-zero
    pub fn start(target: Weak<dyn Sweep>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(CacheError::Janitor(
                "cleanup interval must be greater than zero".to_string(),
            ));
        }

        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| CacheError::Janitor(e.to_string()))?;
        let (stop_tx, stop_rx) = oneshot::channel();
        let worker = thread::Builder::new()
            .name("cache-janitor".to_string())
            .spawn(move || runtime.block_on(run(target, interval, stop_rx)))
            .map_err(|e| CacheError::Janitor(e.to_string()))?;

        Ok(Self {
            interval,
            stop: Mutex::new(Some(stop_tx)),
            worker,
        })
    }

    /// Signals the loop to stop.
    ///
    /// Returns true only for the call that actually delivered the signal.
    pub fn stop(&self) -> bool {
        match self.stop.lock().take() {
            // The loop may already be gone, which is just as stopped
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    /// Returns true until the loop has been stopped or has exited.
    pub fn is_running(&self) -> bool {
        self.stop.lock().is_some() && !self.worker.is_finished()
    }

    /// Time between sweeps.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Janitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Janitor")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

// == Sweep Loop ==
/// Ticks every `interval` and sweeps until stopped or the target goes away.
///
/// Sweeping and waiting alternate in one loop, so sweeps never overlap. A slow
/// sweep delays the next tick rather than triggering a burst of catch-up ticks.
async fn run(target: Weak<dyn Sweep>, interval: Duration, mut stop: oneshot::Receiver<()>) {
    info!(
        "Starting cache janitor with interval of {} ms",
        interval.as_millis()
    );

    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Fires on an explicit stop and when the handle is dropped
            _ = &mut stop => break,
            _ = ticker.tick() => {
                let Some(cache) = target.upgrade() else {
                    debug!("Cache dropped, janitor exiting");
                    break;
                };
                // Items are already removed when callbacks run, so a panicking
                // callback only loses the rest of this batch of notifications
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| cache.sweep()));
                drop(cache);

                match outcome {
                    Ok(0) => debug!("Janitor sweep: no expired items found"),
                    Ok(removed) => info!("Janitor sweep: removed {} expired items", removed),
                    Err(_) => warn!("Janitor sweep: eviction callback panicked"),
                }
            }
        }
    }

    info!("Cache janitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counter {
        sweeps: AtomicUsize,
    }

    impl Sweep for Counter {
        fn sweep(&self) -> usize {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            0
        }
    }

    fn weak_target(counter: &Arc<Counter>) -> Weak<dyn Sweep> {
        let target: Arc<dyn Sweep> = counter.clone();
        Arc::downgrade(&target)
    }

    #[tokio::test]
    async fn test_janitor_sweeps_periodically() {
        let counter = Arc::new(Counter::default());
        let janitor = Janitor::start(weak_target(&counter), Duration::from_millis(20)).unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(counter.sweeps.load(Ordering::SeqCst) >= 2);
        assert!(janitor.is_running());
        janitor.stop();
    }

    #[tokio::test]
    async fn test_janitor_stop_is_idempotent() {
        let counter = Arc::new(Counter::default());
        let janitor = Janitor::start(weak_target(&counter), Duration::from_millis(20)).unwrap();

        assert!(janitor.stop());
        assert!(!janitor.stop());
        assert!(!janitor.is_running());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let after_stop = counter.sweeps.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(counter.sweeps.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_janitor_exits_when_target_dropped() {
        let counter = Arc::new(Counter::default());
        let janitor = Janitor::start(weak_target(&counter), Duration::from_millis(10)).unwrap();

        drop(counter);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!janitor.is_running(), "Loop should exit once the cache is gone");
    }

    #[test]
    fn test_janitor_runs_on_own_thread() {
        let counter = Arc::new(Counter::default());
        let janitor = Janitor::start(weak_target(&counter), Duration::from_millis(10)).unwrap();
        assert_eq!(janitor.worker.thread().name(), Some("cache-janitor"));

        thread::sleep(Duration::from_millis(100));
        assert!(counter.sweeps.load(Ordering::SeqCst) >= 2);

        drop(janitor);
    }

    #[test]
    fn test_janitor_outlives_starting_runtime() {
        let counter = Arc::new(Counter::default());
        let rt = tokio::runtime::Runtime::new().unwrap();
        let janitor = rt
            .block_on(async { Janitor::start(weak_target(&counter), Duration::from_millis(10)) })
            .unwrap();
        drop(rt);

        let before = counter.sweeps.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));

        assert!(janitor.is_running());
        assert!(counter.sweeps.load(Ordering::SeqCst) >= before + 2);
    }

    #[test]
    fn test_janitor_survives_panicking_sweep() {
        #[derive(Default)]
        struct Flaky {
            sweeps: AtomicUsize,
        }

        impl Sweep for Flaky {
            fn sweep(&self) -> usize {
                if self.sweeps.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first sweep fails");
                }
                0
            }
        }

        let flaky = Arc::new(Flaky::default());
        let target: Arc<dyn Sweep> = flaky.clone();
        let janitor = Janitor::start(Arc::downgrade(&target), Duration::from_millis(10)).unwrap();

        thread::sleep(Duration::from_millis(100));

        assert!(janitor.is_running());
        assert!(flaky.sweeps.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn test_janitor_rejects_zero_interval() {
        let counter = Arc::new(Counter::default());
        let result = Janitor::start(weak_target(&counter), Duration::ZERO);
        assert!(matches!(result, Err(CacheError::Janitor(_))));
    }
}
