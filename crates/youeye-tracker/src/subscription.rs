//! Weak subscriber registry with periodic compaction.
//!
//! The registry stores `Weak` handles only, so subscribing never extends a
//! subscriber's lifetime. Entries whose subscriber has been dropped are
//! skipped by every broadcast and physically removed later, either when the
//! next subscriber is added or when the compaction timer fires.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Period of the background compaction timer.
pub const DEFAULT_COMPACTION_INTERVAL: Duration = Duration::from_secs(5);

type Entries<T> = Mutex<Vec<Weak<T>>>;

/// Insertion-ordered collection of weakly held subscribers.
///
/// A task on a tokio runtime compacts the registry every `interval`. The
/// task only holds a `Weak` to the entries and stops when the manager is
/// dropped. Without a runtime there is no timer and compaction happens only
/// on `subscribe`.
pub struct SubscriptionManager<T: ?Sized + Send + Sync + 'static> {
    entries: Arc<Entries<T>>,
    interval: Duration,
    cancel: CancellationToken,
    timer: Option<JoinHandle<()>>,
}

impl<T: ?Sized + Send + Sync + 'static> SubscriptionManager<T> {
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_COMPACTION_INTERVAL)
    }

    /// Manager whose timer runs on the current tokio runtime, if any.
    pub fn with_interval(interval: Duration) -> Self {
        match Handle::try_current() {
            Ok(handle) => Self::with_handle(interval, &handle),
            Err(_) => {
                if !interval.is_zero() {
                    tracing::warn!(
                        ?interval,
                        "no tokio runtime; compacting subscribers on subscribe only"
                    );
                }
                Self::build(interval, None)
            }
        }
    }

    /// Manager whose timer runs on `handle`, e.g. a long-lived runtime owned
    /// by the caller.
    pub fn with_handle(interval: Duration, handle: &Handle) -> Self {
        Self::build(interval, Some(handle))
    }

    fn build(interval: Duration, handle: Option<&Handle>) -> Self {
        let entries: Arc<Entries<T>> = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();

        let timer = match handle {
            Some(_) if interval.is_zero() => {
                tracing::warn!("zero compaction interval; periodic compaction disabled");
                None
            }
            Some(handle) => Some(handle.spawn(compaction_loop(
                Arc::downgrade(&entries),
                interval,
                cancel.clone(),
            ))),
            None => None,
        };

        Self {
            entries,
            interval,
            cancel,
            timer,
        }
    }

    /// Compaction timer period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Register a subscriber. Compacts first, then appends.
    ///
    /// No uniqueness check is made: subscribing the same object twice yields
    /// two entries and two callbacks per broadcast.
    pub fn subscribe(&self, subscriber: Weak<T>) {
        self.compact();
        self.entries.lock().push(subscriber);
    }

    /// Remove every entry whose subscriber has been dropped.
    pub(crate) fn compact(&self) {
        compact_entries(&self.entries);
    }

    /// Strong handles to every live subscriber, in subscription order.
    pub fn live_subscribers(&self) -> Vec<Arc<T>> {
        self.entries.lock().iter().filter_map(Weak::upgrade).collect()
    }

    /// Invoke `f` on every live subscriber.
    ///
    /// Runs against a snapshot taken under the lock, so callbacks may freely
    /// subscribe and a concurrent compaction cannot disturb the iteration.
    pub fn broadcast<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        for subscriber in self.live_subscribers() {
            f(&subscriber);
        }
    }

    /// Number of entries held, live or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Whether a compaction timer was started.
    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Number of entries whose subscriber is still alive.
    pub fn live_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Default for SubscriptionManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Drop for SubscriptionManager<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.entries.lock().clear();
    }
}

fn compact_entries<T: ?Sized>(entries: &Entries<T>) {
    let mut entries = entries.lock();
    let before = entries.len();
    entries.retain(|w| w.strong_count() > 0);
    let removed = before - entries.len();
    if removed > 0 {
        tracing::trace!(removed, remaining = entries.len(), "compacted subscribers");
    }
}

async fn compaction_loop<T: ?Sized + Send + Sync + 'static>(
    entries: Weak<Entries<T>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(entries) = entries.upgrade() else {
                    break;
                };
                compact_entries(&entries);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Listener: Send + Sync {
        fn hit(&self);
    }

    #[derive(Default)]
    struct Counter {
        hits: AtomicUsize,
    }

    impl Counter {
        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    impl Listener for Counter {
        fn hit(&self) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn listener(counter: &Arc<Counter>) -> Weak<dyn Listener> {
        let weak: Weak<Counter> = Arc::downgrade(counter);
        weak
    }

    fn counters(n: usize) -> Vec<Arc<Counter>> {
        (0..n).map(|_| Arc::new(Counter::default())).collect()
    }

    #[test]
    fn test_subscribe_does_not_extend_lifetime() {
        let manager: SubscriptionManager<dyn Listener> = SubscriptionManager::new();
        let counter = Arc::new(Counter::default());
        manager.subscribe(listener(&counter));

        assert_eq!(Arc::strong_count(&counter), 1);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.live_count(), 1);

        drop(counter);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.live_count(), 0);
    }

    #[test]
    fn test_broadcast_skips_released() {
        let manager: SubscriptionManager<dyn Listener> = SubscriptionManager::new();
        let kept = Arc::new(Counter::default());
        let released = Arc::new(Counter::default());
        manager.subscribe(listener(&kept));
        manager.subscribe(listener(&released));
        drop(released);

        let mut calls = 0;
        manager.broadcast(|p| {
            p.hit();
            calls += 1;
        });
        assert_eq!(calls, 1);
        assert_eq!(kept.hits(), 1);
        // Orphaned entry is still held until the next compaction.
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_duplicate_subscribe_yields_two_callbacks() {
        let manager: SubscriptionManager<dyn Listener> = SubscriptionManager::new();
        let counter = Arc::new(Counter::default());
        manager.subscribe(listener(&counter));
        manager.subscribe(listener(&counter));

        manager.broadcast(|p| p.hit());
        assert_eq!(manager.len(), 2);
        assert_eq!(counter.hits(), 2);
    }

    #[test]
    fn test_broadcast_preserves_order() {
        let manager: SubscriptionManager<Counter> = SubscriptionManager::new();
        let counters = counters(3);
        for c in &counters {
            manager.subscribe(Arc::downgrade(c));
        }
        let live = manager.live_subscribers();
        assert_eq!(live.len(), 3);
        for (a, b) in live.iter().zip(&counters) {
            assert!(Arc::ptr_eq(a, b));
        }
    }

    #[test]
    fn test_compact_removes_only_released() {
        let manager: SubscriptionManager<Counter> = SubscriptionManager::new();
        let mut counters = counters(4);
        for c in &counters {
            manager.subscribe(Arc::downgrade(c));
        }
        counters.truncate(1);
        assert_eq!(manager.len(), 4);

        manager.compact();
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.live_count(), 1);
    }

    #[test]
    fn test_subscribe_compacts_before_append() {
        let manager: SubscriptionManager<Counter> = SubscriptionManager::new();
        let mut counters = counters(3);
        for c in &counters {
            manager.subscribe(Arc::downgrade(c));
        }
        counters.truncate(1);
        assert_eq!(manager.len(), 3);

        let newcomer = Arc::new(Counter::default());
        manager.subscribe(Arc::downgrade(&newcomer));
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.live_count(), 2);
    }

    #[test]
    fn test_subscribe_from_within_broadcast() {
        let manager: SubscriptionManager<Counter> = SubscriptionManager::new();
        let first = Arc::new(Counter::default());
        let second = Arc::new(Counter::default());
        manager.subscribe(Arc::downgrade(&first));

        manager.broadcast(|c| {
            c.hit();
            manager.subscribe(Arc::downgrade(&second));
        });
        assert_eq!(first.hits(), 1);
        assert_eq!(second.hits(), 0);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_drop_clears_entries() {
        let counter = Arc::new(Counter::default());
        let manager: SubscriptionManager<Counter> = SubscriptionManager::new();
        manager.subscribe(Arc::downgrade(&counter));
        assert_eq!(Arc::weak_count(&counter), 1);

        drop(manager);
        assert_eq!(Arc::weak_count(&counter), 0);
        assert_eq!(Arc::strong_count(&counter), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_compaction_purges_released() {
        let manager: SubscriptionManager<dyn Listener> = SubscriptionManager::new();
        let counters = counters(3);
        for c in &counters {
            manager.subscribe(listener(c));
        }
        drop(counters);

        assert_eq!(manager.len(), 3);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(manager.len(), 3);

        tokio::time::sleep(DEFAULT_COMPACTION_INTERVAL).await;
        assert_eq!(manager.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_compaction_keeps_live() {
        let manager: SubscriptionManager<Counter> =
            SubscriptionManager::with_interval(Duration::from_millis(100));
        let kept = Arc::new(Counter::default());
        manager.subscribe(Arc::downgrade(&kept));
        manager.subscribe(Arc::downgrade(&Arc::new(Counter::default())));
        assert_eq!(manager.len(), 2);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.live_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_timer() {
        let mut manager: SubscriptionManager<Counter> =
            SubscriptionManager::with_interval(Duration::from_millis(10));
        let counter = Arc::new(Counter::default());
        manager.subscribe(Arc::downgrade(&counter));
        let timer = manager.timer.take().unwrap();
        let cancel = manager.cancel.clone();
        tokio::task::yield_now().await;
        assert!(!timer.is_finished());

        drop(manager);
        assert!(cancel.is_cancelled());
        assert_eq!(Arc::weak_count(&counter), 0);

        // Cancellation alone ends the task; the clock never moves here.
        for _ in 0..16 {
            if timer.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(timer.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_disables_timer() {
        let manager: SubscriptionManager<Counter> = SubscriptionManager::with_interval(Duration::ZERO);
        manager.subscribe(Arc::downgrade(&Arc::new(Counter::default())));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.interval(), Duration::ZERO);
    }

    #[test]
    fn test_no_runtime_means_no_timer() {
        let manager: SubscriptionManager<Counter> = SubscriptionManager::new();
        assert!(!manager.has_timer());
        let kept = Arc::new(Counter::default());
        manager.subscribe(Arc::downgrade(&Arc::new(Counter::default())));
        manager.subscribe(Arc::downgrade(&kept));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_timer_on_explicit_handle() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let manager: SubscriptionManager<dyn Listener> =
            SubscriptionManager::with_handle(Duration::from_millis(100), runtime.handle());
        assert!(manager.has_timer());

        let released = Arc::new(Counter::default());
        manager.subscribe(listener(&released));
        drop(released);
        assert_eq!(manager.len(), 1);

        runtime.block_on(async {
            tokio::time::sleep(Duration::from_millis(250)).await;
        });
        assert_eq!(manager.len(), 0);
    }
}
