//! price_cache.rs - Cached unit price table with policy-driven refresh

use chrono::{DateTime, Utc};
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::best_offer::Generational;
use crate::error::{FetchError, RefreshError};
use crate::models::{CacheStatus, PriceTable};
use crate::price_source::PriceSource;
use crate::snapshot::{Clock, FetchFn, FetchFuture, RefreshPolicy, SnapshotCache, SystemClock};

/// Minimum spacing between two user-triggered refreshes
pub const DEFAULT_MANUAL_COOLDOWN: Duration = Duration::from_secs(5);

/// Owns the current `PriceTable` generation.
///
/// Cloning is cheap and every clone shares the same snapshot, so the
/// composition root builds one and hands clones to whoever needs prices.
#[derive(Clone)]
pub struct PriceCache {
    cache: SnapshotCache<PriceTable>,
    manual_cooldown: Duration,
    last_manual_refresh: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl PriceCache {
    pub fn new(source: Arc<dyn PriceSource>, policy: RefreshPolicy) -> Self {
        Self::with_clock(source, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: Arc<dyn PriceSource>,
        policy: RefreshPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let fetch: FetchFn<PriceTable> = Box::new(move || -> FetchFuture<PriceTable> {
            let source = Arc::clone(&source);
            Box::pin(async move {
                // An empty table is not a load, so it never pins a permanent cache
                match source.fetch_prices().await {
                    Ok(table) if table.is_empty() => Err(FetchError::Unavailable(
                        "provider returned an empty price table".to_string(),
                    )),
                    other => other,
                }
            })
        });

        PriceCache {
            cache: SnapshotCache::new("price table", policy, clock, fetch),
            manual_cooldown: DEFAULT_MANUAL_COOLDOWN,
            last_manual_refresh: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_manual_cooldown(mut self, cooldown: Duration) -> Self {
        self.manual_cooldown = cooldown;
        self
    }

    /// Spacing between non-forced attempts while loads keep failing
    pub fn with_min_retry_interval(self, interval: Duration) -> Self {
        self.cache.set_min_retry_interval(interval);
        self
    }

    /// Cached unit price for `type_id`.
    ///
    /// Never waits: before the first load this starts one in the background
    /// and returns `None`.
    pub fn get_price(&self, type_id: &str) -> Option<f64> {
        match self.cache.snapshot() {
            Some(table) => table.get(type_id),
            None => {
                self.cache.trigger_load();
                None
            }
        }
    }

    /// Current table generation, for callers valuing many items at once
    pub fn table(&self) -> Option<Arc<PriceTable>> {
        self.cache.snapshot()
    }

    pub async fn refresh(&self, force: bool) -> bool {
        self.cache.refresh(force).await
    }

    pub fn spawn_refresh(&self, force: bool) -> tokio::task::JoinHandle<bool> {
        self.cache.spawn_refresh(force)
    }

    /// Wait for a first table, starting or joining a load. `false` on
    /// failure or timeout.
    pub async fn wait_until_loaded(&self, timeout: Duration) -> bool {
        if self.cache.snapshot().is_some() {
            return true;
        }
        tokio::time::timeout(timeout, self.cache.refresh(false))
            .await
            .unwrap_or(false)
    }

    /// User-initiated refresh: debounced, always fetches, reports failure
    pub async fn manual_refresh(&self) -> Result<(), RefreshError> {
        let now = self.cache.now();
        {
            let mut last = self.last_manual_refresh.lock();
            if let Some(previous) = *last {
                let elapsed = (now - previous).to_std().unwrap_or(Duration::ZERO);
                if elapsed < self.manual_cooldown {
                    return Err(RefreshError::Debounced {
                        remaining: self.manual_cooldown - elapsed,
                    });
                }
            }
            *last = Some(now);
        }

        info!("Manual price refresh requested");
        if self.cache.refresh(true).await {
            Ok(())
        } else {
            Err(RefreshError::Failed(
                self.cache
                    .last_error()
                    .unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }

    pub fn is_stale(&self) -> bool {
        self.cache.is_stale()
    }

    /// Time since the last successful refresh, `Duration::MAX` if never
    pub fn age(&self) -> Duration {
        self.cache.age()
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.cache.policy()
    }

    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }

    pub fn len(&self) -> usize {
        self.cache.snapshot().map_or(0, |table| table.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status(&self) -> CacheStatus {
        CacheStatus {
            entries: self.len(),
            age: self.cache.age_if_loaded(),
            stale: self.cache.is_stale(),
            generation: self.cache.generation(),
        }
    }
}

impl Generational for PriceCache {
    fn generation(&self) -> u64 {
        self.cache.generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_source::MockPriceSource;
    use crate::snapshot::ManualClock;

    fn setup(policy: RefreshPolicy) -> (Arc<MockPriceSource>, Arc<ManualClock>, PriceCache) {
        let source = Arc::new(MockPriceSource::with_prices([("m4a1", 38_000.0), ("m855a1", 620.0)]));
        let clock = Arc::new(ManualClock::default());
        let cache = PriceCache::with_clock(source.clone(), policy, clock.clone());
        (source, clock, cache)
    }

    #[tokio::test]
    async fn test_get_price_before_load_returns_none_and_starts_load() {
        let (source, _clock, cache) = setup(RefreshPolicy::Permanent);

        assert_eq!(cache.get_price("m4a1"), None);
        assert!(cache.wait_until_loaded(Duration::from_secs(1)).await);

        assert_eq!(cache.get_price("m4a1"), Some(38_000.0));
        assert_eq!(cache.get_price("unknown"), None);
        assert_eq!(source.price_fetches(), 1);
    }

    #[tokio::test]
    async fn test_permanent_cache_never_goes_stale() {
        let (source, clock, cache) = setup(RefreshPolicy::Permanent);
        assert!(cache.refresh(false).await);

        for _ in 0..5 {
            clock.advance(chrono::Duration::days(400));
            assert!(!cache.is_stale());
            assert!(cache.refresh(false).await);
        }
        assert_eq!(source.price_fetches(), 1);
    }

    #[tokio::test]
    async fn test_fixed_interval_staleness_tracks_age() {
        let interval = Duration::from_secs(5 * 60);
        let (source, clock, cache) = setup(RefreshPolicy::FixedInterval(interval));

        assert!(cache.is_stale());
        assert_eq!(cache.age(), Duration::MAX);

        assert!(cache.refresh(false).await);
        assert!(!cache.is_stale());

        clock.advance(chrono::Duration::seconds(300));
        assert_eq!(cache.age(), interval);
        assert!(!cache.is_stale());

        clock.advance(chrono::Duration::seconds(1));
        assert!(cache.age() > interval);
        assert!(cache.is_stale());

        assert!(cache.refresh(false).await);
        assert!(!cache.is_stale());
        assert_eq!(source.price_fetches(), 2);
        assert_eq!(cache.generation(), 2);
    }

    #[tokio::test]
    async fn test_manual_only_cache_reloads_only_when_forced() {
        let (source, clock, cache) = setup(RefreshPolicy::ManualOnly);
        assert!(cache.refresh(false).await);

        clock.advance(chrono::Duration::hours(12));
        assert!(cache.refresh(false).await);
        assert_eq!(source.price_fetches(), 1);

        assert!(cache.refresh(true).await);
        assert_eq!(source.price_fetches(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_fetch_once() {
        let source = Arc::new(
            MockPriceSource::with_prices([("m4a1", 38_000.0)])
                .with_latency(Duration::from_millis(50)),
        );
        let cache = PriceCache::new(source.clone(), RefreshPolicy::Permanent);

        let handles: Vec<_> = (0..10).map(|_| cache.spawn_refresh(false)).collect();
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        assert_eq!(source.price_fetches(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_table() {
        let (source, _clock, cache) = setup(RefreshPolicy::Permanent);
        assert!(cache.refresh(false).await);

        source.set_prices([("m4a1", 1.0)]);
        source.set_failing(true);
        assert!(!cache.refresh(true).await);

        assert_eq!(cache.get_price("m4a1"), Some(38_000.0));
        assert_eq!(cache.generation(), 1);
    }

    #[tokio::test]
    async fn test_refresh_swaps_whole_table() {
        let (source, _clock, cache) = setup(RefreshPolicy::Permanent);
        assert!(cache.refresh(false).await);
        let old = cache.table().unwrap();

        source.set_prices([("tri_zip", 18_000.0)]);
        assert!(cache.refresh(true).await);

        // Readers holding the old generation keep a complete table
        assert_eq!(old.get("m4a1"), Some(38_000.0));
        assert_eq!(cache.get_price("m4a1"), None);
        assert_eq!(cache.get_price("tri_zip"), Some(18_000.0));
    }

    #[tokio::test]
    async fn test_manual_refresh_is_debounced() {
        let (source, clock, cache) = setup(RefreshPolicy::ManualOnly);

        assert_eq!(cache.manual_refresh().await, Ok(()));

        clock.advance(chrono::Duration::seconds(2));
        assert_eq!(
            cache.manual_refresh().await,
            Err(RefreshError::Debounced {
                remaining: Duration::from_secs(3)
            })
        );
        assert_eq!(source.price_fetches(), 1);

        clock.advance(chrono::Duration::seconds(4));
        assert_eq!(cache.manual_refresh().await, Ok(()));
        assert_eq!(source.price_fetches(), 2);
    }

    #[tokio::test]
    async fn test_manual_refresh_surfaces_failure() {
        let (source, _clock, cache) = setup(RefreshPolicy::ManualOnly);
        source.set_failing(true);

        match cache.manual_refresh().await {
            Err(RefreshError::Failed(message)) => assert!(message.contains("mock source")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hovers_against_dead_provider_fetch_once_per_interval() {
        let (source, clock, cache) = setup(RefreshPolicy::Permanent);
        source.set_failing(true);

        for _ in 0..20 {
            assert_eq!(cache.get_price("m4a1"), None);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(source.price_fetches(), 1);

        clock.advance(chrono::Duration::seconds(11));
        for _ in 0..20 {
            assert_eq!(cache.get_price("m4a1"), None);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(source.price_fetches(), 2);

        source.set_failing(false);
        clock.advance(chrono::Duration::seconds(11));
        cache.get_price("m4a1");
        assert!(cache.wait_until_loaded(Duration::from_secs(1)).await);
        assert_eq!(cache.get_price("m4a1"), Some(38_000.0));
        assert_eq!(source.price_fetches(), 3);
    }

    #[tokio::test]
    async fn test_empty_table_does_not_count_as_loaded() {
        let source = Arc::new(MockPriceSource::with_prices(Vec::<(String, f64)>::new()));
        let clock = Arc::new(ManualClock::default());
        let cache = PriceCache::with_clock(source.clone(), RefreshPolicy::Permanent, clock.clone());

        assert!(!cache.refresh(false).await);
        assert!(cache.table().is_none());

        source.set_prices([("m4a1", 38_000.0)]);
        clock.advance(chrono::Duration::seconds(11));
        assert!(cache.refresh(false).await);
        assert_eq!(cache.get_price("m4a1"), Some(38_000.0));
        assert_eq!(source.price_fetches(), 2);
    }

    #[tokio::test]
    async fn test_status_reports_entries_and_age() {
        let (_source, clock, cache) = setup(RefreshPolicy::FixedInterval(Duration::from_secs(600)));
        assert_eq!(cache.status().age, None);

        assert!(cache.refresh(false).await);
        clock.advance(chrono::Duration::seconds(90));

        let status = cache.status();
        assert_eq!(status.entries, 2);
        assert_eq!(status.age, Some(Duration::from_secs(90)));
        assert!(!status.stale);
        assert_eq!(status.generation, 1);
        assert_eq!(status.age_string(), "1m");
    }
}
