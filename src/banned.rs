//! banned.rs - Registry of item ids that cannot be sold on the market

use log::debug;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::models::CacheStatus;
use crate::price_source::PriceSource;
use crate::snapshot::{Clock, FetchFn, FetchFuture, RefreshPolicy, SnapshotCache, SystemClock};

/// The ban list changes with server restarts at most
pub const BANNED_LIST_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cached set of market-banned item ids.
///
/// A failed first load installs an empty set, so an unreachable provider
/// reads as "nothing is banned" instead of blocking valuation.
#[derive(Clone)]
pub struct BannedItemRegistry {
    cache: SnapshotCache<HashSet<String>>,
}

impl BannedItemRegistry {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self::with_clock(source, Arc::new(SystemClock))
    }

    pub fn with_clock(source: Arc<dyn PriceSource>, clock: Arc<dyn Clock>) -> Self {
        let fetch: FetchFn<HashSet<String>> = Box::new(move || -> FetchFuture<HashSet<String>> {
            let source = Arc::clone(&source);
            Box::pin(async move {
                source
                    .fetch_banned_items()
                    .await
                    .map(|banned| banned.into_iter().collect::<HashSet<String>>())
            })
        });

        BannedItemRegistry {
            cache: SnapshotCache::with_fallback(
                "banned item list",
                RefreshPolicy::FixedInterval(BANNED_LIST_TTL),
                clock,
                fetch,
                HashSet::new,
            ),
        }
    }

    /// Spacing between non-forced attempts while loads keep failing
    pub fn with_min_retry_interval(self, interval: Duration) -> Self {
        self.cache.set_min_retry_interval(interval);
        self
    }

    /// `Some(true)` if banned, `None` until the list has been loaded once
    pub fn is_banned(&self, type_id: &str) -> Option<bool> {
        if type_id.is_empty() {
            return None;
        }
        let banned = self.cache.snapshot()?;
        Some(banned.contains(type_id))
    }

    /// Inverse of [`is_banned`](Self::is_banned)
    pub fn can_sell_on_market(&self, type_id: &str) -> Option<bool> {
        self.is_banned(type_id).map(|banned| !banned)
    }

    pub async fn refresh(&self, force: bool) -> bool {
        let ok = self.cache.refresh(force).await;
        if !ok {
            debug!("Banned item list unavailable, treating all items as sellable");
        }
        ok
    }

    pub fn spawn_refresh(&self, force: bool) -> tokio::task::JoinHandle<bool> {
        self.cache.spawn_refresh(force)
    }

    pub fn is_stale(&self) -> bool {
        self.cache.is_stale()
    }

    pub fn age(&self) -> Duration {
        self.cache.age()
    }

    pub fn len(&self) -> usize {
        self.cache.snapshot().map_or(0, |set| set.len())
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
