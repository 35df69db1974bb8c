//! snapshot.rs - Single-flight snapshot cache shared by the price and ban caches
//!
//! A `SnapshotCache<T>` holds one immutable `Arc<T>` plus the time it was
//! loaded. Refreshes run in a spawned task; overlapping callers join the
//! task already in flight instead of starting another fetch. The lock around
//! the snapshot is only taken to read or replace the pointer, never across
//! the fetch itself.

use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::FetchError;

pub type FetchFuture<T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send>>;

/// Produces one fetch of the underlying data per call
pub type FetchFn<T> = Box<dyn Fn() -> FetchFuture<T> + Send + Sync>;

/// Minimum spacing between two non-forced fetch attempts
pub const DEFAULT_MIN_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// When a loaded snapshot should be considered out of date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Load once, never expire
    Permanent,
    /// Expire after the given age
    FixedInterval(Duration),
    /// Only explicit forced refreshes reload
    ManualOnly,
}

impl RefreshPolicy {
    /// Pure staleness check; `last_refresh == None` means never loaded
    pub fn is_stale(&self, last_refresh: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match self {
            RefreshPolicy::Permanent | RefreshPolicy::ManualOnly => false,
            RefreshPolicy::FixedInterval(max_age) => match last_refresh {
                None => true,
                Some(at) => (now - at)
                    .to_std()
                    .map(|age| age > *max_age)
                    .unwrap_or(false),
            },
        }
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        RefreshPolicy::Permanent
    }
}

/// Time source, injectable so staleness can be tested without sleeping
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now = *now + by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

struct State<T> {
    snapshot: Option<Arc<T>>,
    last_refresh: Option<DateTime<Utc>>,
    /// Start of the most recent fetch, successful or not
    last_attempt: Option<DateTime<Utc>>,
    min_retry_interval: Duration,
    last_error: Option<String>,
}

struct Inner<T> {
    name: &'static str,
    policy: RefreshPolicy,
    clock: Arc<dyn Clock>,
    fetch: FetchFn<T>,
    fallback: Option<Box<dyn Fn() -> T + Send + Sync>>,
    state: RwLock<State<T>>,
    in_flight: Mutex<Option<watch::Receiver<Option<bool>>>>,
    generation: AtomicU64,
}

impl<T> Inner<T> {
    async fn run_fetch(&self) -> bool {
        let result = (self.fetch)().await;
        let now = self.clock.now();

        match result {
            Ok(value) => {
                let generation = {
                    let mut state = self.state.write();
                    state.snapshot = Some(Arc::new(value));
                    state.last_refresh = Some(now);
                    state.last_error = None;
                    self.generation.fetch_add(1, Ordering::SeqCst) + 1
                };
                debug!("{} refreshed (generation {})", self.name, generation);
                true
            }
            Err(e) => {
                debug!("{} refresh failed: {}", self.name, e);
                let mut state = self.state.write();
                state.last_error = Some(e.to_string());
                if state.snapshot.is_none() {
                    if let Some(fallback) = &self.fallback {
                        state.snapshot = Some(Arc::new(fallback()));
                        state.last_refresh = Some(now);
                        self.generation.fetch_add(1, Ordering::SeqCst);
                        debug!("{} installed fallback snapshot", self.name);
                    }
                }
                false
            }
        }
    }
}

/// Clears the in-flight slot when the refresh task ends, even by panic
struct InFlightGuard<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Drop for InFlightGuard<T> {
    fn drop(&mut self) {
        *self.inner.in_flight.lock() = None;
    }
}

/// Cache of one immutable snapshot with single-flight async refresh
pub struct SnapshotCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SnapshotCache<T> {
    fn clone(&self) -> Self {
        SnapshotCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> SnapshotCache<T> {
    pub fn new(
        name: &'static str,
        policy: RefreshPolicy,
        clock: Arc<dyn Clock>,
        fetch: FetchFn<T>,
    ) -> Self {
        Self::build(name, policy, clock, fetch, None)
    }

    /// Like `new`, but a failed first load installs `fallback()` instead of
    /// leaving the cache empty
    pub fn with_fallback(
        name: &'static str,
        policy: RefreshPolicy,
        clock: Arc<dyn Clock>,
        fetch: FetchFn<T>,
        fallback: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self::build(name, policy, clock, fetch, Some(Box::new(fallback)))
    }

    fn build(
        name: &'static str,
        policy: RefreshPolicy,
        clock: Arc<dyn Clock>,
        fetch: FetchFn<T>,
        fallback: Option<Box<dyn Fn() -> T + Send + Sync>>,
    ) -> Self {
        SnapshotCache {
            inner: Arc::new(Inner {
                name,
                policy,
                clock,
                fetch,
                fallback,
                state: RwLock::new(State {
                    snapshot: None,
                    last_refresh: None,
                    last_attempt: None,
                    min_retry_interval: DEFAULT_MIN_RETRY_INTERVAL,
                    last_error: None,
                }),
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Non-forced refreshes inside this window after an attempt do not fetch
    pub fn set_min_retry_interval(&self, interval: Duration) {
        self.inner.state.write().min_retry_interval = interval;
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.inner.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Current snapshot, if one was ever loaded
    pub fn snapshot(&self) -> Option<Arc<T>> {
        self.inner.state.read().snapshot.clone()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.inner.state.read().last_refresh
    }

    /// Message of the most recent failed fetch, cleared by a success
    pub fn last_error(&self) -> Option<String> {
        self.inner.state.read().last_error.clone()
    }

    /// Bumped every time a new snapshot is swapped in
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn is_stale(&self) -> bool {
        self.inner
            .policy
            .is_stale(self.last_refresh(), self.inner.clock.now())
    }

    /// Time since the last successful load, `Duration::MAX` if never
    pub fn age(&self) -> Duration {
        self.age_if_loaded().unwrap_or(Duration::MAX)
    }

    pub fn age_if_loaded(&self) -> Option<Duration> {
        self.last_refresh().map(|at| {
            (self.inner.clock.now() - at)
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    fn needs_refresh(&self) -> bool {
        let state = self.inner.state.read();
        state.snapshot.is_none()
            || self
                .inner
                .policy
                .is_stale(state.last_refresh, self.inner.clock.now())
    }

    /// A fetch was attempted less than `min_retry_interval` ago
    fn retry_throttled(&self) -> bool {
        let state = self.inner.state.read();
        match state.last_attempt {
            None => false,
            Some(at) => (self.inner.clock.now() - at)
                .to_std()
                .map(|since| since < state.min_retry_interval)
                .unwrap_or(false),
        }
    }

    /// Refresh the snapshot.
    ///
    /// Joins a refresh already in flight. Without `force`, a loaded snapshot
    /// that is not stale returns `true` without fetching, and a fetch
    /// attempted within the minimum retry interval is not repeated: the
    /// result is then whether any snapshot is present. A failed fetch
    /// leaves the previous snapshot in place and returns `false`.
    pub async fn refresh(&self, force: bool) -> bool {
        let mut outcome = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(rx) => rx.clone(),
                None => {
                    if !force {
                        if !self.needs_refresh() {
                            return true;
                        }
                        if self.retry_throttled() {
                            debug!(
                                "{}: last attempt too recent, not retrying yet",
                                self.inner.name
                            );
                            return self.inner.state.read().snapshot.is_some();
                        }
                    }

                    self.inner.state.write().last_attempt = Some(self.inner.clock.now());
                    let (tx, rx) = watch::channel(None);
                    *slot = Some(rx.clone());

                    let guard = InFlightGuard {
                        inner: Arc::clone(&self.inner),
                    };
                    tokio::spawn(async move {
                        let ok = guard.inner.run_fetch().await;
                        drop(guard);
                        let _ = tx.send(Some(ok));
                    });
                    rx
                }
            }
        };

        let ok = match outcome.wait_for(|done| done.is_some()).await {
            Ok(done) => (*done).unwrap_or(false),
            // Refresh task died without reporting
            Err(_) => false,
        };
        ok
    }

    /// Start a refresh in the background and hand back its task
    pub fn spawn_refresh(&self, force: bool) -> JoinHandle<bool> {
        let cache = self.clone();
        tokio::spawn(async move { cache.refresh(force).await })
    }

    /// Fire-and-forget load used by non-suspending readers.
    ///
    /// Outside a tokio runtime there is nothing to drive the fetch, so the
    /// request is dropped.
    pub fn trigger_load(&self) {
        if self.is_refreshing() || self.retry_throttled() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let cache = self.clone();
                handle.spawn(async move {
                    cache.refresh(false).await;
                });
            }
            Err(_) => debug!("{}: no runtime available, load not started", self.inner.name),
        }
    }
}
