//! scheduler.rs - Background warm-up and periodic refresh of both caches

use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::banned::BannedItemRegistry;
use crate::price_cache::PriceCache;

/// Handle to the background refresh task. Dropping it without calling
/// [`shutdown`](Self::shutdown) stops the task at its next wake-up.
pub struct RefreshScheduler {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Resolves once shutdown is requested or the handle is gone
async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

impl RefreshScheduler {
    /// Load both caches, then re-check staleness every `interval`
    pub fn start(prices: PriceCache, banned: BannedItemRegistry, interval: Duration) -> Self {
        let (shutdown, mut rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!("Warming price caches...");
            tokio::select! {
                (prices_ok, banned_ok) = async { tokio::join!(prices.refresh(false), banned.refresh(false)) } => {
                    if prices_ok {
                        info!("Price table loaded: {}", prices.status());
                    } else {
                        warn!("Initial price table load failed, will retry in the background");
                    }
                    if !banned_ok {
                        warn!("Banned item list unavailable, assuming everything is sellable");
                    }
                }
                _ = stop_requested(&mut rx) => {
                    debug!("Refresh scheduler stopped during warm-up");
                    return;
                }
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            let mut tick_count: u64 = 0;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tick_count += 1;

                        if prices.is_stale() || prices.is_empty() {
                            debug!("Tick #{}: refreshing price table", tick_count);
                            if prices.refresh(false).await {
                                info!("Price table refreshed: {}", prices.status());
                            } else {
                                warn!("Price table refresh failed, keeping previous snapshot");
                            }
                        }

                        if banned.is_stale() && !banned.refresh(false).await {
                            warn!("Banned item list refresh failed");
                        }
                    }
                    _ = stop_requested(&mut rx) => break,
                }
            }

            debug!("Refresh scheduler stopped after {} ticks", tick_count);
        });

        RefreshScheduler { shutdown, task }
    }

    /// Signal the task and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Refresh scheduler ended abnormally: {}", e);
        }
    }
}
