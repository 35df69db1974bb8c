//! main.rs - Entry point for the Loot Appraiser daemon
//!
//! - Loads the price table and banned item list from the game server
//! - Keeps both caches fresh in the background
//! - Prints prices for any item type ids passed on the command line

use log::{error, info, warn};
use loot_appraiser::{
    Appraiser, BannedItemRegistry, Config, HttpPriceSource, PriceCache, PriceSource,
    RefreshPolicy, RefreshScheduler, ValuationEngine, NAME, VERSION,
};
use std::sync::Arc;
use std::time::Duration;

/// How long startup waits for the first price table before printing lookups
const WARM_UP_TIMEOUT: Duration = Duration::from_secs(30);

/// Status line every this many background intervals
const STATUS_EVERY: u64 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║     Loot Appraiser v{:<37}║", VERSION);
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    info!("Starting {} v{}", NAME, VERSION);

    let config = Config::from_env()?;
    info!("✓ Configuration loaded");
    info!("  - Server: {}", config.server_url);
    info!(
        "  - Prices: {}",
        if config.use_dynamic_prices { "dynamic" } else { "static" }
    );
    info!("  - Cache mode: {}", describe_policy(&config.refresh_policy));
    info!(
        "  - Traversal: depth {}, items {}, large containers {}",
        config.limits.max_depth,
        config.limits.max_items,
        if config.limits.skip_large_containers {
            format!("skipped above {}", config.limits.large_container_threshold)
        } else {
            "walked".to_string()
        }
    );

    let source: Arc<dyn PriceSource> = Arc::new(HttpPriceSource::new(
        &config.server_url,
        config.use_dynamic_prices,
        config.request_timeout,
    )?);

    let prices = PriceCache::new(source.clone(), config.refresh_policy)
        .with_manual_cooldown(config.manual_refresh_cooldown)
        .with_min_retry_interval(config.min_retry_interval);
    let banned =
        BannedItemRegistry::new(source).with_min_retry_interval(config.min_retry_interval);
    let appraiser = Appraiser::new(
        prices.clone(),
        banned.clone(),
        ValuationEngine::new(config.limits),
    );

    let scheduler =
        RefreshScheduler::start(prices.clone(), banned.clone(), config.background_interval);

    if prices.wait_until_loaded(WARM_UP_TIMEOUT).await {
        display_lookups(&appraiser, std::env::args().skip(1).collect());
    } else {
        error!("✗ No price table available, lookups skipped");
    }

    info!(
        "🔄 Background refresh running (interval: {}s), Ctrl+C to stop",
        config.background_interval.as_secs()
    );

    let mut interval = tokio::time::interval(config.background_interval);
    interval.tick().await;
    let mut tick_count: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                tick_count += 1;
                if tick_count % STATUS_EVERY == 0 {
                    info!("📈 Prices: {} | Banned: {}", prices.status(), banned.status());
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                break;
            }
        }
    }

    info!("Shutting down...");
    scheduler.shutdown().await;
    info!("Final state | Prices: {} | Banned: {}", prices.status(), banned.status());

    Ok(())
}

fn describe_policy(policy: &RefreshPolicy) -> String {
    match policy {
        RefreshPolicy::Permanent => "permanent (load once)".to_string(),
        RefreshPolicy::FixedInterval(ttl) => format!("refresh every {}s", ttl.as_secs()),
        RefreshPolicy::ManualOnly => "manual".to_string(),
    }
}

/// Print market price and ban state for each requested type id
fn display_lookups(appraiser: &Appraiser, type_ids: Vec<String>) {
    if type_ids.is_empty() {
        info!("Price table ready: {}", appraiser.prices.status());
        return;
    }

    println!();
    println!("┌──────────────────────────────────┬────────────────┬──────────┐");
    println!("│ Item                             │ Market price   │ Market   │");
    println!("├──────────────────────────────────┼────────────────┼──────────┤");

    for type_id in &type_ids {
        let price = match appraiser.prices.get_price(type_id) {
            Some(price) => format!("{:.0}", price),
            None => "-".to_string(),
        };
        let market = match appraiser.banned.is_banned(type_id) {
            Some(true) => "banned",
            Some(false) => "open",
            None => "unknown",
        };
        println!("│ {:32} │ {:>14} │ {:8} │", type_id, price, market);
    }

    println!("└──────────────────────────────────┴────────────────┴──────────┘");
    println!();
}
