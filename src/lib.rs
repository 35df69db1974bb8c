//! Loot Appraiser Engine
//!
//! Prices inventory items for a running trading simulation
//!
//! # Components
//! - PriceCache: cached id -> price table with policy-driven, single-flight refresh
//! - BannedItemRegistry: ids that cannot be sold on the market (24h cache)
//! - ValuationEngine: bounded, cycle-safe valuation of attachment trees and nested containers
//! - BestOfferResolver: best buyer quote in reference currency, memoised per item type
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                RefreshScheduler                      │
//! │  (Warm-up and periodic staleness checks)             │
//! └────────────────────────┬────────────────────────────┘
//!                          │
//!          ┌───────────────┴───────────────┐
//!          ▼                               ▼
//! ┌─────────────────┐           ┌─────────────────────┐
//! │   PriceCache    │           │ BannedItemRegistry  │
//! └────────┬────────┘           └──────────┬──────────┘
//!          │        SnapshotCache<T>       │
//!          └───────────────┬───────────────┘
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                PriceSource Trait                     │
//! │  - fetch_prices()                                    │
//! │  - fetch_banned_items()                              │
//! └────────────────────────┬────────────────────────────┘
//!          ┌───────────────┴───────────────┐
//!          ▼                               ▼
//! ┌─────────────────┐           ┌─────────────────┐
//! │ HttpPriceSource │           │ MockPriceSource │
//! │  (Production)   │           │  (Testing)      │
//! └─────────────────┘           └─────────────────┘
//!
//! Per item (hover path, never waits):
//!   Appraiser::summarize ─┬─ ValuationEngine::value_of(PriceTable snapshot)
//!                         ├─ BannedItemRegistry::is_banned
//!                         └─ BestOfferResolver::best_offer(buyers)
//! ```

pub mod banned;
pub mod best_offer;
pub mod config;
pub mod error;
pub mod item;
pub mod models;
pub mod price_cache;
pub mod price_source;
pub mod scheduler;
pub mod snapshot;
pub mod summary;
pub mod valuation;

// Re-export commonly used types
pub use models::{
    BestOffer,
    BuyerQuote,
    CacheStatus,
    ComponentValue,
    PriceTable,
    ValuationResult,
};

pub use banned::BannedItemRegistry;
pub use best_offer::{BestOfferResolver, Buyer, BuyerStatus, Generational, Quote, QuoteRequest};
pub use config::Config;
pub use error::{ConfigError, FetchError, RefreshError};
pub use item::ItemNode;
pub use price_cache::PriceCache;
pub use price_source::{HttpPriceSource, MockPriceSource, PriceSource};
pub use scheduler::RefreshScheduler;
pub use snapshot::{Clock, ManualClock, RefreshPolicy, SystemClock};
pub use summary::{Appraiser, PriceSummary, SaleOutlet};
pub use valuation::{TraversalLimits, ValuationEngine};

/// Version of the appraisal engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the package
pub const NAME: &str = env!("CARGO_PKG_NAME");
