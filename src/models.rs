//! models.rs - Core data structures for the appraisal engine
//!
//! Defines PriceTable, ValuationResult, BuyerQuote and related types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::item::ItemNode;

/// Immutable snapshot of unit prices keyed by item type id.
///
/// A table is never mutated after construction. Refreshes build a new
/// table and swap it in wholesale, so readers holding an `Arc<PriceTable>`
/// always see one complete generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    prices: HashMap<String, f64>,
}

impl PriceTable {
    /// Build a table, dropping entries that are negative or not finite
    pub fn new(prices: HashMap<String, f64>) -> Self {
        let prices = prices
            .into_iter()
            .filter(|(_, price)| price.is_finite() && *price >= 0.0)
            .collect();
        PriceTable { prices }
    }

    pub fn get(&self, type_id: &str) -> Option<f64> {
        self.prices.get(type_id).copied()
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.prices.contains_key(type_id)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl FromIterator<(String, f64)> for PriceTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        PriceTable::new(iter.into_iter().collect())
    }
}

impl fmt::Display for PriceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PriceTable({} items)", self.prices.len())
    }
}

/// Aggregate value of an item and everything attached to or stored in it
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub own_price: f64,
    pub children_price: f64,
    /// Traversal limits cut the walk short, so the total is a lower bound
    pub truncated: bool,
}

impl ValuationResult {
    pub fn total(&self) -> f64 {
        self.own_price + self.children_price
    }

    /// Total value divided by the number of grid cells the item occupies
    pub fn per_slot<N: ItemNode + ?Sized>(&self, item: &N) -> f64 {
        let cells = u64::from(item.width()) * u64::from(item.height());
        self.total() / cells.max(1) as f64
    }
}

impl fmt::Display for ValuationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.0} (own {:.0} + contents {:.0})",
            self.total(),
            self.own_price,
            self.children_price
        )?;
        if self.truncated {
            write!(f, " [lower bound]")?;
        }
        Ok(())
    }
}

/// One priced component found while walking an item graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentValue {
    pub type_id: String,
    pub unit_price: f64,
    /// Unit price times the clamped stack count
    pub total_price: f64,
    /// 0 for direct children of the root
    pub depth: usize,
}

/// A buyer's offer for one unit of an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyerQuote {
    pub buyer_id: String,
    pub buyer_name: String,
    pub amount: i64,
    pub currency_id: String,
    pub currency_to_reference_rate: f64,
}

impl BuyerQuote {
    /// Offer expressed in the reference currency
    pub fn reference_amount(&self) -> f64 {
        self.amount as f64 * self.currency_to_reference_rate
    }
}

impl fmt::Display for BuyerQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pays {} {} (= {:.0})",
            self.buyer_name,
            self.amount,
            self.currency_id,
            self.reference_amount()
        )
    }
}

/// The winning quote across all buyers
pub type BestOffer = BuyerQuote;

/// Diagnostic view of a snapshot cache
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStatus {
    pub entries: usize,
    /// `None` when the cache has never been refreshed
    pub age: Option<Duration>,
    pub stale: bool,
    pub generation: u64,
}

impl CacheStatus {
    /// Human-readable age string
    pub fn age_string(&self) -> String {
        let Some(age) = self.age else {
            return "never".to_string();
        };
        let secs = age.as_secs();
        if secs < 60 {
            format!("{secs}s")
        } else if secs < 3600 {
            format!("{}m", secs / 60)
        } else if secs < 86400 {
            format!("{}h", secs / 3600)
        } else {
            format!("{}d", secs / 86400)
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, age {}, stale: {}, generation {}",
            self.entries,
            self.age_string(),
            if self.stale { "yes" } else { "no" },
            self.generation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::test_support::TestItem;

    #[test]
    fn test_price_table_drops_invalid_prices() {
        let table: PriceTable = vec![
            ("ammo".to_string(), 120.0),
            ("broken".to_string(), -5.0),
            ("nan".to_string(), f64::NAN),
            ("free".to_string(), 0.0),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("ammo"), Some(120.0));
        assert_eq!(table.get("free"), Some(0.0));
        assert!(!table.contains("broken"));
        assert_eq!(table.get("missing"), None);
    }

    #[test]
    fn test_reference_amount() {
        let quote = BuyerQuote {
            buyer_id: "peacekeeper".to_string(),
            buyer_name: "Peacekeeper".to_string(),
            amount: 50,
            currency_id: "USD".to_string(),
            currency_to_reference_rate: 2.5,
        };
        assert_eq!(quote.reference_amount(), 125.0);
    }

    #[test]
    fn test_per_slot_value() {
        let result = ValuationResult {
            own_price: 600.0,
            children_price: 600.0,
            truncated: false,
        };
        let item = TestItem::new("rifle", "m4a1", 1).with_size(4, 2);
        assert_eq!(result.per_slot(&item), 150.0);

        let zero_sized = TestItem::new("odd", "odd", 1).with_size(0, 3);
        assert_eq!(result.per_slot(&zero_sized), 1200.0);
    }

    #[test]
    fn test_display_formats() {
        let result = ValuationResult {
            own_price: 38_000.0,
            children_price: 9_500.0,
            truncated: true,
        };
        assert_eq!(
            result.to_string(),
            "47500 (own 38000 + contents 9500) [lower bound]"
        );

        let status = CacheStatus {
            entries: 3,
            age: Some(Duration::from_secs(30)),
            stale: false,
            generation: 2,
        };
        assert_eq!(status.to_string(), "3 entries, age 30s, stale: no, generation 2");
    }

    #[test]
    fn test_cache_status_age_string() {
        let mut status = CacheStatus {
            entries: 3,
            age: None,
            stale: true,
            generation: 0,
        };
        assert_eq!(status.age_string(), "never");

        status.age = Some(Duration::from_secs(125));
        assert_eq!(status.age_string(), "2m");

        status.age = Some(Duration::from_secs(2 * 86400));
        assert_eq!(status.age_string(), "2d");
    }
}
