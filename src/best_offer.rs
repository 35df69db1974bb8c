//! best_offer.rs - Highest buyer offer for an item, in reference currency
//!
//! Buyers quote in their own currency; every quote is converted with the
//! buyer's exchange rate before comparing. Winners are memoised per item
//! type until the price table generation moves on.

use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::item::ItemNode;
use crate::models::{BestOffer, BuyerQuote};

/// Anything whose content is versioned by a counter that only grows
pub trait Generational {
    fn generation(&self) -> u64;
}

impl Generational for AtomicU64 {
    fn generation(&self) -> u64 {
        self.load(Ordering::SeqCst)
    }
}

impl<T: Generational + ?Sized> Generational for Arc<T> {
    fn generation(&self) -> u64 {
        (**self).generation()
    }
}

/// Trading state reported by a buyer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuyerStatus {
    pub available: bool,
    pub disabled: bool,
    pub unlocked: bool,
}

impl BuyerStatus {
    pub const OPEN: BuyerStatus = BuyerStatus {
        available: true,
        disabled: false,
        unlocked: true,
    };

    /// All three flags must agree before the buyer is asked
    pub fn can_trade(&self) -> bool {
        self.available && !self.disabled && self.unlocked
    }
}

/// Raw answer from a buyer, in the buyer's currency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub amount: i64,
    pub currency_id: String,
}

/// What a buyer is asked to price.
///
/// The item is passed by reference and is never copied or walked: a
/// container is priced as a unit, whatever it holds.
pub struct QuoteRequest<'a> {
    pub item: &'a dyn ItemNode,
    /// Always 1, so quotes compare as unit prices
    pub quantity: i64,
}

/// A party that buys items from the player
pub trait Buyer {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn status(&self) -> BuyerStatus;

    fn is_available(&self) -> bool {
        self.status().can_trade()
    }

    /// `None` when this buyer does not take the item
    fn quote(&self, request: &QuoteRequest<'_>) -> Option<Quote>;

    /// Reference-currency value of one unit of `currency_id`, if known
    fn currency_rate(&self, currency_id: &str) -> Option<f64>;
}

struct Memo {
    generation: u64,
    /// Bumped by every `invalidate()`
    epoch: u64,
    offers: HashMap<String, BestOffer>,
}

/// Finds and memoises the best buyer offer per item type
pub struct BestOfferResolver {
    prices: Arc<dyn Generational + Send + Sync>,
    memo: Mutex<Memo>,
}

impl BestOfferResolver {
    /// `prices` is watched for generation changes; any change drops the memo
    pub fn new(prices: impl Generational + Send + Sync + 'static) -> Self {
        let generation = prices.generation();
        BestOfferResolver {
            prices: Arc::new(prices),
            memo: Mutex::new(Memo {
                generation,
                epoch: 0,
                offers: HashMap::new(),
            }),
        }
    }

    /// Best offer for one unit of `item`, or `None` if nobody buys it
    pub fn best_offer(&self, item: &dyn ItemNode, buyers: &[&dyn Buyer]) -> Option<BestOffer> {
        let type_id = item.type_id();
        let current = self.prices.generation();

        let epoch = {
            let mut memo = self.memo.lock();
            if memo.generation != current {
                debug!(
                    "Price generation {} -> {}, dropping {} memoised offers",
                    memo.generation,
                    current,
                    memo.offers.len()
                );
                memo.offers.clear();
                memo.generation = current;
            }
            if let Some(offer) = memo.offers.get(type_id) {
                return Some(offer.clone());
            }
            memo.epoch
        };

        let request = QuoteRequest { item, quantity: 1 };
        let mut best: Option<BestOffer> = None;

        for buyer in buyers.iter().filter(|b| b.is_available()) {
            let Some(quote) = buyer.quote(&request) else {
                continue;
            };

            let rate = buyer
                .currency_rate(&quote.currency_id)
                .filter(|rate| rate.is_finite() && *rate > 0.0)
                .unwrap_or(1.0);

            let candidate = BuyerQuote {
                buyer_id: buyer.id().to_string(),
                buyer_name: buyer.name().to_string(),
                amount: quote.amount,
                currency_id: quote.currency_id,
                currency_to_reference_rate: rate,
            };

            let better = best
                .as_ref()
                .map_or(true, |b| candidate.reference_amount() > b.reference_amount());
            if better {
                best = Some(candidate);
            }
        }

        if let Some(offer) = &best {
            let mut memo = self.memo.lock();
            // A refresh or an invalidation may have landed while buyers were queried
            if memo.generation == current && memo.epoch == epoch {
                memo.offers.insert(type_id.to_string(), offer.clone());
            }
        }

        best
    }

    /// Drop every memoised offer, e.g. after buyer state changed
    pub fn invalidate(&self) {
        let mut memo = self.memo.lock();
        debug!("Buyer offer memo cleared ({} entries)", memo.offers.len());
        memo.offers.clear();
        memo.epoch += 1;
    }

    pub fn memo_len(&self) -> usize {
        self.memo.lock().offers.len()
    }
}
