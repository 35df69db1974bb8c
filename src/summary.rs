//! summary.rs - Combined market and buyer view of one item

use serde::Serialize;
use std::fmt;

use crate::banned::BannedItemRegistry;
use crate::best_offer::{BestOfferResolver, Buyer};
use crate::item::ItemNode;
use crate::models::{BestOffer, ValuationResult};
use crate::price_cache::PriceCache;
use crate::valuation::ValuationEngine;

/// Where an item fetches the most
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SaleOutlet {
    Market,
    Buyer,
}

impl fmt::Display for SaleOutlet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaleOutlet::Market => write!(f, "market"),
            SaleOutlet::Buyer => write!(f, "buyer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSummary {
    pub type_id: String,
    /// Market price of one unit, `None` without price data
    pub market_unit_price: Option<f64>,
    /// Item plus contents, `None` until a price table is loaded
    pub valuation: Option<ValuationResult>,
    pub per_slot: Option<f64>,
    /// `None` until the ban list is loaded
    pub market_banned: Option<bool>,
    pub buyer_offer: Option<BestOffer>,
    /// Unit-for-unit comparison; a banned item never picks the market
    pub best_outlet: Option<SaleOutlet>,
}

impl PriceSummary {
    pub fn has_data(&self) -> bool {
        self.market_unit_price.is_some() || self.buyer_offer.is_some()
    }
}

/// Composition root for the appraisal services
pub struct Appraiser {
    pub prices: PriceCache,
    pub banned: BannedItemRegistry,
    pub engine: ValuationEngine,
    pub offers: BestOfferResolver,
}

impl Appraiser {
    pub fn new(prices: PriceCache, banned: BannedItemRegistry, engine: ValuationEngine) -> Self {
        let offers = BestOfferResolver::new(prices.clone());
        Appraiser {
            prices,
            banned,
            engine,
            offers,
        }
    }

    /// Everything known about `item` right now. Never waits on the network.
    pub fn summarize<N: ItemNode>(&self, item: &N, buyers: &[&dyn Buyer]) -> PriceSummary {
        let market_unit_price = self.prices.get_price(item.type_id());
        let valuation = self
            .prices
            .table()
            .map(|table| self.engine.value_of(item, &table));
        let per_slot = valuation.map(|v| v.per_slot(item));
        let market_banned = self.banned.is_banned(item.type_id());
        let buyer_offer = self.offers.best_offer(item, buyers);

        let market = market_unit_price.filter(|_| market_banned != Some(true));
        let best_outlet = match (market, &buyer_offer) {
            (Some(market), Some(offer)) if offer.reference_amount() > market => {
                Some(SaleOutlet::Buyer)
            }
            (Some(_), _) => Some(SaleOutlet::Market),
            (None, Some(_)) => Some(SaleOutlet::Buyer),
            (None, None) => None,
        };

        PriceSummary {
            type_id: item.type_id().to_string(),
            market_unit_price,
            valuation,
            per_slot,
            market_banned,
            buyer_offer,
            best_outlet,
        }
    }
}
