//! price_source.rs - Remote price provider implementations
//!
//! The provider serves a flat id -> price table (static base prices or
//! dynamic market prices) and a list of ids that cannot be sold on the
//! market.

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::FetchError;
use crate::models::PriceTable;

pub const STATIC_PRICES_ENDPOINT: &str = "/showMeTheMoney/getStaticPriceTable";
pub const DYNAMIC_PRICES_ENDPOINT: &str = "/showMeTheMoney/getDynamicPriceTable";
pub const BANNED_ITEMS_ENDPOINT: &str = "/showMeTheMoney/getRagfairBannedItems";

/// Trait defining the interface for price providers
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the complete unit price table
    async fn fetch_prices(&self) -> Result<PriceTable, FetchError>;

    /// Fetch the ids of items banned from the market
    async fn fetch_banned_items(&self) -> Result<Vec<String>, FetchError>;
}

/// Decode a price table body. `null` and blank bodies count as empty.
pub fn decode_price_table(endpoint: &str, body: &str) -> Result<PriceTable, FetchError> {
    let body = body.trim();
    if body.is_empty() || body == "null" {
        return Err(FetchError::EmptyResponse {
            endpoint: endpoint.to_string(),
        });
    }

    let raw: HashMap<String, f64> =
        serde_json::from_str(body).map_err(|source| FetchError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })?;
    let received = raw.len();
    let table = PriceTable::new(raw);

    if table.len() < received {
        debug!("Dropped {} invalid prices from {}", received - table.len(), endpoint);
    }
    Ok(table)
}

/// Decode the banned id list
pub fn decode_banned_items(endpoint: &str, body: &str) -> Result<Vec<String>, FetchError> {
    let body = body.trim();
    if body.is_empty() || body == "null" {
        return Err(FetchError::EmptyResponse {
            endpoint: endpoint.to_string(),
        });
    }

    serde_json::from_str(body).map_err(|source| FetchError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

// ============================================================================
// HttpPriceSource - price server over HTTP
// ============================================================================

/// Price provider reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpPriceSource {
    client: Client,
    base_url: String,
    use_dynamic_prices: bool,
}

impl HttpPriceSource {
    pub fn new(
        base_url: &str,
        use_dynamic_prices: bool,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(HttpPriceSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            use_dynamic_prices,
        })
    }

    /// Endpoint serving the configured kind of price table
    pub fn price_endpoint(&self) -> &'static str {
        if self.use_dynamic_prices {
            DYNAMIC_PRICES_ENDPOINT
        } else {
            STATIC_PRICES_ENDPOINT
        }
    }

    async fn get_body(&self, endpoint: &str) -> Result<String, FetchError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Fetching from: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch_prices(&self) -> Result<PriceTable, FetchError> {
        let endpoint = self.price_endpoint();
        let body = self.get_body(endpoint).await?;
        let table = decode_price_table(endpoint, &body)?;

        info!("Price table fetched: {} items", table.len());
        Ok(table)
    }

    async fn fetch_banned_items(&self) -> Result<Vec<String>, FetchError> {
        let body = self.get_body(BANNED_ITEMS_ENDPOINT).await?;
        let banned = decode_banned_items(BANNED_ITEMS_ENDPOINT, &body)?;

        info!("Banned item list fetched: {} items", banned.len());
        Ok(banned)
    }
}

// ============================================================================
// MockPriceSource - For testing purposes
// ============================================================================

/// In-memory provider for tests and offline runs
#[derive(Debug)]
pub struct MockPriceSource {
    prices: Mutex<HashMap<String, f64>>,
    banned: Mutex<Vec<String>>,
    latency: Duration,
    failing: AtomicBool,
    price_fetches: AtomicUsize,
    banned_fetches: AtomicUsize,
}

impl MockPriceSource {
    pub fn new() -> Self {
        let prices = [
            ("m4a1", 38_000.0),
            ("m4a1_handguard", 9_500.0),
            ("eotech_553", 27_000.0),
            ("stanag_mag", 2_400.0),
            ("m855a1", 620.0),
            ("tri_zip", 18_000.0),
            ("graphics_card", 310_000.0),
        ];

        MockPriceSource {
            prices: Mutex::new(
                prices
                    .into_iter()
                    .map(|(id, price)| (id.to_string(), price))
                    .collect(),
            ),
            banned: Mutex::new(vec!["graphics_card".to_string()]),
            latency: Duration::ZERO,
            failing: AtomicBool::new(false),
            price_fetches: AtomicUsize::new(0),
            banned_fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_prices<I, S>(prices: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let source = Self::new();
        source.set_prices(prices);
        source.banned.lock().clear();
        source
    }

    /// Delay every fetch, to keep refreshes in flight during tests
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_prices<I, S>(&self, prices: I)
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        *self.prices.lock() = prices.into_iter().map(|(id, p)| (id.into(), p)).collect();
    }

    pub fn set_banned<I, S>(&self, banned: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.banned.lock() = banned.into_iter().map(Into::into).collect();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn price_fetches(&self) -> usize {
        self.price_fetches.load(Ordering::SeqCst)
    }

    pub fn banned_fetches(&self) -> usize {
        self.banned_fetches.load(Ordering::SeqCst)
    }

    async fn simulate(&self) -> Result<(), FetchError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Unavailable("mock source set to fail".to_string()));
        }
        Ok(())
    }
}

impl Default for MockPriceSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn fetch_prices(&self) -> Result<PriceTable, FetchError> {
        self.price_fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        Ok(PriceTable::new(self.prices.lock().clone()))
    }

    async fn fetch_banned_items(&self) -> Result<Vec<String>, FetchError> {
        self.banned_fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        Ok(self.banned.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_price_table() {
        let table = decode_price_table(
            STATIC_PRICES_ENDPOINT,
            r#"{"m4a1": 38000, "m855a1": 620.5, "bad": -1}"#,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("m4a1"), Some(38000.0));
        assert_eq!(table.get("m855a1"), Some(620.5));
    }

    #[test]
    fn test_decode_rejects_empty_and_malformed_bodies() {
        assert!(matches!(
            decode_price_table(STATIC_PRICES_ENDPOINT, "  "),
            Err(FetchError::EmptyResponse { .. })
        ));
        assert!(matches!(
            decode_price_table(STATIC_PRICES_ENDPOINT, "null"),
            Err(FetchError::EmptyResponse { .. })
        ));
        assert!(matches!(
            decode_price_table(STATIC_PRICES_ENDPOINT, "[1, 2]"),
            Err(FetchError::Decode { .. })
        ));
    }

    #[test]
    fn test_decode_banned_items() {
        let banned =
            decode_banned_items(BANNED_ITEMS_ENDPOINT, r#"["graphics_card", "ledx"]"#).unwrap();
        assert_eq!(banned, vec!["graphics_card", "ledx"]);
    }

    #[test]
    fn test_price_endpoint_selection() {
        let timeout = Duration::from_secs(1);
        let static_source = HttpPriceSource::new("http://127.0.0.1:6969/", false, timeout).unwrap();
        let dynamic_source = HttpPriceSource::new("http://127.0.0.1:6969", true, timeout).unwrap();

        assert_eq!(static_source.price_endpoint(), STATIC_PRICES_ENDPOINT);
        assert_eq!(dynamic_source.price_endpoint(), DYNAMIC_PRICES_ENDPOINT);
        assert_eq!(static_source.base_url, "http://127.0.0.1:6969");
    }

    #[tokio::test]
    async fn test_mock_price_source() {
        let source = MockPriceSource::new();
        let table = source.fetch_prices().await.unwrap();

        assert!(!table.is_empty());
        assert_eq!(table.get("m4a1"), Some(38_000.0));
        assert_eq!(source.price_fetches(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure_switch() {
        let source = MockPriceSource::with_prices([("ammo", 10.0)]);
        source.set_failing(true);

        assert!(source.fetch_prices().await.is_err());
        assert!(source.fetch_banned_items().await.is_err());
        assert_eq!(source.price_fetches(), 1);
        assert_eq!(source.banned_fetches(), 1);
    }
}
