use crate::api::types::{AssetQuote, Currency};
use crate::api::PriceSource;
use crate::error::PriceWatchError;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const CACHE_TTL: Duration = Duration::from_secs(10);

type Quotes = HashMap<String, AssetQuote>;

/// Short-lived cache of successful responses keyed by the request.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: HashMap<(String, Currency), (Instant, Quotes)>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, ids: &str, currency: Currency, now: Instant) -> Option<&Quotes> {
        self.entries
            .get(&(ids.to_string(), currency))
            .filter(|(stored, _)| now.saturating_duration_since(*stored) < self.ttl)
            .map(|(_, quotes)| quotes)
    }

    pub fn insert(&mut self, ids: &str, currency: Currency, now: Instant, quotes: Quotes) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (stored, _)| now.saturating_duration_since(*stored) < ttl);
        self.entries.insert((ids.to_string(), currency), (now, quotes));
    }
}

pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    cache: ResponseCache,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str) -> Result<Self, PriceWatchError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: ResponseCache::new(CACHE_TTL),
        })
    }

    async fn request(&self, ids: &str, currency: Currency) -> Result<Value, PriceWatchError> {
        let url = format!("{}/simple/price", self.base_url);
        debug!("GET {} ids={} vs={}", url, ids, currency.as_str());

        let response = self
            .client
            .get(&url)
            .query(&[
                ("ids", ids),
                ("vs_currencies", currency.as_str()),
                ("include_24hr_change", "true"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Price API responded with {}", status);
            return Err(PriceWatchError::StatusError(status));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str::<Value>(&text)?)
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch_prices(
        &mut self,
        asset_ids: &[String],
        currency: Currency,
    ) -> Result<Quotes, PriceWatchError> {
        if asset_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids = asset_ids.join(",");
        if let Some(cached) = self.cache.get(&ids, currency, Instant::now()) {
            debug!("Serving {} quotes from cache", cached.len());
            return Ok(cached.clone());
        }

        let body = self.request(&ids, currency).await?;
        let quotes = parse_simple_price(&body, currency);
        info!("Fetched {} of {} quotes ({})", quotes.len(), asset_ids.len(), currency);

        self.cache.insert(&ids, currency, Instant::now(), quotes.clone());
        Ok(quotes)
    }
}

/// Reads `{"<id>": {"<cur>": price, "<cur>_24h_change": pct}}`.
///
/// Ids with neither field are dropped; non-numeric fields count as absent.
pub fn parse_simple_price(body: &Value, currency: Currency) -> Quotes {
    let price_key = currency.as_str();
    let change_key = format!("{}_24h_change", price_key);

    let Some(object) = body.as_object() else {
        warn!("Unexpected price payload: {}", body);
        return HashMap::new();
    };

    object
        .iter()
        .filter_map(|(id, fields)| {
            let price = fields.get(price_key).and_then(Value::as_f64);
            let change_24h = fields.get(&change_key).and_then(Value::as_f64);
            if price.is_none() && change_24h.is_none() {
                return None;
            }
            Some((
                id.clone(),
                AssetQuote {
                    asset_id: id.clone(),
                    price,
                    change_24h,
                },
            ))
        })
        .collect()
}
