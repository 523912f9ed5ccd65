pub mod coingecko;
pub mod types;

use crate::error::PriceWatchError;
use async_trait::async_trait;
use std::collections::HashMap;
use types::{AssetQuote, Currency};

/// Anything that can quote a set of assets in one currency.
///
/// Assets the provider could not resolve are simply missing from the map.
#[async_trait]
pub trait PriceSource: Send {
    async fn fetch_prices(
        &mut self,
        asset_ids: &[String],
        currency: Currency,
    ) -> Result<HashMap<String, AssetQuote>, PriceWatchError>;
}
