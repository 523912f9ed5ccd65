use crate::api::types::{AssetQuote, Currency};
use crate::api::PriceSource;
use crate::error::PriceWatchError;
use crate::notify::{Delivery, Notifier};
use crate::ui::core::alerts::{AlertDetector, AlertEvent, ThresholdTable};
use crate::ui::core::history::HistoryBuffer;
use chrono::{DateTime, Local};
use log::{debug, warn};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct TrackerState {
    pub history: HistoryBuffer,
    pub thresholds: ThresholdTable,
    pub detector: AlertDetector,
}

impl TrackerState {
    pub fn new(history_len: usize, thresholds: ThresholdTable) -> Self {
        Self {
            history: HistoryBuffer::new(history_len),
            thresholds,
            detector: AlertDetector::new(),
        }
    }
}

pub struct CycleInput<'a> {
    pub assets: &'a [String],
    pub currency: Currency,
    pub quotes: &'a HashMap<String, AssetQuote>,
    pub now: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub asset_id: String,
    pub price: Option<f64>,
    pub change_24h: Option<f64>,
    pub updated: String,
}

#[derive(Debug, Clone, Default)]
pub struct CycleOutput {
    pub rows: Vec<PriceRow>,
    pub alerts: Vec<AlertEvent>,
}

pub fn tick(state: &mut TrackerState, input: &CycleInput<'_>) -> CycleOutput {
    let updated = input.now.format("%H:%M:%S").to_string();
    let mut output = CycleOutput::default();

    for asset in input.assets {
        let quote = input.quotes.get(asset);
        let price = quote.and_then(|q| q.price);
        let change_24h = quote.and_then(|q| q.change_24h);

        state.history.append(asset, price);

        output.rows.push(PriceRow {
            asset_id: asset.clone(),
            price,
            change_24h: change_24h.map(round3),
            updated: updated.clone(),
        });

        let events = state.detector.check_price(
            asset,
            price,
            state.thresholds.get(asset),
            input.currency,
        );
        output.alerts.extend(events);
    }

    output
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub rows: Vec<PriceRow>,
    pub alerts: Vec<AlertEvent>,
    pub fetch_error: Option<String>,
    pub deliveries: Vec<Delivery>,
}

pub struct Tracker {
    pub state: TrackerState,
    pub assets: Vec<String>,
    pub currency: Currency,
    source: Box<dyn PriceSource>,
    notifier: Notifier,
}

impl Tracker {
    pub fn new(
        state: TrackerState,
        assets: Vec<String>,
        currency: Currency,
        source: Box<dyn PriceSource>,
        notifier: Notifier,
    ) -> Self {
        let mut tracker = Self {
            state,
            assets: Vec::new(),
            currency,
            source,
            notifier,
        };
        for asset in assets {
            tracker.add_asset(&asset);
        }
        tracker
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Tracks a new coin id. Returns false if it was already tracked.
    pub fn add_asset(&mut self, asset_id: &str) -> bool {
        let id = asset_id.trim().to_lowercase();
        if id.is_empty() || self.assets.contains(&id) {
            return false;
        }
        self.state.thresholds.ensure_assets(&[id.as_str()]);
        self.assets.push(id);
        true
    }

    pub async fn run_cycle(&mut self) -> CycleReport {
        let (quotes, fetch_error) = match self.source.fetch_prices(&self.assets, self.currency).await {
            Ok(quotes) => (quotes, None),
            Err(e) => {
                warn!("Failed to fetch prices: {}", e);
                (HashMap::new(), Some(e.to_string()))
            }
        };

        let now = Local::now();
        let output = tick(
            &mut self.state,
            &CycleInput {
                assets: &self.assets,
                currency: self.currency,
                quotes: &quotes,
                now,
            },
        );
        debug!("Cycle produced {} rows, {} alerts", output.rows.len(), output.alerts.len());

        let deliveries = self.notifier.dispatch(&output.alerts, now).await;

        CycleReport {
            rows: output.rows,
            alerts: output.alerts,
            fetch_error,
            deliveries,
        }
    }

    pub async fn send_test_email(&self) -> Result<(), PriceWatchError> {
        self.notifier.send_test_email().await
    }
}
