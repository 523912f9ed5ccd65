use crate::api::types::Currency;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Below,
    Above,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Below => f.write_str("below"),
            Direction::Above => f.write_str("above"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub asset_id: String,
    pub message: String,
    pub direction: Direction,
}

/// Optional lower and upper bound for one asset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Threshold {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Threshold {
    pub fn new(lower: Option<f64>, upper: Option<f64>) -> Self {
        Self {
            lower: lower.filter(|v| v.is_finite()),
            upper: upper.filter(|v| v.is_finite()),
        }
    }

    /// Both bounds set with `lower >= upper`. Allowed, only flagged in the UI.
    pub fn is_inverted(&self) -> bool {
        matches!((self.lower, self.upper), (Some(l), Some(u)) if l >= u)
    }
}

/// Parses `LOWER:UPPER` where either side may be empty.
impl FromStr for Threshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lower, upper) = s
            .split_once(':')
            .ok_or_else(|| format!("expected LOWER:UPPER, got '{}'", s))?;
        Ok(Threshold::new(parse_bound(lower)?, parse_bound(upper)?))
    }
}

/// Empty input means "no bound". Non-finite numbers are rejected.
pub fn parse_bound(raw: &str) -> Result<Option<f64>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(format!("'{}' is not a valid price", raw)),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeState {
    pub below_active: bool,
    pub above_active: bool,
}

/// Operator-editable bounds, one row per asset.
#[derive(Debug, Clone, Default)]
pub struct ThresholdTable {
    rows: BTreeMap<String, Threshold>,
}

impl ThresholdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty row for every asset that does not have one yet.
    pub fn ensure_assets<S: AsRef<str>>(&mut self, assets: &[S]) {
        for asset in assets {
            self.rows.entry(asset.as_ref().to_string()).or_default();
        }
    }

    pub fn get(&self, asset_id: &str) -> Option<&Threshold> {
        self.rows.get(asset_id)
    }

    pub fn set(&mut self, asset_id: &str, threshold: Threshold) {
        self.rows
            .insert(asset_id.to_string(), Threshold::new(threshold.lower, threshold.upper));
    }

    pub fn set_lower(&mut self, asset_id: &str, lower: Option<f64>) {
        let row = self.rows.entry(asset_id.to_string()).or_default();
        *row = Threshold::new(lower, row.upper);
    }

    pub fn set_upper(&mut self, asset_id: &str, upper: Option<f64>) {
        let row = self.rows.entry(asset_id.to_string()).or_default();
        *row = Threshold::new(row.lower, upper);
    }
}

// absent price or threshold: keep `previous`, a feed gap never re-arms a latch
pub fn evaluate(
    asset_id: &str,
    price: Option<f64>,
    threshold: Option<&Threshold>,
    previous: EdgeState,
    currency: Currency,
) -> (Vec<AlertEvent>, EdgeState) {
    let (price, threshold) = match (price, threshold) {
        (Some(p), Some(t)) => (p, t),
        _ => return (Vec::new(), previous),
    };

    let mut events = Vec::new();
    let mut next = previous;

    let crossed_below = threshold.lower.map_or(false, |lower| price <= lower);
    let crossed_above = threshold.upper.map_or(false, |upper| price >= upper);

    if crossed_below && !previous.below_active {
        if let Some(lower) = threshold.lower {
            events.push(AlertEvent {
                asset_id: asset_id.to_string(),
                message: format!(
                    "{} at {} {} is <= lower threshold {}",
                    asset_id, price, currency.code(), lower
                ),
                direction: Direction::Below,
            });
        }
        next.below_active = true;
    } else if !crossed_below {
        next.below_active = false;
    }

    if crossed_above && !previous.above_active {
        if let Some(upper) = threshold.upper {
            events.push(AlertEvent {
                asset_id: asset_id.to_string(),
                message: format!(
                    "{} at {} {} is >= upper threshold {}",
                    asset_id, price, currency.code(), upper
                ),
                direction: Direction::Above,
            });
        }
        next.above_active = true;
    } else if !crossed_above {
        next.above_active = false;
    }

    (events, next)
}

#[derive(Debug, Clone, Default)]
pub struct AlertDetector {
    edges: HashMap<String, EdgeState>,
}

impl AlertDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_price(
        &mut self,
        asset_id: &str,
        price: Option<f64>,
        threshold: Option<&Threshold>,
        currency: Currency,
    ) -> Vec<AlertEvent> {
        let previous = self.edge_state(asset_id);
        let (events, next) = evaluate(asset_id, price, threshold, previous, currency);
        if next != previous {
            self.edges.insert(asset_id.to_string(), next);
        }
        events
    }

    pub fn edge_state(&self, asset_id: &str) -> EdgeState {
        self.edges.get(asset_id).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(threshold: Threshold, prices: &[f64]) -> Vec<(usize, Direction)> {
        let mut detector = AlertDetector::new();
        let mut fired = Vec::new();
        for (i, price) in prices.iter().enumerate() {
            for event in detector.check_price("bitcoin", Some(*price), Some(&threshold), Currency::Usd) {
                fired.push((i, event.direction));
            }
        }
        fired
    }

    #[test]
    fn no_bounds_never_fires() {
        let fired = run(Threshold::default(), &[0.0, -5.0, 1e9, 42.0, f64::MAX]);
        assert!(fired.is_empty());
    }

    #[test]
    fn lower_bound_fires_on_each_new_crossing() {
        let fired = run(Threshold::new(Some(100.0), None), &[105.0, 100.0, 95.0, 101.0, 99.0]);
        assert_eq!(fired, vec![(1, Direction::Below), (4, Direction::Below)]);
    }

    #[test]
    fn staying_below_fires_once() {
        let fired = run(Threshold::new(Some(10.0), None), &[9.0, 8.0, 7.0, 10.0, 3.0]);
        assert_eq!(fired, vec![(0, Direction::Below)]);
    }

    #[test]
    fn upper_bound_is_symmetric() {
        let fired = run(Threshold::new(None, Some(200.0)), &[150.0, 200.0, 250.0, 199.0, 201.0]);
        assert_eq!(fired, vec![(1, Direction::Above), (4, Direction::Above)]);
    }

    #[test]
    fn inverted_bounds_fire_both_directions() {
        let threshold = Threshold::new(Some(50.0), Some(40.0));
        assert!(threshold.is_inverted());

        let (events, state) = evaluate("eth", Some(45.0), Some(&threshold), EdgeState::default(), Currency::Usd);
        let directions: Vec<Direction> = events.iter().map(|e| e.direction).collect();
        assert_eq!(directions, vec![Direction::Below, Direction::Above]);
        assert_eq!(state, EdgeState { below_active: true, above_active: true });
    }

    #[test]
    fn absent_price_keeps_latch() {
        let threshold = Threshold::new(Some(100.0), None);
        let latched = EdgeState { below_active: true, above_active: false };

        let (events, state) = evaluate("bitcoin", None, Some(&threshold), latched, Currency::Usd);
        assert!(events.is_empty());
        assert_eq!(state, latched);

        // still below after the gap: no re-trigger
        let (events, _) = evaluate("bitcoin", Some(90.0), Some(&threshold), state, Currency::Usd);
        assert!(events.is_empty());
    }

    #[test]
    fn missing_threshold_keeps_state() {
        let latched = EdgeState { below_active: false, above_active: true };
        let (events, state) = evaluate("doge", Some(1.0), None, latched, Currency::Eur);
        assert!(events.is_empty());
        assert_eq!(state, latched);
    }

    #[test]
    fn message_names_asset_price_currency_and_bound() {
        let threshold = Threshold::new(Some(100.0), Some(500.0));
        let (events, _) = evaluate("bitcoin", Some(99.5), Some(&threshold), EdgeState::default(), Currency::Inr);
        assert_eq!(events[0].message, "bitcoin at 99.5 INR is <= lower threshold 100");

        let (events, _) = evaluate("bitcoin", Some(500.0), Some(&threshold), EdgeState::default(), Currency::Usd);
        assert_eq!(events[0].message, "bitcoin at 500 USD is >= upper threshold 500");
    }

    #[test]
    fn non_finite_bounds_are_treated_as_absent() {
        let threshold = Threshold::new(Some(f64::NAN), Some(f64::INFINITY));
        assert_eq!(threshold, Threshold::default());
    }

    #[test]
    fn threshold_parses_either_side_empty() {
        assert_eq!("100:".parse::<Threshold>().unwrap(), Threshold::new(Some(100.0), None));
        assert_eq!(":2.5".parse::<Threshold>().unwrap(), Threshold::new(None, Some(2.5)));
        assert_eq!(":".parse::<Threshold>().unwrap(), Threshold::default());
        assert!("100".parse::<Threshold>().is_err());
        assert!("abc:1".parse::<Threshold>().is_err());
    }

    #[test]
    fn table_keeps_existing_rows() {
        let mut table = ThresholdTable::new();
        table.set_lower("bitcoin", Some(10.0));
        table.ensure_assets(&["bitcoin", "ethereum"]);

        assert_eq!(table.get("bitcoin").unwrap().lower, Some(10.0));
        assert_eq!(table.get("ethereum"), Some(&Threshold::default()));

        table.set_upper("bitcoin", Some(20.0));
        table.set_lower("bitcoin", None);
        assert_eq!(table.get("bitcoin"), Some(&Threshold::new(None, Some(20.0))));
    }
}
