use std::collections::{HashMap, VecDeque};

pub const DEFAULT_HISTORY_LEN: usize = 300;

/// Most recent prices per asset, oldest first. Only used for trend charts.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: HashMap<String, VecDeque<f64>>,
    max_len: usize,
}

impl HistoryBuffer {
    pub fn new(max_len: usize) -> Self {
        Self {
            samples: HashMap::new(),
            max_len: max_len.max(1),
        }
    }

    pub fn append(&mut self, asset_id: &str, price: Option<f64>) {
        let Some(price) = price else {
            return;
        };

        let capacity = self.max_len.min(DEFAULT_HISTORY_LEN);
        let entries = self
            .samples
            .entry(asset_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(capacity));

        entries.push_back(price);
        while entries.len() > self.max_len {
            entries.pop_front();
        }
    }

    pub fn get(&self, asset_id: &str) -> Vec<f64> {
        self.window(asset_id)
            .map(|w| w.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Borrowing access for rendering.
    pub fn window(&self, asset_id: &str) -> Option<&VecDeque<f64>> {
        self.samples.get(asset_id)
    }

    pub fn len(&self, asset_id: &str) -> usize {
        self.samples.get(asset_id).map_or(0, |w| w.len())
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}
