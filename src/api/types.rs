use clap::ValueEnum;
use std::fmt;

/// Quote currencies the price API is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Currency {
    Usd,
    Inr,
    Eur,
}

impl Currency {
    /// Lower-case code as the API expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "usd",
            Currency::Inr => "inr",
            Currency::Eur => "eur",
        }
    }

    /// Upper-case code used in alert messages and axis labels.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Inr => "INR",
            Currency::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetQuote {
    pub asset_id: String,
    pub price: Option<f64>,
    pub change_24h: Option<f64>,
}
