use crate::api::coingecko::rest::COINGECKO_API_URL;
use crate::api::types::Currency;
use crate::notify::alert_log::DEFAULT_ALERT_LOG;
use crate::notify::email::{SmtpSettings, DEFAULT_SMTP_PORT, DEFAULT_SMTP_SERVER};
use crate::ui::core::alerts::{Threshold, ThresholdTable};
use crate::ui::core::history::DEFAULT_HISTORY_LEN;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_COINS: [&str; 3] = ["bitcoin", "ethereum", "dogecoin"];

/// Ids offered when adding a coin from the dashboard.
pub const SUGGESTED_COINS: [&str; 7] = [
    "bitcoin",
    "ethereum",
    "tether",
    "binancecoin",
    "ripple",
    "cardano",
    "dogecoin",
];

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Live crypto prices with threshold alerts", long_about = None)]
pub struct Cli {
    /// CoinGecko coin ids to track (comma separated)
    #[arg(long, env = "PRICEWATCH_COINS", value_delimiter = ',', default_values_t = DEFAULT_COINS.map(String::from).to_vec())]
    pub coins: Vec<String>,

    /// Quote currency
    #[arg(long, env = "PRICEWATCH_CURRENCY", value_enum, default_value_t = Currency::Usd)]
    pub currency: Currency,

    /// Seconds between refreshes
    #[arg(long, env = "PRICEWATCH_INTERVAL", default_value_t = 20, value_parser = clap::value_parser!(u64).range(5..=300))]
    pub interval: u64,

    /// Alert bounds as COIN=LOWER:UPPER, either side may be empty (repeatable)
    #[arg(long = "threshold", value_parser = parse_threshold_arg)]
    pub thresholds: Vec<(String, Threshold)>,

    /// File alerts are appended to
    #[arg(long, env = "PRICEWATCH_ALERT_LOG", default_value = DEFAULT_ALERT_LOG)]
    pub alert_log: PathBuf,

    /// Prices kept per coin for trend charts
    #[arg(long, default_value_t = DEFAULT_HISTORY_LEN, value_parser = parse_history_len)]
    pub history_len: usize,

    /// Price API base url
    #[arg(long, env = "COINGECKO_API_URL", default_value = COINGECKO_API_URL)]
    pub api_url: String,

    /// Run without the dashboard, logging each cycle
    #[arg(long)]
    pub headless: bool,

    /// Send a test email with the SMTP settings and exit
    #[arg(long)]
    pub test_email: bool,

    /// Diagnostics log file used while the dashboard owns the terminal
    #[arg(long, default_value = "pricewatch.log")]
    pub diagnostics_log: PathBuf,

    #[arg(long, env = "SMTP_SERVER", default_value = DEFAULT_SMTP_SERVER)]
    pub smtp_server: String,

    #[arg(long, env = "SMTP_PORT", default_value_t = DEFAULT_SMTP_PORT)]
    pub smtp_port: u16,

    #[arg(long, env = "EMAIL_SENDER", default_value = "")]
    pub email_sender: String,

    #[arg(long, env = "EMAIL_PASSWORD", default_value = "", hide_env_values = true)]
    pub email_password: String,

    #[arg(long, env = "EMAIL_RECEIVER", default_value = "")]
    pub email_receiver: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub coins: Vec<String>,
    pub currency: Currency,
    pub interval: Duration,
    pub thresholds: ThresholdTable,
    pub alert_log: PathBuf,
    pub history_len: usize,
    pub api_url: String,
    pub headless: bool,
    pub test_email: bool,
    pub diagnostics_log: PathBuf,
    pub smtp: SmtpSettings,
}

impl Config {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from(Cli::parse())
    }
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        let mut coins: Vec<String> = Vec::new();
        for coin in &cli.coins {
            let id = coin.trim().to_lowercase();
            if !id.is_empty() && !coins.contains(&id) {
                coins.push(id);
            }
        }

        let mut thresholds = ThresholdTable::new();
        for (coin, threshold) in &cli.thresholds {
            thresholds.set(coin, *threshold);
        }
        thresholds.ensure_assets(coins.as_slice());

        Self {
            coins,
            currency: cli.currency,
            interval: Duration::from_secs(cli.interval),
            thresholds,
            alert_log: cli.alert_log,
            history_len: cli.history_len,
            api_url: cli.api_url,
            headless: cli.headless,
            test_email: cli.test_email,
            diagnostics_log: cli.diagnostics_log,
            smtp: SmtpSettings {
                server: cli.smtp_server,
                port: cli.smtp_port,
                sender: cli.email_sender,
                password: cli.email_password,
                receiver: cli.email_receiver,
            },
        }
    }
}

fn parse_threshold_arg(raw: &str) -> Result<(String, Threshold), String> {
    let (coin, bounds) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected COIN=LOWER:UPPER, got '{}'", raw))?;
    let coin = coin.trim().to_lowercase();
    if coin.is_empty() {
        return Err("coin id is empty".to_string());
    }
    Ok((coin, bounds.parse()?))
}

fn parse_history_len(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("history length must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Result<Config, clap::Error> {
        let mut argv = vec!["pricewatch"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).map(Config::from)
    }

    #[test]
    fn thresholds_and_coins() {
        let config = parse(&[
            "--coins",
            "Bitcoin,ethereum,bitcoin",
            "--threshold",
            "bitcoin=100:",
            "--threshold",
            "solana=:5.5",
            "--currency",
            "inr",
        ])
        .unwrap();

        assert_eq!(config.coins, vec!["bitcoin", "ethereum"]);
        assert_eq!(config.currency, Currency::Inr);
        assert_eq!(config.thresholds.get("bitcoin"), Some(&Threshold::new(Some(100.0), None)));
        assert_eq!(config.thresholds.get("ethereum"), Some(&Threshold::default()));
        assert_eq!(config.thresholds.get("solana"), Some(&Threshold::new(None, Some(5.5))));
    }

    #[test]
    fn interval_is_bounded() {
        assert!(parse(&["--interval", "4"]).is_err());
        assert!(parse(&["--interval", "301"]).is_err());
        assert_eq!(parse(&["--interval", "60"]).unwrap().interval, Duration::from_secs(60));
    }

    #[test]
    fn bad_threshold_is_rejected() {
        assert!(parse(&["--threshold", "bitcoin"]).is_err());
        assert!(parse(&["--threshold", "=1:2"]).is_err());
        assert!(parse(&["--threshold", "bitcoin=x:2"]).is_err());
    }

    #[test]
    fn history_len_must_be_positive() {
        assert!(parse(&["--history-len", "0"]).is_err());
        assert_eq!(parse(&["--history-len", "12"]).unwrap().history_len, 12);
    }

    #[test]
    fn smtp_flags_fill_settings() {
        let config = parse(&[
            "--smtp-server",
            "mail.example.com",
            "--email-sender",
            "a@example.com",
            "--email-password",
            "pw",
            "--email-receiver",
            "b@example.com",
        ])
        .unwrap();

        assert_eq!(config.smtp.server, "mail.example.com");
        assert_eq!(config.smtp.sender, "a@example.com");
        assert!(config.smtp.is_complete());
    }
}
