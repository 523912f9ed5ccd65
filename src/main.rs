mod api;
mod config;
mod error;
mod notify;
mod tracker;
mod ui;

use api::coingecko::CoinGeckoClient;
use config::Config;
use env_logger::{Builder, Target};
use log::{info, LevelFilter};
use notify::alert_log::AlertLog;
use notify::email::{Mailer, SmtpMailer};
use notify::Notifier;
use std::error::Error;
use std::fs::OpenOptions;
use std::io::Write;
use tracker::{Tracker, TrackerState};
use ui::dashboard::Dashboard;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = Config::load();

    // The dashboard owns the terminal, so its diagnostics go to a file.
    let target = if config.headless || config.test_email {
        Target::Stderr
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.diagnostics_log)?;
        Target::Pipe(Box::new(file))
    };

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("pricewatch", LevelFilter::Debug)
        .format(|buf, record| {
            let ts = chrono::Local::now().format("%H:%M:%S%.3f");
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(target)
        .init();

    info!("Starting pricewatch for {:?} in {}", config.coins, config.currency);
    log::debug!("SMTP settings: {:?}", config.smtp);

    let mailer: Option<Box<dyn Mailer>> = if config.smtp.is_complete() {
        Some(Box::new(SmtpMailer::new(config.smtp.clone())?))
    } else {
        info!("Email alerts disabled (missing SMTP configuration)");
        None
    };
    let notifier = Notifier::new(AlertLog::new(&config.alert_log), mailer);

    if config.test_email {
        notifier.send_test_email().await?;
        info!("Test email sent!");
        return Ok(());
    }

    let source = CoinGeckoClient::new(&config.api_url)?;
    let mut tracker = Tracker::new(
        TrackerState::new(config.history_len, config.thresholds.clone()),
        config.coins.clone(),
        config.currency,
        Box::new(source),
        notifier,
    );

    if config.headless {
        ui::headless::run(&mut tracker, config.interval).await;
    } else {
        let mut dashboard = Dashboard::new(config.interval);
        dashboard.run(&mut tracker).await?;
    }

    info!("Shutdown complete");
    Ok(())
}
