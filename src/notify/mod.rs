pub mod alert_log;
pub mod email;

use crate::error::PriceWatchError;
use crate::ui::core::alerts::AlertEvent;
use chrono::{DateTime, Local};
use alert_log::AlertLog;
use email::Mailer;
use log::{error, warn};

pub const TEST_EMAIL_SUBJECT: &str = "Crypto Tracker Test Email";
pub const TEST_EMAIL_BODY: &str = "This is a test email from your Crypto Price Tracker.";

#[derive(Debug)]
pub enum EmailOutcome {
    Sent,
    /// SMTP settings are incomplete, nothing attempted.
    Skipped,
    Failed(PriceWatchError),
}

/// What happened to one alert.
#[derive(Debug)]
pub struct Delivery {
    pub asset_id: String,
    pub logged: Result<(), PriceWatchError>,
    pub email: EmailOutcome,
}

/// Logs every alert and emails it when a mailer is configured.
pub struct Notifier {
    log: AlertLog,
    mailer: Option<Box<dyn Mailer>>,
}

impl Notifier {
    pub fn new(log: AlertLog, mailer: Option<Box<dyn Mailer>>) -> Self {
        Self { log, mailer }
    }

    pub fn alert_log(&self) -> &AlertLog {
        &self.log
    }

    pub fn can_email(&self) -> bool {
        self.mailer.is_some()
    }

    /// Handles each event on its own; a failure never stops the next one.
    pub async fn dispatch(&self, events: &[AlertEvent], at: DateTime<Local>) -> Vec<Delivery> {
        let mut deliveries = Vec::with_capacity(events.len());

        for event in events {
            warn!("ALERT ({}): {}", event.direction, event.message);

            let logged = self.log.append(&event.message, at);
            if let Err(e) = &logged {
                error!("Failed to write alert log {}: {}", self.log.path().display(), e);
            }

            let email = match &self.mailer {
                Some(mailer) => {
                    let subject = format!("Crypto Alert: {}", event.asset_id);
                    match mailer.send(&subject, &event.message).await {
                        Ok(()) => EmailOutcome::Sent,
                        Err(e) => {
                            error!("Email failed for {}: {}", event.asset_id, e);
                            EmailOutcome::Failed(e)
                        }
                    }
                }
                None => EmailOutcome::Skipped,
            };

            deliveries.push(Delivery {
                asset_id: event.asset_id.clone(),
                logged,
                email,
            });
        }

        deliveries
    }

    pub async fn send_test_email(&self) -> Result<(), PriceWatchError> {
        match &self.mailer {
            Some(mailer) => mailer.send(TEST_EMAIL_SUBJECT, TEST_EMAIL_BODY).await,
            None => Err(PriceWatchError::ConfigError(
                "Please fill in all email fields before testing".to_string(),
            )),
        }
    }
}
