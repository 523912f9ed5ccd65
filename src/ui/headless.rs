use crate::notify::EmailOutcome;
use crate::tracker::{CycleReport, Tracker};
use log::{info, warn};
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

/// Runs cycles on a timer and logs them until Ctrl-C.
pub async fn run(tracker: &mut Tracker, interval: Duration) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // single listener, also raced against an in-flight cycle
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping");
                break;
            }
            _ = ticker.tick() => {
                tokio::select! {
                    report = tracker.run_cycle() => {
                        log_report(&report, tracker.notifier().can_email());
                    }
                    _ = &mut ctrl_c => {
                        info!("Interrupted during a cycle, stopping");
                        break;
                    }
                }
            }
        }
    }
}

fn log_report(report: &CycleReport, can_email: bool) {
    for row in &report.rows {
        match row.price {
            Some(price) => info!(
                "{:<14} {:>16} {:>10}",
                row.asset_id,
                price,
                row.change_24h
                    .map(|c| format!("{:+.3}%", c))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            None => warn!("{:<14} no price this cycle", row.asset_id),
        }
    }

    if !report.alerts.is_empty() && !can_email {
        info!("Email not sent (missing SMTP configuration).");
    }
    for delivery in &report.deliveries {
        if matches!(delivery.email, EmailOutcome::Sent) {
            info!("Email sent for {}", delivery.asset_id);
        }
    }
}
