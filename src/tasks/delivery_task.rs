use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::DeliveryConfig;
use crate::models::notification::DeliveryStatus;
use crate::services::database::DatabaseService;
use crate::services::mailer::Mailer;
use crate::services::notifier::DeliveryJob;

/// Drains the delivery queue until every sender is dropped.
pub async fn run_delivery_worker(
    db: DatabaseService,
    mailer: Arc<dyn Mailer>,
    mut jobs: UnboundedReceiver<DeliveryJob>,
    policy: DeliveryConfig,
) {
    log::info!("Notification delivery worker started");

    while let Some(job) = jobs.recv().await {
        deliver(&db, mailer.as_ref(), &job, &policy).await;
    }

    log::info!("Notification delivery worker stopped");
}

/// Sends one email with bounded retries and records the final state on the
/// notification. Never fails: an undeliverable message ends as `Failed`.
pub async fn deliver(
    db: &DatabaseService,
    mailer: &dyn Mailer,
    job: &DeliveryJob,
    policy: &DeliveryConfig,
) -> DeliveryStatus {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    let (status, last_error) = loop {
        attempts += 1;
        match mailer.send(&job.email).await {
            Ok(()) => {
                log::info!("Delivered notification {} to {}", job.notification_id, job.email.to);
                break (DeliveryStatus::Sent, None);
            }
            Err(err) if err.is_retryable() && attempts < max_attempts => {
                let backoff = policy.backoff_for(attempts);
                log::warn!(
                    "Delivery attempt {}/{} for notification {} failed: {}; retrying in {:?}",
                    attempts,
                    max_attempts,
                    job.notification_id,
                    err,
                    backoff
                );
                tokio::time::sleep(backoff).await;
            }
            Err(err) => {
                log::warn!(
                    "Giving up on notification {} after {} attempt(s): {}",
                    job.notification_id,
                    attempts,
                    err
                );
                break (DeliveryStatus::Failed, Some(err.to_string()));
            }
        }
    };

    record_outcome(db, job, status, attempts, last_error).await;
    status
}

async fn record_outcome(
    db: &DatabaseService,
    job: &DeliveryJob,
    status: DeliveryStatus,
    attempts: u32,
    last_error: Option<String>,
) {
    let mut notification = match db.get_notification(&job.notification_id).await {
        Ok(Some(notification)) => notification,
        Ok(None) => {
            log::error!("Notification {} vanished before its delivery was recorded", job.notification_id);
            return;
        }
        Err(e) => {
            log::error!("Failed to load notification {}: {}", job.notification_id, e);
            return;
        }
    };

    notification.delivery_status = status;
    notification.delivery_attempts += attempts;
    notification.last_error = last_error;
    if status == DeliveryStatus::Sent {
        notification.delivered_at = Some(Utc::now());
    }

    if let Err(e) = db.update_notification(&notification).await {
        log::error!("Failed to record delivery state for notification {}: {}", job.notification_id, e);
    }
}
