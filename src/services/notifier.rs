use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::activity::{Activity, Position};
use crate::models::notification::{email_body, email_subject, reminder_message, Notification};
use crate::models::volunteer::Volunteer;
use crate::services::database::DatabaseService;
use crate::services::mailer::OutboundEmail;
use crate::services::matching::rank_candidates;

/// Email owed for a persisted notification.
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub notification_id: Uuid,
    pub email: OutboundEmail,
}

impl DeliveryJob {
    pub fn new(notification: &Notification, volunteer: &Volunteer, activity: &Activity, position: &Position) -> Self {
        Self {
            notification_id: notification.id,
            email: OutboundEmail {
                to: volunteer.email.clone(),
                subject: email_subject(activity, position),
                html: email_body(&volunteer.display_name(), activity, position),
            },
        }
    }
}

/// Persists notifications and hands their emails to the delivery worker.
///
/// Persisting is synchronous and authoritative; delivery happens later
/// and its failures never reach the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
    db: DatabaseService,
    outbox: UnboundedSender<DeliveryJob>,
    min_skill_count: usize,
}

impl NotificationDispatcher {
    pub fn new(db: DatabaseService, outbox: UnboundedSender<DeliveryJob>, min_skill_count: usize) -> Self {
        Self {
            db,
            outbox,
            min_skill_count,
        }
    }

    /// Stores one notification then queues its email. Returns the record id.
    pub async fn notify(
        &self,
        volunteer: &Volunteer,
        activity: &Activity,
        position: &Position,
        message: String,
    ) -> AppResult<Uuid> {
        let notification = Notification::new(volunteer.id, activity.id, Some(position.id), message);
        let stored = self.db.create_notification(&notification).await?;
        self.enqueue(DeliveryJob::new(&stored, volunteer, activity, position));
        Ok(stored.id)
    }

    /// Queues an email for an already committed notification.
    pub fn enqueue(&self, job: DeliveryJob) {
        let notification_id = job.notification_id;
        if let Err(err) = self.outbox.send(job) {
            log::warn!(
                "Delivery queue closed, notification {} stays pending: {}",
                notification_id,
                err
            );
        }
    }

    /// Re-queues every notification still `pending`, e.g. after a restart
    /// dropped the in-memory queue. Records whose volunteer, activity or
    /// position is gone are left as they are.
    pub async fn requeue_pending(&self) -> AppResult<usize> {
        let mut requeued = 0;
        for notification in self.db.pending_notifications().await? {
            let volunteer = self.db.get_volunteer(&notification.volunteer_id).await?;
            let activity = self.db.get_activity(&notification.activity_id).await?;
            let position = match notification.position_id {
                Some(position_id) => self.db.get_position(&position_id).await?,
                None => None,
            };

            match (volunteer, activity, position) {
                (Some(volunteer), Some(activity), Some(position)) => {
                    self.enqueue(DeliveryJob::new(&notification, &volunteer, &activity, &position));
                    requeued += 1;
                }
                _ => log::warn!(
                    "Pending notification {} has no deliverable target, leaving it pending",
                    notification.id
                ),
            }
        }

        if requeued > 0 {
            log::info!("Re-queued {} pending notification(s)", requeued);
        }
        Ok(requeued)
    }

    /// Manual re-trigger: notifies every skilled volunteer eligible for the
    /// position, including those who already joined the activity. Earlier
    /// notifications are not consulted, so repeated calls produce repeated
    /// records.
    pub async fn notify_position(&self, position_id: &Uuid) -> AppResult<usize> {
        let position = self.db
            .get_position(position_id)
            .await?
            .ok_or(AppError::NotFound("Position"))?;
        let activity = self.db
            .get_activity(&position.activity_id)
            .await?
            .ok_or(AppError::NotFound("Activity"))?;

        let volunteers = self.db.list_skilled_volunteers().await?;
        let candidates = rank_candidates(&position.required_skills, volunteers, self.min_skill_count);

        let message = reminder_message(&activity, &position);
        for candidate in &candidates {
            self.notify(&candidate.volunteer, &activity, &position, message.clone()).await?;
        }

        log::info!(
            "Re-notified {} volunteer(s) for position '{}' ({})",
            candidates.len(),
            position.title,
            position.id
        );
        Ok(candidates.len())
    }
}
