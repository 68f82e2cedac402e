use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::activity::{Activity, Position};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    /// Retries exhausted or a permanent failure; the record stays as the dead letter.
    Failed,
}

/// Durable in-app message. Nothing deduplicates these: re-notifying a
/// position creates fresh records for the same volunteers.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub volunteer_id: Uuid,
    pub activity_id: Uuid,
    pub position_id: Option<Uuid>,
    pub message: String,
    pub delivery_status: DeliveryStatus,
    pub delivery_attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(volunteer_id: Uuid, activity_id: Uuid, position_id: Option<Uuid>, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            volunteer_id,
            activity_id,
            position_id,
            message,
            delivery_status: DeliveryStatus::Pending,
            delivery_attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            delivered_at: None,
        }
    }
}

pub fn new_position_message(activity: &Activity, position: &Position) -> String {
    let required = if position.required_skills.is_empty() {
        "None".to_string()
    } else {
        position.required_skills.to_string()
    };
    format!(
        "New position open: '{}' for '{}'. Required skills: {}. Registration closes: {}.",
        position.title,
        activity.name,
        required,
        activity.reg_close_label()
    )
}

pub fn reminder_message(activity: &Activity, position: &Position) -> String {
    format!(
        "Reminder: Position '{}' is still open for '{}'. Registration closes: {}.",
        position.title,
        activity.name,
        activity.reg_close_label()
    )
}

pub fn email_subject(activity: &Activity, position: &Position) -> String {
    format!("New Volunteer Position: {} - {}", position.title, activity.name)
}

pub fn email_body(volunteer_name: &str, activity: &Activity, position: &Position) -> String {
    format!(
        "<h2>New Volunteer Opportunity!</h2>\
         <p>Hi {volunteer_name},</p>\
         <p>A new position matching your skills is open:</p>\
         <ul>\
         <li><strong>Activity:</strong> {}</li>\
         <li><strong>Position:</strong> {}</li>\
         <li><strong>Registration closes:</strong> {}</li>\
         </ul>\
         <p>Log in to your dashboard to apply.</p>",
        activity.name,
        position.title,
        activity.reg_close_label()
    )
}
