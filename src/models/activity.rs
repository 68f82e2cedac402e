use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::models::skills::{normalize, SkillSet};

#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub activity_type: String,
    pub place: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reg_open: Option<DateTime<Utc>>,
    pub reg_close: Option<DateTime<Utc>>,
    /// Activity-wide requirement checked on the dashboard and at join time.
    pub required_skills: SkillSet,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub id: Uuid,
    pub activity_id: Uuid,
    /// Display order within the activity.
    pub ordinal: u32,
    pub title: String,
    pub required_skills: SkillSet,
    pub slots: u32,
    pub filled: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateActivityRequest {
    pub org_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Activity name is required"))]
    pub name: String,

    #[validate(length(min = 1, max = 100, message = "Activity type is required"))]
    pub activity_type: String,

    #[validate(length(min = 1, max = 200, message = "Place is required"))]
    pub place: String,

    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reg_open: Option<DateTime<Utc>>,
    pub reg_close: Option<DateTime<Utc>>,
    pub required_skills: Option<String>,

    #[validate]
    #[serde(default)]
    pub positions: Vec<CreatePositionRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePositionRequest {
    #[validate(length(max = 200, message = "Position title is too long"))]
    pub title: String,
    pub required_skills: Option<String>,
    pub slots: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ActivitySummary {
    pub activity: Activity,
    pub position_count: usize,
    pub volunteer_count: usize,
}

impl CreateActivityRequest {
    /// Date ordering rules the derive can't express.
    pub fn check_windows(&self) -> Result<(), String> {
        if self.end_date < self.start_date {
            return Err("End date must not be before the start date".to_string());
        }
        if let (Some(open), Some(close)) = (self.reg_open, self.reg_close) {
            if close < open {
                return Err("Registration must close after it opens".to_string());
            }
        }
        Ok(())
    }
}

impl Activity {
    pub fn new(request: &CreateActivityRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            org_id: request.org_id,
            name: request.name.trim().to_string(),
            activity_type: request.activity_type.trim().to_string(),
            place: request.place.trim().to_string(),
            description: request.description.clone().unwrap_or_default(),
            start_date: request.start_date,
            end_date: request.end_date,
            reg_open: request.reg_open,
            reg_close: request.reg_close,
            required_skills: normalize(request.required_skills.as_deref().unwrap_or_default()),
            created_at: Utc::now(),
        }
    }

    /// Missing bounds are treated as unbounded.
    pub fn registration_open(&self, now: DateTime<Utc>) -> bool {
        self.reg_open.map_or(true, |open| now >= open) && self.reg_close.map_or(true, |close| now <= close)
    }

    pub fn reg_close_label(&self) -> String {
        self.reg_close
            .map(|close| close.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "Open".to_string())
    }
}

impl Position {
    /// Builds the positions of a new activity. Blank titles are skipped and
    /// a missing or zero slot count becomes 1.
    pub fn from_requests(activity_id: Uuid, requests: &[CreatePositionRequest]) -> Vec<Self> {
        let now = Utc::now();
        requests
            .iter()
            .filter(|request| !request.title.trim().is_empty())
            .enumerate()
            .map(|(ordinal, request)| Self {
                id: Uuid::new_v4(),
                activity_id,
                ordinal: ordinal as u32,
                title: request.title.trim().to_string(),
                required_skills: normalize(request.required_skills.as_deref().unwrap_or_default()),
                slots: request.slots.filter(|slots| *slots > 0).unwrap_or(1),
                filled: 0,
                created_at: now,
            })
            .collect()
    }

    pub fn has_open_slot(&self) -> bool {
        self.filled < self.slots
    }
}
