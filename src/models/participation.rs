use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::models::activity::Activity;
use crate::models::volunteer::Volunteer;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    Joined,
    Completed,
    Withdrawn,
}

/// Links one volunteer to one activity, optionally to one of its positions.
/// At most one exists per (volunteer, activity).
#[derive(Debug, Clone, Serialize)]
pub struct Participation {
    pub id: Uuid,
    pub volunteer_id: Uuid,
    pub activity_id: Uuid,
    pub position_id: Option<Uuid>,
    pub attendance: bool,
    pub performance_rating: Option<u8>,
    pub status: ParticipationStatus,
    pub joined_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinRequest {
    pub position_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateParticipationRequest {
    pub attendance: bool,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<u8>,

    pub status: Option<ParticipationStatus>,
}

/// Result of a join attempt that reached a decision.
#[derive(Debug)]
pub enum JoinOutcome {
    Joined(Participation),
    AlreadyJoined,
    Rejected(String),
}

#[derive(Debug, Serialize)]
pub struct RosterEntry {
    pub participation: Participation,
    pub volunteer: Volunteer,
}

#[derive(Debug, Serialize)]
pub struct JoinedActivity {
    pub activity: Activity,
    pub participation: Participation,
}

impl Participation {
    pub fn new(volunteer_id: Uuid, activity_id: Uuid, position_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            volunteer_id,
            activity_id,
            position_id,
            attendance: false,
            performance_rating: None,
            status: ParticipationStatus::Joined,
            joined_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, request: UpdateParticipationRequest) {
        self.attendance = request.attendance;
        self.performance_rating = request.rating;
        if let Some(status) = request.status {
            self.status = status;
        }
        self.updated_at = Utc::now();
    }
}
