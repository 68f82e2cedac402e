use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::activity::Activity;
use crate::models::participation::JoinedActivity;
use crate::models::volunteer::Volunteer;
use crate::services::database::DatabaseService;
use crate::services::matching::{participation_eligibility, Eligibility};

#[derive(Debug, Serialize)]
pub struct AvailableActivity {
    pub activity: Activity,
    pub eligible: bool,
    pub missing: Vec<String>,
    pub registration_open: bool,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub volunteer: Volunteer,
    pub available: Vec<AvailableActivity>,
    pub joined: Vec<JoinedActivity>,
}

/// Whether the volunteer could join the activity as a whole, and what they
/// would have to add.
pub fn eligibility(volunteer: &Volunteer, activity: &Activity, min_skill_count: usize) -> Eligibility {
    participation_eligibility(&volunteer.skills, &activity.required_skills, min_skill_count)
}

pub async fn activity_eligibility(
    db: &DatabaseService,
    volunteer_id: &Uuid,
    activity_id: &Uuid,
    min_skill_count: usize,
) -> AppResult<Eligibility> {
    let volunteer = db
        .get_volunteer(volunteer_id)
        .await?
        .ok_or(AppError::NotFound("Volunteer"))?;
    let activity = db
        .get_activity(activity_id)
        .await?
        .ok_or(AppError::NotFound("Activity"))?;
    Ok(eligibility(&volunteer, &activity, min_skill_count))
}

pub async fn dashboard(
    db: &DatabaseService,
    volunteer_id: &Uuid,
    min_skill_count: usize,
    now: DateTime<Utc>,
) -> AppResult<Dashboard> {
    let volunteer = db
        .get_volunteer(volunteer_id)
        .await?
        .ok_or(AppError::NotFound("Volunteer"))?;

    let mut participations: HashMap<Uuid, _> = db
        .participations_for_volunteer(volunteer_id)
        .await?
        .into_iter()
        .map(|p| (p.activity_id, p))
        .collect();

    let mut available = Vec::new();
    let mut joined = Vec::new();
    for activity in db.list_activities().await? {
        match participations.remove(&activity.id) {
            Some(participation) => joined.push(JoinedActivity { activity, participation }),
            None => {
                let result = eligibility(&volunteer, &activity, min_skill_count);
                available.push(AvailableActivity {
                    registration_open: activity.registration_open(now),
                    eligible: result.eligible,
                    missing: result.missing,
                    activity,
                });
            }
        }
    }

    // Joined activities read latest start first.
    joined.sort_by(|a, b| b.activity.start_date.cmp(&a.activity.start_date));

    Ok(Dashboard {
        volunteer,
        available,
        joined,
    })
}
