use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::skills::normalize;
use crate::models::volunteer::{RegisterVolunteerRequest, Volunteer};
use crate::services::database::{DatabaseService, InsertOutcome};

pub async fn register_volunteer(db: &DatabaseService, request: RegisterVolunteerRequest) -> AppResult<Volunteer> {
    request.validate()?;

    let volunteer = Volunteer::new(request);
    match db.create_volunteer(&volunteer).await? {
        InsertOutcome::Inserted(volunteer) => {
            log::info!("Registered volunteer {} with {} skill(s)", volunteer.id, volunteer.skills.len());
            Ok(volunteer)
        }
        InsertOutcome::Duplicate => Err(AppError::Conflict(format!(
            "A volunteer with email {} is already registered",
            volunteer.email
        ))),
    }
}

pub async fn get_volunteer(db: &DatabaseService, volunteer_id: &Uuid) -> AppResult<Volunteer> {
    db.get_volunteer(volunteer_id)
        .await?
        .ok_or(AppError::NotFound("Volunteer"))
}

/// Replaces the volunteer's skills with the normalized form of `raw`.
/// Returns the stored volunteer and a warning when the set is below the
/// joining floor.
pub async fn update_skills(
    db: &DatabaseService,
    volunteer_id: &Uuid,
    raw: &str,
    min_skill_count: usize,
) -> AppResult<(Volunteer, Option<String>)> {
    let mut volunteer = get_volunteer(db, volunteer_id).await?;
    volunteer.set_skills(normalize(raw));
    let volunteer = db.update_volunteer(&volunteer).await?;

    let warning = (volunteer.skills.len() < min_skill_count)
        .then(|| format!("Add at least {} skills to join activities", min_skill_count));
    Ok((volunteer, warning))
}
