use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::activity::Position;
use crate::services::database::DatabaseService;
use crate::services::matching::{rank_candidates, Candidate};

/// Volunteers eligible for a position who have not joined its activity,
/// best fit first. Advisory: the join gate re-checks.
pub async fn find_candidates(
    db: &DatabaseService,
    position: &Position,
    min_skill_count: usize,
) -> AppResult<Vec<Candidate>> {
    let available = db.available_volunteers(&position.activity_id).await?;
    let candidates = rank_candidates(&position.required_skills, available, min_skill_count);

    log::info!(
        "Found {} candidate(s) for position '{}' ({})",
        candidates.len(),
        position.title,
        position.id
    );
    Ok(candidates)
}

pub async fn candidates_for_position(
    db: &DatabaseService,
    position_id: &Uuid,
    min_skill_count: usize,
) -> AppResult<Vec<Candidate>> {
    let position = db
        .get_position(position_id)
        .await?
        .ok_or(AppError::NotFound("Position"))?;
    find_candidates(db, &position, min_skill_count).await
}
