use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::participation::{JoinOutcome, Participation, UpdateParticipationRequest};
use crate::services::database::{DatabaseService, InsertOutcome};
use crate::services::matching::participation_eligibility;

/// Authoritative join gate.
///
/// A volunteer who already joined the activity always gets `AlreadyJoined`.
/// Otherwise checks run in a fixed order and the first failure decides the
/// reason; the unique index settles concurrent attempts.
/// Only volunteers and activities that don't exist are errors; every other
/// refusal is a `Rejected` outcome with a message for the volunteer.
pub async fn join(
    db: &DatabaseService,
    volunteer_id: &Uuid,
    activity_id: &Uuid,
    position_id: Option<Uuid>,
    min_skill_count: usize,
    now: DateTime<Utc>,
) -> AppResult<JoinOutcome> {
    let volunteer = db
        .get_volunteer(volunteer_id)
        .await?
        .ok_or(AppError::NotFound("Volunteer"))?;
    let activity = db
        .get_activity(activity_id)
        .await?
        .ok_or(AppError::NotFound("Activity"))?;

    // An existing join wins over every later check.
    if db.find_participation(&volunteer.id, &activity.id).await?.is_some() {
        log::info!("Volunteer {} already joined activity {}", volunteer.id, activity.id);
        return Ok(JoinOutcome::AlreadyJoined);
    }

    if volunteer.skills.len() < min_skill_count {
        return Ok(reject(
            volunteer_id,
            activity_id,
            format!("Add at least {} skills before joining.", min_skill_count),
        ));
    }

    if !activity.registration_open(now) {
        return Ok(reject(volunteer_id, activity_id, "Registration is closed for this activity.".to_string()));
    }

    let mut required = activity.required_skills.clone();
    if let Some(position_id) = position_id {
        let position = match db.get_position(&position_id).await? {
            Some(position) if position.activity_id == activity.id => position,
            _ => {
                return Ok(reject(
                    volunteer_id,
                    activity_id,
                    "That position is not part of this activity.".to_string(),
                ))
            }
        };
        if !position.has_open_slot() {
            return Ok(reject(
                volunteer_id,
                activity_id,
                format!("Position '{}' is already full.", position.title),
            ));
        }
        required = required.union(&position.required_skills);
    }

    let eligibility = participation_eligibility(&volunteer.skills, &required, min_skill_count);
    if !eligibility.eligible {
        return Ok(reject(
            volunteer_id,
            activity_id,
            format!("Missing required skills: {}.", eligibility.missing.join(", ")),
        ));
    }

    match db.insert_participation(&Participation::new(volunteer.id, activity.id, position_id)).await? {
        InsertOutcome::Inserted(participation) => {
            log::info!(
                "Volunteer {} joined activity '{}' ({})",
                volunteer.id,
                activity.name,
                activity.id
            );
            Ok(JoinOutcome::Joined(participation))
        }
        InsertOutcome::Duplicate => {
            log::info!("Volunteer {} already joined activity {}", volunteer.id, activity.id);
            Ok(JoinOutcome::AlreadyJoined)
        }
    }
}

fn reject(volunteer_id: &Uuid, activity_id: &Uuid, reason: String) -> JoinOutcome {
    log::warn!("Join of volunteer {} to activity {} rejected: {}", volunteer_id, activity_id, reason);
    JoinOutcome::Rejected(reason)
}

pub async fn update_participation(
    db: &DatabaseService,
    participation_id: &Uuid,
    request: UpdateParticipationRequest,
) -> AppResult<Participation> {
    request.validate()?;

    let mut participation = db
        .get_participation(participation_id)
        .await?
        .ok_or(AppError::NotFound("Participation"))?;
    participation.apply(request);

    Ok(db.update_participation(&participation).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::participation::ParticipationStatus;
    use crate::models::skills::normalize;
    use crate::services::database::tests::{activity_request, memory_db, seed_activity, seed_volunteer};
    use chrono::Duration;

    fn rejection(outcome: JoinOutcome) -> String {
        match outcome {
            JoinOutcome::Rejected(reason) => reason,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_join_then_join_again_is_soft_warning() {
        let db = memory_db().await;
        let volunteer = seed_volunteer(&db, "a@example.com", "Cooking, Driving").await;
        let (activity, _) = seed_activity(&db, &activity_request(None, &[])).await;

        let first = join(&db, &volunteer.id, &activity.id, None, 2, Utc::now()).await.unwrap();
        assert!(matches!(first, JoinOutcome::Joined(_)));

        let second = join(&db, &volunteer.id, &activity.id, None, 2, Utc::now()).await.unwrap();
        assert!(matches!(second, JoinOutcome::AlreadyJoined));
        assert_eq!(db.participations_for_activity(&activity.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_join_below_floor_is_rejected() {
        let db = memory_db().await;
        let volunteer = seed_volunteer(&db, "one@example.com", "Python").await;
        let (activity, _) = seed_activity(&db, &activity_request(None, &[])).await;

        let reason = rejection(join(&db, &volunteer.id, &activity.id, None, 2, Utc::now()).await.unwrap());
        assert_eq!(reason, "Add at least 2 skills before joining.");
        assert!(db.find_participation(&volunteer.id, &activity.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_join_lists_missing_skills() {
        let db = memory_db().await;
        let volunteer = seed_volunteer(&db, "cook@example.com", "Cooking, Driving").await;
        let (activity, _) = seed_activity(&db, &activity_request(Some("python, first aid"), &[])).await;

        let reason = rejection(join(&db, &volunteer.id, &activity.id, None, 2, Utc::now()).await.unwrap());
        assert_eq!(reason, "Missing required skills: python, first aid.");
    }

    #[tokio::test]
    async fn test_join_checks_position_requirements_too() {
        let db = memory_db().await;
        let volunteer = seed_volunteer(&db, "swim@example.com", "Swimming, Cooking").await;
        let (activity, positions) = seed_activity(
            &db,
            &activity_request(Some("swimming"), &[("Lifeguard", Some("first aid"), 1)]),
        )
        .await;

        let reason = rejection(
            join(&db, &volunteer.id, &activity.id, Some(positions[0].id), 2, Utc::now()).await.unwrap(),
        );
        assert_eq!(reason, "Missing required skills: first aid.");

        // Without the position only the activity requirement applies.
        let outcome = join(&db, &volunteer.id, &activity.id, None, 2, Utc::now()).await.unwrap();
        assert!(matches!(outcome, JoinOutcome::Joined(_)));
    }

    #[tokio::test]
    async fn test_join_fills_position_and_rejects_when_full() {
        let db = memory_db().await;
        let first = seed_volunteer(&db, "first@example.com", "Cooking, Driving").await;
        let second = seed_volunteer(&db, "second@example.com", "Cooking, Baking").await;
        let (activity, positions) = seed_activity(&db, &activity_request(None, &[("Cook", Some("cooking"), 1)])).await;
        let position_id = positions[0].id;

        let outcome = join(&db, &first.id, &activity.id, Some(position_id), 2, Utc::now()).await.unwrap();
        match outcome {
            JoinOutcome::Joined(participation) => assert_eq!(participation.position_id, Some(position_id)),
            other => panic!("expected join, got {other:?}"),
        }
        assert_eq!(db.get_position(&position_id).await.unwrap().unwrap().filled, 1);

        let reason = rejection(join(&db, &second.id, &activity.id, Some(position_id), 2, Utc::now()).await.unwrap());
        assert_eq!(reason, "Position 'Cook' is already full.");
    }

    #[tokio::test]
    async fn test_rejoin_of_full_position_reports_already_joined() {
        let db = memory_db().await;
        let volunteer = seed_volunteer(&db, "only@example.com", "Cooking, Driving").await;
        let (activity, positions) = seed_activity(&db, &activity_request(None, &[("Cook", Some("cooking"), 1)])).await;
        let position_id = positions[0].id;

        let first = join(&db, &volunteer.id, &activity.id, Some(position_id), 2, Utc::now()).await.unwrap();
        assert!(matches!(first, JoinOutcome::Joined(_)));

        let second = join(&db, &volunteer.id, &activity.id, Some(position_id), 2, Utc::now()).await.unwrap();
        assert!(matches!(second, JoinOutcome::AlreadyJoined));
        assert_eq!(db.get_position(&position_id).await.unwrap().unwrap().filled, 1);
    }

    #[tokio::test]
    async fn test_rejoin_after_registration_closes_reports_already_joined() {
        let db = memory_db().await;
        let volunteer = seed_volunteer(&db, "early@example.com", "Cooking, Driving").await;
        let now = Utc::now();
        let mut request = activity_request(None, &[]);
        request.reg_close = Some(now + Duration::hours(1));
        let (activity, _) = seed_activity(&db, &request).await;

        let first = join(&db, &volunteer.id, &activity.id, None, 2, now).await.unwrap();
        assert!(matches!(first, JoinOutcome::Joined(_)));

        let later = now + Duration::days(2);
        let second = join(&db, &volunteer.id, &activity.id, None, 2, later).await.unwrap();
        assert!(matches!(second, JoinOutcome::AlreadyJoined));
    }

    #[tokio::test]
    async fn test_rejoin_after_skills_shrink_reports_already_joined() {
        let db = memory_db().await;
        let mut volunteer = seed_volunteer(&db, "shrink@example.com", "Python, Cooking").await;
        let (activity, _) = seed_activity(&db, &activity_request(Some("python"), &[])).await;

        let first = join(&db, &volunteer.id, &activity.id, None, 2, Utc::now()).await.unwrap();
        assert!(matches!(first, JoinOutcome::Joined(_)));

        volunteer.set_skills(normalize("Cooking"));
        db.update_volunteer(&volunteer).await.unwrap();

        let second = join(&db, &volunteer.id, &activity.id, None, 2, Utc::now()).await.unwrap();
        assert!(matches!(second, JoinOutcome::AlreadyJoined));
    }

    #[tokio::test]
    async fn test_join_rejects_position_of_other_activity() {
        let db = memory_db().await;
        let volunteer = seed_volunteer(&db, "x@example.com", "Cooking, Driving").await;
        let (activity, _) = seed_activity(&db, &activity_request(None, &[])).await;
        let (_, other_positions) = seed_activity(&db, &activity_request(None, &[("Driver", None, 2)])).await;

        let reason = rejection(
            join(&db, &volunteer.id, &activity.id, Some(other_positions[0].id), 2, Utc::now())
                .await
                .unwrap(),
        );
        assert_eq!(reason, "That position is not part of this activity.");
    }

    #[tokio::test]
    async fn test_join_outside_registration_window() {
        let db = memory_db().await;
        let volunteer = seed_volunteer(&db, "late@example.com", "Cooking, Driving").await;
        let now = Utc::now();
        let mut request = activity_request(None, &[]);
        request.reg_open = Some(now - Duration::days(10));
        request.reg_close = Some(now - Duration::days(1));
        let (activity, _) = seed_activity(&db, &request).await;

        let reason = rejection(join(&db, &volunteer.id, &activity.id, None, 2, now).await.unwrap());
        assert_eq!(reason, "Registration is closed for this activity.");
    }

    #[tokio::test]
    async fn test_join_unknown_records() {
        let db = memory_db().await;
        let volunteer = seed_volunteer(&db, "u@example.com", "Cooking, Driving").await;

        let err = join(&db, &Uuid::new_v4(), &Uuid::new_v4(), None, 2, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("Volunteer")));

        let err = join(&db, &volunteer.id, &Uuid::new_v4(), None, 2, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("Activity")));
    }

    #[tokio::test]
    async fn test_update_participation_records_attendance() {
        let db = memory_db().await;
        let volunteer = seed_volunteer(&db, "r@example.com", "Cooking, Driving").await;
        let (activity, _) = seed_activity(&db, &activity_request(None, &[])).await;
        let participation = match join(&db, &volunteer.id, &activity.id, None, 2, Utc::now()).await.unwrap() {
            JoinOutcome::Joined(participation) => participation,
            other => panic!("expected join, got {other:?}"),
        };

        let updated = update_participation(
            &db,
            &participation.id,
            UpdateParticipationRequest {
                attendance: true,
                rating: Some(5),
                status: Some(ParticipationStatus::Completed),
            },
        )
        .await
        .unwrap();
        assert!(updated.attendance);
        assert_eq!(updated.performance_rating, Some(5));

        let err = update_participation(
            &db,
            &participation.id,
            UpdateParticipationRequest { attendance: true, rating: Some(0), status: None },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
