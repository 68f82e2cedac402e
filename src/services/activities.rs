use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::activity::{Activity, ActivitySummary, CreateActivityRequest, Position};
use crate::models::notification::{new_position_message, Notification};
use crate::models::participation::RosterEntry;
use crate::services::database::DatabaseService;
use crate::services::matching::{rank_candidates, Candidate};
use crate::services::notifier::{DeliveryJob, NotificationDispatcher};

#[derive(Debug, Serialize)]
pub struct CreatedActivity {
    pub activity: Activity,
    pub positions: Vec<Position>,
    pub notified: usize,
}

#[derive(Debug, Serialize)]
pub struct PositionRoster {
    pub position: Position,
    pub assigned: Vec<RosterEntry>,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Serialize)]
pub struct ActivityRoster {
    pub activity: Activity,
    pub positions: Vec<PositionRoster>,
    pub unassigned: Vec<RosterEntry>,
}

/// Creates an activity with its positions and notifies every candidate of
/// each position.
///
/// The activity, positions and notification records commit together;
/// emails are queued only after the commit.
pub async fn create_activity(
    db: &DatabaseService,
    dispatcher: &NotificationDispatcher,
    request: CreateActivityRequest,
    min_skill_count: usize,
) -> AppResult<CreatedActivity> {
    request.validate()?;
    request.check_windows().map_err(AppError::Validation)?;

    let activity = Activity::new(&request);
    let positions = Position::from_requests(activity.id, &request.positions);

    // A new activity has no participants, so every skilled volunteer is available.
    let volunteers = db.list_skilled_volunteers().await?;

    let mut notifications = Vec::new();
    let mut jobs = Vec::new();
    for position in &positions {
        let candidates = rank_candidates(&position.required_skills, volunteers.clone(), min_skill_count);
        let message = new_position_message(&activity, position);
        for candidate in candidates {
            let notification = Notification::new(candidate.volunteer.id, activity.id, Some(position.id), message.clone());
            jobs.push(DeliveryJob::new(&notification, &candidate.volunteer, &activity, position));
            notifications.push(notification);
        }
    }

    db.create_activity_bundle(&activity, &positions, &notifications).await?;

    for job in jobs {
        dispatcher.enqueue(job);
    }

    log::info!(
        "Activity '{}' ({}) created with {} position(s); {} volunteer notification(s) queued",
        activity.name,
        activity.id,
        positions.len(),
        notifications.len()
    );

    Ok(CreatedActivity {
        activity,
        positions,
        notified: notifications.len(),
    })
}

pub async fn activities_for_org(db: &DatabaseService, org_id: &Uuid) -> AppResult<Vec<ActivitySummary>> {
    let mut summaries = Vec::new();
    for activity in db.activities_for_org(org_id).await? {
        let position_count = db.positions_for_activity(&activity.id).await?.len();
        let volunteer_count = db.participations_for_activity(&activity.id).await?.len();
        summaries.push(ActivitySummary {
            activity,
            position_count,
            volunteer_count,
        });
    }
    Ok(summaries)
}

/// Organization view: who is assigned where, who joined without a
/// position, and who would fit each position.
pub async fn activity_roster(
    db: &DatabaseService,
    activity_id: &Uuid,
    min_skill_count: usize,
) -> AppResult<ActivityRoster> {
    let activity = db
        .get_activity(activity_id)
        .await?
        .ok_or(AppError::NotFound("Activity"))?;
    let positions = db.positions_for_activity(activity_id).await?;
    let available = db.available_volunteers(activity_id).await?;

    let mut entries = Vec::new();
    for participation in db.participations_for_activity(activity_id).await? {
        match db.get_volunteer(&participation.volunteer_id).await? {
            Some(volunteer) => entries.push(RosterEntry { participation, volunteer }),
            None => log::warn!(
                "Participation {} references missing volunteer {}",
                participation.id,
                participation.volunteer_id
            ),
        }
    }
    entries.sort_by(|a, b| a.volunteer.first_name.cmp(&b.volunteer.first_name));

    let mut rosters: Vec<PositionRoster> = positions
        .into_iter()
        .map(|position| PositionRoster {
            candidates: rank_candidates(&position.required_skills, available.clone(), min_skill_count),
            position,
            assigned: Vec::new(),
        })
        .collect();

    let mut unassigned = Vec::new();
    for entry in entries {
        let slot = entry
            .participation
            .position_id
            .and_then(|id| rosters.iter_mut().find(|r| r.position.id == id));
        match slot {
            Some(roster) => roster.assigned.push(entry),
            None => unassigned.push(entry),
        }
    }

    Ok(ActivityRoster {
        activity,
        positions: rosters,
        unassigned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::participation::Participation;
    use crate::services::database::tests::{activity_request, memory_db, seed_volunteer};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_create_activity_notifies_candidates_per_position() {
        let db = memory_db().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = NotificationDispatcher::new(db.clone(), tx, 2);

        let swimmer = seed_volunteer(&db, "swim@example.com", "Swimming, First Aid").await;
        let cook = seed_volunteer(&db, "cook@example.com", "Cooking, Driving").await;
        seed_volunteer(&db, "solo@example.com", "Cooking").await;

        let request = activity_request(None, &[("Lifeguard", Some("swimming"), 1), ("Helper", None, 3)]);
        let created = create_activity(&db, &dispatcher, request, 2).await.unwrap();

        // Lifeguard: swimmer. Helper (floor of two skills): swimmer and cook.
        assert_eq!(created.positions.len(), 2);
        assert_eq!(created.notified, 3);

        let swimmer_notes = db.notifications_for_volunteer(&swimmer.id).await.unwrap();
        assert_eq!(swimmer_notes.len(), 2);
        let cook_notes = db.notifications_for_volunteer(&cook.id).await.unwrap();
        assert_eq!(cook_notes.len(), 1);
        assert_eq!(
            cook_notes[0].message,
            "New position open: 'Helper' for 'River Cleanup'. Required skills: None. Registration closes: Open."
        );

        let mut queued = Vec::new();
        while let Ok(job) = rx.try_recv() {
            queued.push(job.email.to);
        }
        queued.sort();
        assert_eq!(queued, vec!["cook@example.com", "swim@example.com", "swim@example.com"]);
    }

    #[tokio::test]
    async fn test_create_activity_rejects_inverted_dates() {
        let db = memory_db().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let dispatcher = NotificationDispatcher::new(db.clone(), tx, 2);

        let mut request = activity_request(None, &[]);
        request.end_date = request.start_date.pred_opt().unwrap();
        let err = create_activity(&db, &dispatcher, request, 2).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(db.list_activities().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_activity_requires_name() {
        let db = memory_db().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let dispatcher = NotificationDispatcher::new(db.clone(), tx, 2);

        let mut request = activity_request(None, &[]);
        request.name = String::new();
        let err = create_activity(&db, &dispatcher, request, 2).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_roster_groups_participants_by_position() {
        let db = memory_db().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let dispatcher = NotificationDispatcher::new(db.clone(), tx, 2);

        let assigned = seed_volunteer(&db, "assigned@example.com", "Cooking, Driving").await;
        let floating = seed_volunteer(&db, "floating@example.com", "Cooking, Singing").await;
        let waiting = seed_volunteer(&db, "waiting@example.com", "Cooking, Baking").await;

        let request = activity_request(None, &[("Cook", Some("cooking"), 2)]);
        let org_id = request.org_id;
        let created = create_activity(&db, &dispatcher, request, 2).await.unwrap();
        let activity_id = created.activity.id;
        let position_id = created.positions[0].id;

        db.insert_participation(&Participation::new(assigned.id, activity_id, Some(position_id))).await.unwrap();
        db.insert_participation(&Participation::new(floating.id, activity_id, None)).await.unwrap();

        let roster = activity_roster(&db, &activity_id, 2).await.unwrap();
        assert_eq!(roster.positions.len(), 1);
        assert_eq!(roster.positions[0].position.filled, 1);
        assert_eq!(roster.positions[0].assigned.len(), 1);
        assert_eq!(roster.positions[0].assigned[0].volunteer.id, assigned.id);
        assert_eq!(roster.unassigned.len(), 1);
        assert_eq!(roster.unassigned[0].volunteer.id, floating.id);

        let candidate_ids: Vec<_> = roster.positions[0].candidates.iter().map(|c| c.volunteer.id).collect();
        assert_eq!(candidate_ids, vec![waiting.id]);

        let summaries = activities_for_org(&db, &org_id).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].position_count, 1);
        assert_eq!(summaries[0].volunteer_count, 2);
    }
}
