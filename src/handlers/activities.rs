use actix_web::{get, post, put, HttpResponse};
use actix_web::web::{Data, Json, Path, Query};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::activity::CreateActivityRequest;
use crate::models::common::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::models::participation::UpdateParticipationRequest;
use crate::services::database::DatabaseService;
use crate::services::notifier::NotificationDispatcher;
use crate::services::{activities, candidates, participation};

#[post("")]
pub async fn create_activity(
    db: Data<DatabaseService>,
    dispatcher: Data<NotificationDispatcher>,
    app: Data<AppConfig>,
    payload: Json<CreateActivityRequest>,
) -> Result<HttpResponse, AppError> {
    let created = activities::create_activity(&db, &dispatcher, payload.into_inner(), app.min_skill_count).await?;
    let message = format!(
        "Activity created with {} position(s); {} volunteer(s) notified",
        created.positions.len(),
        created.notified
    );
    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(created, message)))
}

#[get("/{activity_id}/roster")]
pub async fn get_roster(
    db: Data<DatabaseService>,
    app: Data<AppConfig>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let roster = activities::activity_roster(&db, &path.into_inner(), app.min_skill_count).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(roster)))
}

#[get("/{org_id}/activities")]
pub async fn list_org_activities(
    db: Data<DatabaseService>,
    path: Path<Uuid>,
    query: Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let summaries = activities::activities_for_org(&db, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(PaginatedResponse::from_sorted(summaries, &query))))
}

#[get("/{position_id}/candidates")]
pub async fn get_candidates(
    db: Data<DatabaseService>,
    app: Data<AppConfig>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let found = candidates::candidates_for_position(&db, &path.into_inner(), app.min_skill_count).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(found)))
}

/// Manual re-trigger of candidate notifications for one position.
#[post("/{position_id}/notify")]
pub async fn notify_candidates(
    dispatcher: Data<NotificationDispatcher>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let notified = dispatcher.notify_position(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        serde_json::json!({ "notified": notified }),
        format!("{} volunteer(s) notified", notified),
    )))
}

#[put("/{participation_id}")]
pub async fn update_participation(
    db: Data<DatabaseService>,
    path: Path<Uuid>,
    payload: Json<UpdateParticipationRequest>,
) -> Result<HttpResponse, AppError> {
    let updated = participation::update_participation(&db, &path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(updated)))
}
