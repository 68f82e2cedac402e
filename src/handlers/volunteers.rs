use actix_web::{get, post, put, HttpResponse};
use actix_web::web::{Bytes, Data, Json, Path, Query};
use chrono::Utc;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::common::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::models::participation::{JoinOutcome, JoinRequest};
use crate::models::volunteer::{RegisterVolunteerRequest, UpdateSkillsRequest};
use crate::services::database::DatabaseService;
use crate::services::{dashboard, participation, volunteers};

#[post("")]
pub async fn register_volunteer(
    db: Data<DatabaseService>,
    payload: Json<RegisterVolunteerRequest>,
) -> Result<HttpResponse, AppError> {
    let volunteer = volunteers::register_volunteer(&db, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(volunteer)))
}

#[get("/{volunteer_id}")]
pub async fn get_volunteer(
    db: Data<DatabaseService>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let volunteer = volunteers::get_volunteer(&db, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(volunteer)))
}

#[put("/{volunteer_id}/skills")]
pub async fn update_skills(
    db: Data<DatabaseService>,
    app: Data<AppConfig>,
    path: Path<Uuid>,
    payload: Json<UpdateSkillsRequest>,
) -> Result<HttpResponse, AppError> {
    let (volunteer, warning) =
        volunteers::update_skills(&db, &path.into_inner(), &payload.skills, app.min_skill_count).await?;

    let response = match warning {
        Some(warning) => ApiResponse::success_with_message(volunteer, warning),
        None => ApiResponse::success_with_message(volunteer, "Skills updated".to_string()),
    };
    Ok(HttpResponse::Ok().json(response))
}

#[get("/{volunteer_id}/dashboard")]
pub async fn get_dashboard(
    db: Data<DatabaseService>,
    app: Data<AppConfig>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let view = dashboard::dashboard(&db, &path.into_inner(), app.min_skill_count, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(view)))
}

#[get("/{volunteer_id}/notifications")]
pub async fn list_notifications(
    db: Data<DatabaseService>,
    path: Path<Uuid>,
    query: Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let volunteer = volunteers::get_volunteer(&db, &path.into_inner()).await?;
    let notifications = db.notifications_for_volunteer(&volunteer.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(PaginatedResponse::from_sorted(notifications, &query))))
}

#[get("/{volunteer_id}/activities/{activity_id}/eligibility")]
pub async fn get_eligibility(
    db: Data<DatabaseService>,
    app: Data<AppConfig>,
    path: Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (volunteer_id, activity_id) = path.into_inner();
    let result = dashboard::activity_eligibility(&db, &volunteer_id, &activity_id, app.min_skill_count).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(result)))
}

#[post("/{volunteer_id}/activities/{activity_id}/join")]
pub async fn join_activity(
    db: Data<DatabaseService>,
    app: Data<AppConfig>,
    path: Path<(Uuid, Uuid)>,
    body: Bytes,
) -> Result<HttpResponse, AppError> {
    let (volunteer_id, activity_id) = path.into_inner();
    let request = parse_join_request(&body)?;

    let outcome = participation::join(
        &db,
        &volunteer_id,
        &activity_id,
        request.position_id,
        app.min_skill_count,
        Utc::now(),
    )
    .await?;

    match outcome {
        JoinOutcome::Joined(participation) => Ok(HttpResponse::Created().json(
            ApiResponse::success_with_message(participation, "Successfully joined the activity!".to_string()),
        )),
        JoinOutcome::AlreadyJoined => {
            let existing = db.find_participation(&volunteer_id, &activity_id).await?;
            Ok(HttpResponse::Ok().json(ApiResponse {
                success: true,
                data: existing,
                message: Some("Already joined this activity.".to_string()),
                error: None,
            }))
        }
        JoinOutcome::Rejected(reason) => Err(AppError::Validation(reason)),
    }
}

/// An empty body joins without a position; anything else must parse.
fn parse_join_request(body: &[u8]) -> Result<JoinRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(JoinRequest::default());
    }
    serde_json::from_slice(body).map_err(|err| AppError::Validation(format!("Invalid join request: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, web, App};
    use serde_json::{json, Value};

    use crate::services::database::tests::{activity_request, memory_db, seed_activity, seed_volunteer};

    #[actix_web::test]
    async fn test_register_then_join_twice() {
        let db = memory_db().await;
        let (activity, _) = seed_activity(&db, &activity_request(None, &[])).await;

        let app = test::init_service(
            App::new()
                .app_data(Data::new(db.clone()))
                .app_data(Data::new(AppConfig { min_skill_count: 2 }))
                .service(
                    web::scope("/volunteers")
                        .service(register_volunteer)
                        .service(join_activity),
                ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/volunteers")
            .set_json(json!({
                "first_name": "Lerato",
                "last_name": "Mokoena",
                "email": "lerato@example.com",
                "skills": "cooking, driving"
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["skills"], json!(["Cooking", "Driving"]));
        let volunteer_id = body["data"]["id"].as_str().unwrap().to_string();

        let uri = format!("/volunteers/{}/activities/{}/join", volunteer_id, activity.id);
        let resp = test::call_service(&app, test::TestRequest::post().uri(&uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = test::call_service(&app, test::TestRequest::post().uri(&uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Already joined this activity.");
    }

    #[actix_web::test]
    async fn test_rejected_join_is_bad_request() {
        let db = memory_db().await;
        let (activity, _) = seed_activity(&db, &activity_request(Some("python"), &[])).await;
        let volunteer = seed_volunteer(&db, "c@example.com", "Cooking, Driving").await;

        let app = test::init_service(
            App::new()
                .app_data(Data::new(db))
                .app_data(Data::new(AppConfig { min_skill_count: 2 }))
                .service(web::scope("/volunteers").service(join_activity)),
        )
        .await;

        let uri = format!("/volunteers/{}/activities/{}/join", volunteer.id, activity.id);
        let resp = test::call_service(&app, test::TestRequest::post().uri(&uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Missing required skills: python.");
    }

    #[actix_web::test]
    async fn test_malformed_join_body_is_bad_request() {
        let db = memory_db().await;
        let (activity, _) = seed_activity(&db, &activity_request(None, &[("Cook", None, 1)])).await;
        let volunteer = seed_volunteer(&db, "m@example.com", "Cooking, Driving").await;

        let app = test::init_service(
            App::new()
                .app_data(Data::new(db.clone()))
                .app_data(Data::new(AppConfig { min_skill_count: 2 }))
                .service(web::scope("/volunteers").service(join_activity)),
        )
        .await;

        let uri = format!("/volunteers/{}/activities/{}/join", volunteer.id, activity.id);
        let req = test::TestRequest::post()
            .uri(&uri)
            .set_json(json!({ "position_id": "not-a-uuid" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(db.find_participation(&volunteer.id, &activity.id).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn test_join_body_names_position() {
        let db = memory_db().await;
        let (activity, positions) = seed_activity(&db, &activity_request(None, &[("Cook", None, 1)])).await;
        let volunteer = seed_volunteer(&db, "p@example.com", "Cooking, Driving").await;

        let app = test::init_service(
            App::new()
                .app_data(Data::new(db.clone()))
                .app_data(Data::new(AppConfig { min_skill_count: 2 }))
                .service(web::scope("/volunteers").service(join_activity)),
        )
        .await;

        let uri = format!("/volunteers/{}/activities/{}/join", volunteer.id, activity.id);
        let req = test::TestRequest::post()
            .uri(&uri)
            .set_json(json!({ "position_id": positions[0].id }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let stored = db.find_participation(&volunteer.id, &activity.id).await.unwrap().unwrap();
        assert_eq!(stored.position_id, Some(positions[0].id));
    }
}
