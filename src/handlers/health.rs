use actix_web::HttpResponse;
use actix_web::web::Data;

use crate::error::AppError;
use crate::models::common::ApiResponse;
use crate::services::database::DatabaseService;

pub async fn health_check(db: Data<DatabaseService>) -> Result<HttpResponse, AppError> {
    db.health_check().await?;
    let stats = db.get_statistics().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(stats, "ok".to_string())))
}
