use actix_web::{HttpResponse, get, web};
use chrono::Utc;
use sea_orm::DatabaseConnection;

use crate::models::health::HealthResponse;

/// GET /api/health - liveness, plus whether the database answers a ping
#[get("/health")]
pub async fn health_check(db: web::Data<DatabaseConnection>) -> HttpResponse {
    let database = match db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "database ping failed");
            false
        }
    };

    let response = HealthResponse {
        status: if database { "ok" } else { "degraded" },
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        database,
        time: Utc::now(),
    };

    HttpResponse::Ok().json(response)
}
