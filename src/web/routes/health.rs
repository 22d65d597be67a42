use axum::{Router, extract::State, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::web::{ApiResponse, AppState};

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: bool,
    pub version: &'static str,
}

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/api/health", get(health_handler))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/health",
    description = "Reports whether the service and its database are reachable",
    responses(
        (status = 200, description = "Service status", body = HealthStatus),
    ),
    tag = "health"
)]
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(state.pool().executor())
        .await
        .is_ok();

    if !database {
        tracing::warn!("health check: database unreachable");
    }

    ApiResponse::ok(HealthStatus {
        status: if database { "ok" } else { "degraded" },
        database,
        version: env!("CARGO_PKG_VERSION"),
    })
}
