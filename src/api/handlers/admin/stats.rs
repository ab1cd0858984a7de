use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;

use super::{storage::fetch_stats, types::StatsResponse};

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Row counts.", body = StatsResponse),
        (status = 401, description = "Missing or invalid session."),
        (status = 403, description = "Session is not an admin."),
    ),
    tag = "admin"
)]
pub async fn stats(pool: Extension<PgPool>) -> impl IntoResponse {
    match fetch_stats(&pool).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(err) => err.into_response(),
    }
}
