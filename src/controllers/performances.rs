use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::TicketingError;
use crate::models::Performance;
use crate::services::provisioning::SeatService;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/performances", get(list_performances))
        .route("/performances/{id}/seats", post(provision_seats))
}

#[derive(Debug, Deserialize)]
struct PerformancesQuery {
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
}

// GET /api/performances
async fn list_performances(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PerformancesQuery>,
) -> Result<impl IntoResponse, TicketingError> {
    let page = params.page.unwrap_or(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 50);
    let offset = super::page_offset(page, page_size);

    let performances: Vec<Performance> = sqlx::query_as(
        "SELECT id, title, hall_type, starts_at FROM performances
         ORDER BY starts_at
         LIMIT $1 OFFSET $2",
    )
    .bind(page_size as i64)
    .bind(offset)
    .fetch_all(&state.db.pool)
    .await?;

    Ok((StatusCode::OK, Json(performances)))
}

#[derive(Debug, Serialize)]
struct ProvisionResponse {
    performance_id: i64,
    created_seats: u64,
}

// POST /api/performances/{id}/seats
//
// Разовая генерация мест из шаблона зала; повторный вызов — конфликт.
async fn provision_seats(
    State(state): State<Arc<AppState>>,
    _user: crate::middleware::AuthUser,
    Path(performance_id): Path<i64>,
) -> Result<impl IntoResponse, TicketingError> {
    let service = SeatService::new(state);
    let created = service.create_seats_for_performance(performance_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(ProvisionResponse {
            performance_id,
            created_seats: created,
        }),
    ))
}
