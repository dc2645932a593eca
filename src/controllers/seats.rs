use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::TicketingError;
use crate::models::SeatStatus;
use crate::services::preemption::{PreemptedSeatSummary, SeatPreemptionService};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/seats", get(get_seats))
        .route("/seats/preempt", post(preempt_seats))
}

/* ---------- SEATS ---------- */

#[derive(Debug, Deserialize)]
struct SeatsQuery {
    performance_id: i64,
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
    status: Option<SeatStatus>,
}

#[derive(Debug, Serialize)]
struct SeatResponse {
    id: i64,
    label: String,
    grade: String,
    price: i64,
    status: SeatStatus,
}

// GET /api/seats
//
// Путь чтения обязан показывать просроченную лизу как AVAILABLE ещё до
// прохода Releaser'а, поэтому статус считается CASE-выражением, и фильтр
// по статусу применяется уже к нему.
async fn get_seats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SeatsQuery>,
) -> Result<impl IntoResponse, TicketingError> {
    let page = params.page.unwrap_or(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 100);
    let offset = super::page_offset(page, page_size);

    let rows: Vec<(i64, String, String, i64, SeatStatus)> = sqlx::query_as(
        r#"
        SELECT id, label, grade, price, effective
        FROM (
            SELECT id, label, grade, price,
                   CASE WHEN status = 'PREEMPTED' AND preempted_until < NOW()
                        THEN 'AVAILABLE'::seat_status
                        ELSE status
                   END AS effective
            FROM seats
            WHERE performance_id = $1
        ) s
        WHERE ($2::seat_status IS NULL OR effective = $2)
        ORDER BY grade, label
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(params.performance_id)
    .bind(params.status)
    .bind(page_size as i64)
    .bind(offset)
    .fetch_all(&state.db.pool)
    .await?;

    let payload: Vec<SeatResponse> = rows
        .into_iter()
        .map(|(id, label, grade, price, status)| SeatResponse {
            id,
            label,
            grade,
            price,
            status,
        })
        .collect();

    Ok((StatusCode::OK, Json(payload)))
}

/* ---------- PREEMPTION ---------- */

#[derive(Debug, Deserialize, Validate)]
struct PreemptRequest {
    performance_id: i64,
    #[validate(length(min = 1, message = "seat_ids must not be empty"))]
    seat_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct PreemptResponse {
    preemption_token: Uuid,
    expires_at: DateTime<Utc>,
    seats: Vec<PreemptedSeatSummary>,
}

// POST /api/seats/preempt
async fn preempt_seats(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
    Json(req): Json<PreemptRequest>,
) -> Result<impl IntoResponse, TicketingError> {
    if let Err(e) = req.validate() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "INVALID_REQUEST", "message": e.to_string() })),
        )
            .into_response());
    }

    let service = SeatPreemptionService::new(state.clone());
    let grant = service
        .preempt_seats(req.performance_id, &req.seat_ids, user.member_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(PreemptResponse {
            preemption_token: grant.token,
            expires_at: grant.expires_at,
            seats: grant.seats,
        }),
    )
        .into_response())
}
