use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::TicketingError;
use crate::services::history::{CancellationOutcome, ReservationHistoryService};
use crate::services::reservation::{CompletionOutcome, ReservationService};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reservations", post(complete_reservation))
        .route("/reservations", get(get_my_reservations))
        .route("/reservations/cancel", patch(cancel_reservation))
}

/* ---------- COMPLETE ---------- */

#[derive(Debug, Deserialize)]
struct CompleteRequest {
    preemption_token: Uuid,
    coupon_id: Option<i64>,
    total_amount: i64,
}

// POST /api/reservations
//
// Сервис не пробрасывает ошибки — наружу всегда уходит типизированный
// успех либо структурный отказ с кодом.
async fn complete_reservation(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
    Json(req): Json<CompleteRequest>,
) -> impl IntoResponse {
    let service = ReservationService::new(state);
    let outcome = service
        .complete_reservation(
            user.member_id,
            req.preemption_token,
            req.coupon_id,
            req.total_amount,
        )
        .await;

    match outcome {
        CompletionOutcome::Completed(receipt) => {
            (StatusCode::CREATED, Json(receipt)).into_response()
        }
        CompletionOutcome::Rejected(err) => err.into_response(),
    }
}

/* ---------- CANCEL ---------- */

#[derive(Debug, Deserialize)]
struct CancelRequest {
    reservation_id: i64,
}

// PATCH /api/reservations/cancel
async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
    Json(req): Json<CancelRequest>,
) -> impl IntoResponse {
    let service = ReservationHistoryService::new(state);
    let outcome = service
        .cancel_reservation(req.reservation_id, user.member_id)
        .await;

    match outcome {
        CancellationOutcome::Canceled(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        CancellationOutcome::Rejected(err) => err.into_response(),
    }
}

/* ---------- HISTORY ---------- */

#[derive(Debug, Serialize)]
struct ReservationSeat {
    id: i64,
}

#[derive(Debug, Serialize)]
struct ReservationResponse {
    id: i64,
    performance_id: i64,
    status: String,
    total_price: i64,
    seats: Vec<ReservationSeat>,
}

// GET /api/reservations
async fn get_my_reservations(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
) -> Result<impl IntoResponse, TicketingError> {
    let rows = sqlx::query(
        r#"
        SELECT r.id AS rid, r.performance_id AS pid, r.status::text AS rstatus,
               r.total_price AS price, s.id AS sid
        FROM reservations r
        LEFT JOIN seats s ON s.reservation_id = r.id
        WHERE r.member_id = $1
        ORDER BY r.created_at DESC, s.id
        "#,
    )
    .bind(user.member_id)
    .fetch_all(&state.db.pool)
    .await?;

    let mut map: BTreeMap<i64, (i64, String, i64, Vec<i64>)> = BTreeMap::new();
    for r in rows {
        let rid: i64 = r.get("rid");
        let pid: i64 = r.get("pid");
        let status: String = r.get("rstatus");
        let price: i64 = r.get("price");
        let sid: Option<i64> = r.try_get("sid").ok();
        let e = map.entry(rid).or_insert((pid, status, price, Vec::new()));
        if let Some(sid) = sid {
            e.3.push(sid);
        }
    }

    let resp: Vec<ReservationResponse> = map
        .into_iter()
        .map(|(rid, (pid, status, price, seats))| ReservationResponse {
            id: rid,
            performance_id: pid,
            status,
            total_price: price,
            seats: seats.into_iter().map(|s| ReservationSeat { id: s }).collect(),
        })
        .collect();

    Ok((StatusCode::OK, Json(resp)))
}
