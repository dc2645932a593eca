use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::error::TicketingError;
use crate::services::points::PointService;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/points", get(get_balance))
}

#[derive(Debug, Serialize)]
struct BalanceResponse {
    balance: i64,
}

// GET /api/points
async fn get_balance(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
) -> Result<impl IntoResponse, TicketingError> {
    let balance = PointService::new(state).current_balance(user.member_id).await?;
    Ok((StatusCode::OK, Json(BalanceResponse { balance })))
}
