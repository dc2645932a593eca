use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Ошибки движка бронирования. Каждый вариант несёт стабильный строковый код,
/// который отдается клиенту, чтобы UI мог различать стратегии повтора.
#[derive(Debug, Error)]
pub enum TicketingError {
    #[error("preemption cap reached: {held} held + {requested} requested exceeds {cap}")]
    PreemptionLimitExceeded { held: usize, requested: usize, cap: u32 },

    #[error("seats already preempted by this user: {seat_ids:?}")]
    PreemptionDuplicateSeat { seat_ids: Vec<i64> },

    #[error("at least one seat must be requested")]
    PreemptionEmptyRequest,

    #[error("seats unavailable: {seat_ids:?}")]
    SeatsUnavailable { seat_ids: Vec<i64> },

    #[error("preemption token unknown or already consumed")]
    PreemptionTokenInvalid,

    #[error("preempted seats belong to another user")]
    PreemptionPermissionDenied,

    #[error("preemption lease expired")]
    PreemptionExpired,

    #[error("seat already carries a reservation")]
    AlreadyReserved,

    #[error("amount mismatch: quoted {quoted}, computed {computed}")]
    AmountMismatch { quoted: i64, computed: i64 },

    #[error("insufficient points: required {required}, available {available}")]
    InsufficientPoints { required: i64, available: i64 },

    #[error("coupon rejected: {0}")]
    CouponRejected(String),

    #[error("reservation not found")]
    ReservationNotFound,

    #[error("reservation is not cancellable")]
    NotCancellable,

    #[error("performance not found")]
    PerformanceNotFound,

    #[error("seats already provisioned for performance {0}")]
    AlreadyProvisioned(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl TicketingError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::PreemptionLimitExceeded { .. } => "PREEMPTION_LIMIT_EXCEEDED",
            Self::PreemptionDuplicateSeat { .. } => "PREEMPTION_DUPLICATE_SEAT",
            Self::PreemptionEmptyRequest => "PREEMPTION_EMPTY_REQUEST",
            Self::SeatsUnavailable { .. } => "SEAT_UNAVAILABLE",
            Self::PreemptionTokenInvalid => "PREEMPTION_TOKEN_INVALID",
            Self::PreemptionPermissionDenied => "PREEMPTION_PERMISSION_DENIED",
            Self::PreemptionExpired => "PREEMPTION_EXPIRED",
            Self::AlreadyReserved => "RESERVATION_ALREADY_RESERVED",
            Self::AmountMismatch { .. } => "RESERVATION_AMOUNT_MISMATCH",
            Self::InsufficientPoints { .. } => "INSUFFICIENT_POINT",
            Self::CouponRejected(_) => "COUPON_REJECTED",
            Self::ReservationNotFound => "RESERVATION_NOT_FOUND",
            Self::NotCancellable => "RESERVATION_NOT_CANCELLABLE",
            Self::PerformanceNotFound => "PERFORMANCE_NOT_FOUND",
            Self::AlreadyProvisioned(_) => "SEATS_ALREADY_PROVISIONED",
            Self::Database(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            // Ошибки валидации запроса: повторять без изменений бессмысленно.
            Self::PreemptionLimitExceeded { .. }
            | Self::PreemptionDuplicateSeat { .. }
            | Self::PreemptionEmptyRequest
            | Self::AmountMismatch { .. } => StatusCode::BAD_REQUEST,
            // Конфликты состояния: клиент может предложить другие места.
            Self::SeatsUnavailable { .. }
            | Self::PreemptionExpired
            | Self::AlreadyReserved
            | Self::NotCancellable
            | Self::AlreadyProvisioned(_) => StatusCode::CONFLICT,
            Self::PreemptionPermissionDenied => StatusCode::FORBIDDEN,
            Self::PreemptionTokenInvalid
            | Self::ReservationNotFound
            | Self::PerformanceNotFound => StatusCode::NOT_FOUND,
            // Ошибки зависимых систем: баланс/купон.
            Self::InsufficientPoints { .. } | Self::CouponRejected(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TicketingError {
    fn into_response(self) -> Response {
        if let Self::Database(ref e) = self {
            tracing::error!("database error surfaced to client: {:?}", e);
        }

        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });

        // Частичный провал преемпции называет конкретные места,
        // чтобы UI мог их подсветить.
        match &self {
            Self::SeatsUnavailable { seat_ids } => {
                body["unavailable_seat_ids"] = json!(seat_ids);
            }
            Self::PreemptionDuplicateSeat { seat_ids } => {
                body["seat_ids"] = json!(seat_ids);
            }
            Self::InsufficientPoints { required, available } => {
                body["required"] = json!(required);
                body["available"] = json!(available);
            }
            Self::AmountMismatch { quoted, computed } => {
                body["quoted"] = json!(quoted);
                body["computed"] = json!(computed);
            }
            _ => {}
        }

        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let err = TicketingError::PreemptionLimitExceeded { held: 4, requested: 2, cap: 5 };
        assert_eq!(err.code(), "PREEMPTION_LIMIT_EXCEEDED");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = TicketingError::SeatsUnavailable { seat_ids: vec![2] };
        assert_eq!(err.code(), "SEAT_UNAVAILABLE");
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = TicketingError::PreemptionEmptyRequest;
        assert_eq!(err.code(), "PREEMPTION_EMPTY_REQUEST");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = TicketingError::AmountMismatch { quoted: 30000, computed: 40000 };
        assert_eq!(err.code(), "RESERVATION_AMOUNT_MISMATCH");

        let err = TicketingError::InsufficientPoints { required: 40000, available: 100 };
        assert_eq!(err.code(), "INSUFFICIENT_POINT");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn conflict_errors_name_the_seats() {
        let err = TicketingError::SeatsUnavailable { seat_ids: vec![2, 7] };
        assert!(err.to_string().contains('2'));
        assert!(err.to_string().contains('7'));
    }
}
