use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reservation_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ReservationStatus {
    Paid,
    Canceled,
}

/// Оплаченная бронь. Создается ровно один раз на успешный checkout;
/// единственный допустимый переход после этого — PAID -> CANCELED.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub member_id: i64,
    pub performance_id: i64,
    pub status: ReservationStatus,
    pub total_price: i64,
    pub created_at: DateTime<Utc>,
    pub status_changed_at: DateTime<Utc>,
}
