use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Купон с фиксированной суммой скидки. Одноразовый: used взводится
/// условным UPDATE при завершении брони.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Coupon {
    pub id: i64,
    pub member_id: i64,
    pub discount_amount: i64,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}
