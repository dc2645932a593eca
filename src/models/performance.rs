use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "hall_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum HallType {
    Grand,
    Medium,
    Small,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Performance {
    pub id: i64,
    pub title: String,
    pub hall_type: HallType,
    pub starts_at: DateTime<Utc>,
}
