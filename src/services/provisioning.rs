//! Разовая генерация мест представления из шаблона зала. Не входит в
//! горячий конкурентный путь; определяет рождение строки Seat.

use std::sync::Arc;
use tracing::info;

use crate::error::TicketingError;
use crate::models::HallType;
use crate::AppState;

#[derive(Clone)]
pub struct SeatService {
    state: Arc<AppState>,
}

impl SeatService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Вставляет по одной строке на место шаблона зала, цена копируется
    /// из грейда. Повторная генерация для того же представления — отказ.
    pub async fn create_seats_for_performance(
        &self,
        performance_id: i64,
    ) -> Result<u64, TicketingError> {
        let mut tx = self.state.db.pool.begin().await?;

        let hall_type: Option<HallType> =
            sqlx::query_scalar("SELECT hall_type FROM performances WHERE id = $1")
                .bind(performance_id)
                .fetch_optional(&mut *tx)
                .await?;
        let hall_type = hall_type.ok_or(TicketingError::PerformanceNotFound)?;

        let already: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM seats WHERE performance_id = $1)")
                .bind(performance_id)
                .fetch_one(&mut *tx)
                .await?;
        if already {
            return Err(TicketingError::AlreadyProvisioned(performance_id));
        }

        let created = sqlx::query(
            r#"
            INSERT INTO seats (performance_id, label, grade, price, status)
            SELECT $1, g.grade || '-' || n::text, g.grade, g.price, 'AVAILABLE'
            FROM seat_grades g
            CROSS JOIN LATERAL generate_series(1, g.seat_count) AS n
            WHERE g.hall_type = $2
            "#,
        )
        .bind(performance_id)
        .bind(hall_type)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        info!(performance_id, ?hall_type, created, "seats provisioned");
        Ok(created)
    }
}
