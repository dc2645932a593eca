//! Сервис преемпции мест: единственный путь, которым место переходит
//! AVAILABLE -> PREEMPTED.
//!
//! Дисциплина: сначала быстрая валидация без блокировок, затем одна
//! транзакция, в которой запрошенные строки захватываются `FOR UPDATE`
//! в порядке возрастания id (общий порядок для всех вызывающих сторон —
//! это и предотвращает дедлок при пересекающихся наборах мест), затем
//! повторная фильтрация уже заблокированных строк. Всё-или-ничего:
//! запрос, который не может пройти целиком, не захватывает ни одного места.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::TicketingError;
use crate::models::Seat;
use crate::services::preemption_validator;
use crate::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct PreemptedSeatSummary {
    pub id: i64,
    pub label: String,
    pub grade: String,
    pub price: i64,
}

/// Успешный захват: токен лизы, её срок и сводка по каждому месту.
#[derive(Debug, Serialize)]
pub struct PreemptionGrant {
    pub token: Uuid,
    pub expires_at: DateTime<Utc>,
    pub seats: Vec<PreemptedSeatSummary>,
}

#[derive(Clone)]
pub struct SeatPreemptionService {
    state: Arc<AppState>,
}

impl SeatPreemptionService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn preempt_seats(
        &self,
        performance_id: i64,
        seat_ids: &[i64],
        member_id: i64,
    ) -> Result<PreemptionGrant, TicketingError> {
        // 1. Быстрая проверка лимита/дубликатов до открытия транзакции.
        let held: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM seats
             WHERE preempt_owner_id = $1 AND status = 'PREEMPTED' AND preempted_until > NOW()",
        )
        .bind(member_id)
        .fetch_all(&self.state.db.pool)
        .await?;

        preemption_validator::validate_request(
            seat_ids,
            &held,
            self.state.config.lease.max_seats_per_user,
        )?;

        let mut tx = self.state.db.pool.begin().await?;

        // 2. Эксклюзивные блокировки строк, детерминированный порядок по id.
        let locked: Vec<Seat> = sqlx::query_as(
            "SELECT * FROM seats WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(seat_ids)
        .fetch_all(&mut *tx)
        .await?;

        // 3. Повторная фильтрация на заблокированных строках.
        let now = Utc::now();
        let partition = preemption_validator::filter_available(locked, performance_id, now);
        let granted = match preemption_validator::require_full_availability(seat_ids, partition) {
            Ok(seats) => seats,
            Err(err) => {
                let _ = tx.rollback().await;
                return Err(err);
            }
        };

        // 4. Штамп лизы: один токен, один владелец, один срок на весь набор.
        let token = Uuid::new_v4();
        let expires_at = now + self.state.config.lease.lease_duration();

        sqlx::query(
            "UPDATE seats
             SET status = 'PREEMPTED',
                 preempt_owner_id = $1,
                 preemption_token = $2,
                 preempted_at = $3,
                 preempted_until = $4
             WHERE id = ANY($5)",
        )
        .bind(member_id)
        .bind(token)
        .bind(now)
        .bind(expires_at)
        .bind(seat_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            member_id,
            performance_id,
            seats = seat_ids.len(),
            %token,
            "seats preempted until {}",
            expires_at
        );

        Ok(PreemptionGrant {
            token,
            expires_at,
            seats: granted
                .into_iter()
                .map(|s| PreemptedSeatSummary {
                    id: s.id,
                    label: s.label,
                    grade: s.grade,
                    price: s.price,
                })
                .collect(),
        })
    }
}
