//! Отмена оплаченной брони: места возвращаются в AVAILABLE, полная
//! стоимость возвращается баллами. Тот же нон-throwing контракт, что и
//! у завершения брони, и по той же причине.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::TicketingError;
use crate::models::ReservationStatus;
use crate::services::points::PointService;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CancellationReceipt {
    pub reservation_id: i64,
    pub refunded_amount: i64,
    pub released_seat_ids: Vec<i64>,
}

#[derive(Debug)]
pub enum CancellationOutcome {
    Canceled(CancellationReceipt),
    Rejected(TicketingError),
}

// Бронь вместе с временем начала представления, для проверки отменяемости.
#[derive(Debug, FromRow)]
struct CancellableRow {
    member_id: i64,
    total_price: i64,
    status: ReservationStatus,
    starts_at: DateTime<Utc>,
}

/// Отменять можно только оплаченную бронь на ещё не начавшееся
/// представление; после старта бронь терминальна.
pub fn is_cancellable(
    status: ReservationStatus,
    starts_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    status == ReservationStatus::Paid && starts_at > now
}

#[derive(Clone)]
pub struct ReservationHistoryService {
    state: Arc<AppState>,
    points: PointService,
}

impl ReservationHistoryService {
    pub fn new(state: Arc<AppState>) -> Self {
        let points = PointService::new(state.clone());
        Self { state, points }
    }

    pub async fn cancel_reservation(
        &self,
        reservation_id: i64,
        member_id: i64,
    ) -> CancellationOutcome {
        match self.try_cancel(reservation_id, member_id).await {
            Ok(receipt) => {
                info!(
                    member_id,
                    reservation_id,
                    refunded = receipt.refunded_amount,
                    "reservation canceled"
                );
                CancellationOutcome::Canceled(receipt)
            }
            Err(e) => {
                match &e {
                    TicketingError::Database(db) => {
                        error!(member_id, reservation_id, "cancellation failed: {:?}", db)
                    }
                    other => warn!(member_id, reservation_id, "cancellation rejected: {}", other),
                }
                CancellationOutcome::Rejected(e)
            }
        }
    }

    async fn try_cancel(
        &self,
        reservation_id: i64,
        member_id: i64,
    ) -> Result<CancellationReceipt, TicketingError> {
        let mut tx = self.state.db.pool.begin().await?;

        // 1. Загрузка сразу с проверкой владельца: чужая бронь
        // неотличима от несуществующей.
        let row: Option<CancellableRow> = sqlx::query_as(
            r#"
            SELECT r.member_id, r.total_price, r.status, p.starts_at
            FROM reservations r
            JOIN performances p ON p.id = r.performance_id
            WHERE r.id = $1 AND r.member_id = $2
            FOR UPDATE OF r
            "#,
        )
        .bind(reservation_id)
        .bind(member_id)
        .fetch_optional(&mut *tx)
        .await?;

        let reservation = row.ok_or(TicketingError::ReservationNotFound)?;

        // 2. Отменяема только оплаченная бронь на будущее представление.
        if !is_cancellable(reservation.status, reservation.starts_at, Utc::now()) {
            return Err(TicketingError::NotCancellable);
        }

        // 3. Все места брони обратно в AVAILABLE; заодно чистим любые
        // случайно выжившие поля лизы.
        let released_seat_ids: Vec<i64> = sqlx::query_scalar(
            "UPDATE seats
             SET status = 'AVAILABLE',
                 reservation_id = NULL,
                 preempt_owner_id = NULL,
                 preemption_token = NULL,
                 preempted_at = NULL,
                 preempted_until = NULL
             WHERE reservation_id = $1
             RETURNING id",
        )
        .bind(reservation_id)
        .fetch_all(&mut *tx)
        .await?;

        // 4. PAID -> CANCELED.
        sqlx::query(
            "UPDATE reservations SET status = 'CANCELED', status_changed_at = NOW() WHERE id = $1",
        )
        .bind(reservation_id)
        .execute(&mut *tx)
        .await?;

        // 5. Возврат полной уплаченной стоимости баллами.
        self.points
            .credit(
                &mut *tx,
                reservation.member_id,
                reservation.total_price,
                "reservation refund",
            )
            .await?;

        tx.commit().await?;

        Ok(CancellationReceipt {
            reservation_id,
            refunded_amount: reservation.total_price,
            released_seat_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_future_reservation_is_cancellable() {
        let now = Utc::now();
        assert!(is_cancellable(
            ReservationStatus::Paid,
            now + chrono::Duration::hours(2),
            now
        ));
    }

    #[test]
    fn started_performance_is_terminal() {
        let now = Utc::now();
        assert!(!is_cancellable(
            ReservationStatus::Paid,
            now - chrono::Duration::minutes(1),
            now
        ));
    }

    #[test]
    fn canceled_reservation_cannot_be_canceled_again() {
        let now = Utc::now();
        assert!(!is_cancellable(
            ReservationStatus::Canceled,
            now + chrono::Duration::hours(2),
            now
        ));
    }
}
