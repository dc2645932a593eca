//! reservation.rs
//!
//! Конверсия лизы в оплаченную бронь — единственный способ, которым
//! место переходит PREEMPTED -> RESERVED.
//!
//! Весь checkout идет в одной транзакции: захват строк мест по токену
//! (`FOR UPDATE`), повторная валидация лизы, пересчет суммы, скидка
//! купона, списание баллов, вставка брони и перевод мест в RESERVED.
//! Сбой любого шага откатывает всё: брони нет, места остаются под лизой
//! до её собственного TTL.
//!
//! Контракт нон-throwing: наружу уходит типизированный
//! `CompletionOutcome`, а не неожиданная ошибка — в платёжных потоках
//! неоднозначное состояние ("списалось или нет?") хуже явного отказа.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::TicketingError;
use crate::models::Seat;
use crate::services::coupon::CouponService;
use crate::services::points::PointService;
use crate::services::reservation_validator;
use crate::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct ReservedSeatSummary {
    pub id: i64,
    pub label: String,
    pub grade: String,
    pub price: i64,
}

#[derive(Debug, Serialize)]
pub struct CompletionReceipt {
    pub reservation_id: i64,
    pub reserved_seats: Vec<ReservedSeatSummary>,
    pub total_charged: i64,
    pub discount: i64,
    pub remaining_points: i64,
}

/// Результат завершения брони: успех с квитанцией либо структурный отказ
/// с кодом и сообщением. Исключений этот сервис не пробрасывает.
#[derive(Debug)]
pub enum CompletionOutcome {
    Completed(CompletionReceipt),
    Rejected(TicketingError),
}

#[derive(Clone)]
pub struct ReservationService {
    state: Arc<AppState>,
    points: PointService,
    coupons: CouponService,
}

impl ReservationService {
    pub fn new(state: Arc<AppState>) -> Self {
        let points = PointService::new(state.clone());
        let coupons = CouponService::new(state.clone());
        Self { state, points, coupons }
    }

    pub async fn complete_reservation(
        &self,
        member_id: i64,
        token: Uuid,
        coupon_id: Option<i64>,
        quoted_total: i64,
    ) -> CompletionOutcome {
        match self.try_complete(member_id, token, coupon_id, quoted_total).await {
            Ok(receipt) => {
                info!(
                    member_id,
                    reservation_id = receipt.reservation_id,
                    charged = receipt.total_charged,
                    "reservation completed"
                );
                CompletionOutcome::Completed(receipt)
            }
            Err(e) => {
                match &e {
                    TicketingError::Database(db) => {
                        error!(member_id, %token, "reservation completion failed: {:?}", db)
                    }
                    other => warn!(member_id, %token, "reservation rejected: {}", other),
                }
                CompletionOutcome::Rejected(e)
            }
        }
    }

    async fn try_complete(
        &self,
        member_id: i64,
        token: Uuid,
        coupon_id: Option<i64>,
        quoted_total: i64,
    ) -> Result<CompletionReceipt, TicketingError> {
        let mut tx = self.state.db.pool.begin().await?;

        // 1. Захват строк по токену. Порядок по id — тот же общий порядок
        // блокировок, что и у преемпции.
        let seats: Vec<Seat> = sqlx::query_as(
            "SELECT * FROM seats WHERE preemption_token = $1 ORDER BY id FOR UPDATE",
        )
        .bind(token)
        .fetch_all(&mut *tx)
        .await?;

        // 2. Лиза всё ещё жива, принадлежит покупателю и не потреблена.
        let now = chrono::Utc::now();
        reservation_validator::validate_preempted_seats(&seats, member_id, now)?;

        // 3. Сумма считается по заблокированным строкам и сверяется с клиентской.
        let total = reservation_validator::total_price(&seats);
        reservation_validator::validate_payment_amount(quoted_total, total)?;

        // 4. Скидка купона (если он предъявлен).
        let discount = match coupon_id {
            Some(cid) => {
                self.coupons
                    .compute_discount(&mut *tx, cid, member_id, total)
                    .await?
            }
            None => 0,
        };
        let amount_due = total - discount;

        // 5-6. Погашение купона и списание баллов. Оба шага внутри этой же
        // транзакции: их сбой не оставляет никаких следов в строках мест.
        if let Some(cid) = coupon_id {
            self.coupons.mark_used(&mut *tx, cid, member_id).await?;
        }
        let movement = self
            .points
            .deduct(&mut *tx, member_id, amount_due, "reservation payment")
            .await?;

        // 7. Бронь и перевод всех мест лизы в RESERVED одним statement'ом.
        let performance_id = seats[0].performance_id;
        let reservation_id: i64 = sqlx::query_scalar(
            "INSERT INTO reservations (member_id, performance_id, status, total_price)
             VALUES ($1, $2, 'PAID', $3)
             RETURNING id",
        )
        .bind(member_id)
        .bind(performance_id)
        .bind(amount_due)
        .fetch_one(&mut *tx)
        .await?;

        let seat_ids: Vec<i64> = seats.iter().map(|s| s.id).collect();
        sqlx::query(
            "UPDATE seats
             SET status = 'RESERVED',
                 reservation_id = $1,
                 preempt_owner_id = NULL,
                 preemption_token = NULL,
                 preempted_at = NULL,
                 preempted_until = NULL
             WHERE id = ANY($2)",
        )
        .bind(reservation_id)
        .bind(&seat_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CompletionReceipt {
            reservation_id,
            reserved_seats: seats
                .into_iter()
                .map(|s| ReservedSeatSummary {
                    id: s.id,
                    label: s.label,
                    grade: s.grade,
                    price: s.price,
                })
                .collect(),
            total_charged: amount_due,
            discount,
            remaining_points: movement.balance_after,
        })
    }
}
