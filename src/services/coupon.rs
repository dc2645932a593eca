//! Коллаборатор купонов. Правила ценообразования скидок — не забота
//! движка: скидка хранится на купоне фиксированной суммой.

use sqlx::PgConnection;
use std::sync::Arc;

use crate::error::TicketingError;
use crate::AppState;

#[derive(Clone)]
pub struct CouponService {
    #[allow(dead_code)]
    state: Arc<AppState>,
}

impl CouponService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Считает скидку для (купон, пользователь, сумма). Купон блокируется
    /// `FOR UPDATE`, чтобы конкурирующие checkout'ы не потратили его дважды.
    /// Скидка не может превысить сумму заказа.
    pub async fn compute_discount(
        &self,
        conn: &mut PgConnection,
        coupon_id: i64,
        member_id: i64,
        total_amount: i64,
    ) -> Result<i64, TicketingError> {
        let row: Option<(i64, bool)> = sqlx::query_as(
            "SELECT discount_amount, used FROM coupons WHERE id = $1 AND member_id = $2 FOR UPDATE",
        )
        .bind(coupon_id)
        .bind(member_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            None => Err(TicketingError::CouponRejected(format!(
                "coupon {} not found for this member",
                coupon_id
            ))),
            Some((_, true)) => Err(TicketingError::CouponRejected(format!(
                "coupon {} already used",
                coupon_id
            ))),
            Some((discount, false)) => Ok(discount.min(total_amount)),
        }
    }

    /// Помечает купон использованным. Условный UPDATE делает погашение
    /// одноразовым: повторная попытка не находит строку.
    pub async fn mark_used(
        &self,
        conn: &mut PgConnection,
        coupon_id: i64,
        member_id: i64,
    ) -> Result<(), TicketingError> {
        let affected = sqlx::query(
            "UPDATE coupons SET used = TRUE, used_at = NOW()
             WHERE id = $1 AND member_id = $2 AND used = FALSE",
        )
        .bind(coupon_id)
        .bind(member_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(TicketingError::CouponRejected(format!(
                "coupon {} already used",
                coupon_id
            )));
        }
        Ok(())
    }
}
