//! Коллаборатор балльного счёта. Движок мест не знает, как баллы
//! начисляются маркетингом, — только что списание и возврат атомарны.
//! Каждое движение попадает в append-only журнал point_transactions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection};
use std::sync::Arc;

use crate::error::TicketingError;
use crate::AppState;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PointMovement {
    pub id: i64,
    pub member_id: i64,
    pub amount: i64,
    pub balance_after: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Достаточно ли баланса для списания. Отсутствующий кошелёк участвует
/// как нулевой баланс: нулевое списание с него проходит.
fn ensure_covers(available: i64, required: i64) -> Result<(), TicketingError> {
    if available < required {
        return Err(TicketingError::InsufficientPoints { required, available });
    }
    Ok(())
}

#[derive(Clone)]
pub struct PointService {
    state: Arc<AppState>,
}

impl PointService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Текущий баланс; отсутствие кошелька читается как ноль.
    pub async fn current_balance(&self, member_id: i64) -> Result<i64, TicketingError> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM point_wallets WHERE member_id = $1")
                .bind(member_id)
                .fetch_optional(&self.state.db.pool)
                .await?;
        Ok(balance.unwrap_or(0))
    }

    /// Списывает баллы внутри переданной транзакции. Кошелёк блокируется
    /// `FOR UPDATE`, так что конкурирующие списания сериализуются строкой.
    /// Нулевое списание (купон покрыл всю сумму) легально и для участника
    /// без кошелька, поэтому запись делается upsert'ом, как в `credit`.
    pub async fn deduct(
        &self,
        conn: &mut PgConnection,
        member_id: i64,
        amount: i64,
        reason: &str,
    ) -> Result<PointMovement, TicketingError> {
        let available: i64 =
            sqlx::query_scalar("SELECT balance FROM point_wallets WHERE member_id = $1 FOR UPDATE")
                .bind(member_id)
                .fetch_optional(&mut *conn)
                .await?
                .unwrap_or(0);

        ensure_covers(available, amount)?;

        let balance_after: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO point_wallets (member_id, balance)
            VALUES ($1, 0)
            ON CONFLICT (member_id)
            DO UPDATE SET balance = point_wallets.balance - $2
            RETURNING balance
            "#,
        )
        .bind(member_id)
        .bind(amount)
        .fetch_one(&mut *conn)
        .await?;

        self.record_movement(conn, member_id, -amount, balance_after, reason).await
    }

    /// Возврат/начисление. Создает кошелёк, если его ещё нет.
    pub async fn credit(
        &self,
        conn: &mut PgConnection,
        member_id: i64,
        amount: i64,
        reason: &str,
    ) -> Result<PointMovement, TicketingError> {
        let balance_after: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO point_wallets (member_id, balance)
            VALUES ($1, $2)
            ON CONFLICT (member_id)
            DO UPDATE SET balance = point_wallets.balance + EXCLUDED.balance
            RETURNING balance
            "#,
        )
        .bind(member_id)
        .bind(amount)
        .fetch_one(&mut *conn)
        .await?;

        self.record_movement(conn, member_id, amount, balance_after, reason).await
    }

    async fn record_movement(
        &self,
        conn: &mut PgConnection,
        member_id: i64,
        amount: i64,
        balance_after: i64,
        reason: &str,
    ) -> Result<PointMovement, TicketingError> {
        let movement = sqlx::query_as::<_, PointMovement>(
            r#"
            INSERT INTO point_transactions (member_id, amount, balance_after, reason)
            VALUES ($1, $2, $3, $4)
            RETURNING id, member_id, amount, balance_after, reason, created_at
            "#,
        )
        .bind(member_id)
        .bind(amount)
        .bind(balance_after)
        .bind(reason)
        .fetch_one(&mut *conn)
        .await?;

        Ok(movement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_deduction_passes_without_a_wallet() {
        // Купон может покрыть всю сумму заказа: списание нуля обязано
        // проходить и для участника, у которого кошелька ещё нет.
        assert!(ensure_covers(0, 0).is_ok());
    }

    #[test]
    fn balance_must_cover_the_deduction() {
        assert!(ensure_covers(50000, 40000).is_ok());

        let err = ensure_covers(100, 40000).unwrap_err();
        assert!(matches!(
            err,
            TicketingError::InsufficientPoints { required: 40000, available: 100 }
        ));
    }
}
