//! Фоновая очистка просроченных лиз.
//!
//! Один массовый условный UPDATE, а не построчный обход: стоимость прохода
//! не зависит от числа истёкших лиз, а WHERE по `preempted_until` видит
//! только закоммиченные строки, так что sweep безопасен рядом с живыми
//! транзакциями преемпции. Идемпотентен: пустой проход — no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::TicketingError;
use crate::AppState;

pub struct PreemptionReleaser {
    state: Arc<AppState>,
    sweeping: AtomicBool,
}

impl PreemptionReleaser {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            sweeping: AtomicBool::new(false),
        }
    }

    /// Снимает все просроченные лизы одним statement'ом.
    /// Возвращает число освобожденных мест.
    pub async fn release_expired(&self) -> Result<u64, TicketingError> {
        let released = sqlx::query(
            "UPDATE seats
             SET status = 'AVAILABLE',
                 preempt_owner_id = NULL,
                 preemption_token = NULL,
                 preempted_at = NULL,
                 preempted_until = NULL
             WHERE status = 'PREEMPTED' AND preempted_until < NOW()",
        )
        .execute(&self.state.db.pool)
        .await?
        .rows_affected();

        Ok(released)
    }

    /// Один проход планировщика. Пересекающиеся вызовы пропускаются,
    /// а не накапливаются: флаг снимается после завершения работы.
    pub async fn sweep(&self) {
        if self.sweeping.swap(true, Ordering::Acquire) {
            warn!("release sweep still in progress, skipping this tick");
            return;
        }

        match self.release_expired().await {
            Ok(0) => debug!("release sweep: nothing expired"),
            Ok(released) => info!("release sweep: released {} expired seat leases", released),
            Err(e) => error!("release sweep failed: {:?}", e),
        }

        self.sweeping.store(false, Ordering::Release);
    }

    /// Вечный цикл по фиксированному интервалу; запускается из main
    /// отдельной tokio-задачей, вне потоков обработки запросов.
    pub async fn run_scheduler(self: Arc<Self>) {
        let period = Duration::from_secs(self.state.config.lease.sweep_interval_secs);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("release scheduler started with period {:?}", period);
        loop {
            interval.tick().await;
            self.sweep().await;
        }
    }
}
