use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "seat_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SeatStatus {
    Available,
    Preempted,
    Reserved,
}

/// Одна строка на физическое место конкретного представления.
/// Поля лизы заполнены только пока status = PREEMPTED,
/// reservation_id — только пока status = RESERVED.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub performance_id: i64,
    pub label: String,
    pub grade: String,
    pub price: i64,
    pub status: SeatStatus,
    pub preempt_owner_id: Option<i64>,
    pub preemption_token: Option<Uuid>,
    pub preempted_at: Option<DateTime<Utc>>,
    pub preempted_until: Option<DateTime<Utc>>,
    pub reservation_id: Option<i64>,
}

/// Взаимоисключающие состояния места как размеченное объединение.
/// Валидаторы работают с этим представлением, а не с сырыми колонками.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatState {
    Available,
    Preempted {
        owner_id: i64,
        token: Uuid,
        until: DateTime<Utc>,
    },
    Reserved {
        reservation_id: i64,
    },
}

impl Seat {
    pub fn state(&self) -> SeatState {
        match self.status {
            SeatStatus::Available => SeatState::Available,
            SeatStatus::Preempted => {
                match (self.preempt_owner_id, self.preemption_token, self.preempted_until) {
                    (Some(owner_id), Some(token), Some(until)) => SeatState::Preempted {
                        owner_id,
                        token,
                        until,
                    },
                    // Строка нарушает инвариант состояния; считаем место свободным,
                    // как и при истёкшей лизе.
                    _ => SeatState::Available,
                }
            }
            SeatStatus::Reserved => match self.reservation_id {
                Some(reservation_id) => SeatState::Reserved { reservation_id },
                None => SeatState::Available,
            },
        }
    }

    /// Истинно, если лиза на месте просрочена, но sweep её ещё не очистил.
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state(), SeatState::Preempted { until, .. } if until <= now)
    }

    /// Авторитетный предикат "может ли покупатель взять это место сейчас".
    /// Просроченная лиза считается свободной независимо от `status`.
    pub fn is_lockable(&self, performance_id: i64, now: DateTime<Utc>) -> bool {
        if self.performance_id != performance_id {
            return false;
        }
        match self.state() {
            SeatState::Available => true,
            SeatState::Preempted { until, .. } => until <= now,
            SeatState::Reserved { .. } => false,
        }
    }

    /// Статус, который видят пути чтения: просроченная лиза отображается
    /// как AVAILABLE ещё до прохода Releaser'а.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SeatStatus {
        if self.lease_expired(now) {
            SeatStatus::Available
        } else {
            self.status
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn available_seat(id: i64, performance_id: i64, price: i64) -> Seat {
        Seat {
            id,
            performance_id,
            label: format!("R-{}", id),
            grade: "R".to_string(),
            price,
            status: SeatStatus::Available,
            preempt_owner_id: None,
            preemption_token: None,
            preempted_at: None,
            preempted_until: None,
            reservation_id: None,
        }
    }

    pub fn preempted_seat(
        id: i64,
        performance_id: i64,
        owner_id: i64,
        token: Uuid,
        until: DateTime<Utc>,
    ) -> Seat {
        Seat {
            status: SeatStatus::Preempted,
            preempt_owner_id: Some(owner_id),
            preemption_token: Some(token),
            preempted_at: Some(until - chrono::Duration::minutes(5)),
            preempted_until: Some(until),
            ..available_seat(id, performance_id, 10000)
        }
    }

    pub fn reserved_seat(id: i64, performance_id: i64, reservation_id: i64) -> Seat {
        Seat {
            status: SeatStatus::Reserved,
            reservation_id: Some(reservation_id),
            ..available_seat(id, performance_id, 10000)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn state_reflects_populated_field_group() {
        let now = Utc::now();
        let token = Uuid::new_v4();

        assert_eq!(available_seat(1, 1, 10000).state(), SeatState::Available);

        let seat = preempted_seat(2, 1, 7, token, now + chrono::Duration::minutes(5));
        assert!(matches!(
            seat.state(),
            SeatState::Preempted { owner_id: 7, .. }
        ));

        let seat = reserved_seat(3, 1, 42);
        assert_eq!(seat.state(), SeatState::Reserved { reservation_id: 42 });
    }

    #[test]
    fn expired_lease_is_logically_available() {
        let now = Utc::now();
        let seat = preempted_seat(1, 1, 7, Uuid::new_v4(), now - chrono::Duration::seconds(1));

        // status всё ещё PREEMPTED, но пути чтения обязаны видеть AVAILABLE
        assert_eq!(seat.status, SeatStatus::Preempted);
        assert!(seat.lease_expired(now));
        assert!(seat.is_lockable(1, now));
        assert_eq!(seat.effective_status(now), SeatStatus::Available);
    }

    #[test]
    fn unexpired_lease_blocks_other_buyers() {
        let now = Utc::now();
        let seat = preempted_seat(1, 1, 7, Uuid::new_v4(), now + chrono::Duration::minutes(4));

        assert!(!seat.is_lockable(1, now));
        assert_eq!(seat.effective_status(now), SeatStatus::Preempted);
    }

    #[test]
    fn reserved_seat_is_never_lockable() {
        let now = Utc::now();
        let seat = reserved_seat(1, 1, 42);
        assert!(!seat.is_lockable(1, now));
    }

    #[test]
    fn seat_from_another_performance_is_not_lockable() {
        let now = Utc::now();
        let seat = available_seat(1, 2, 10000);
        assert!(!seat.is_lockable(1, now));
    }
}
