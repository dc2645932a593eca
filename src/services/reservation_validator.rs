//! Валидация конверсии лизы в бронь. Проверки выполняются поверх строк,
//! уже захваченных `FOR UPDATE`, — та же дисциплина lock-then-validate,
//! что и у преемпции.

use chrono::{DateTime, Utc};

use crate::error::TicketingError;
use crate::models::{Seat, SeatState};

/// Лиза годна к конверсии, если набор мест по токену непуст, все места
/// принадлежат запрашивающему пользователю и ни одна лиза не просрочена.
/// Просрочка судится сравнением timestamp'ов, а не по `status`: интервал
/// sweep'а означает, что лиза может быть логически мертва до физической
/// очистки.
pub fn validate_preempted_seats(
    seats: &[Seat],
    member_id: i64,
    now: DateTime<Utc>,
) -> Result<(), TicketingError> {
    if seats.is_empty() {
        return Err(TicketingError::PreemptionTokenInvalid);
    }

    for seat in seats {
        match seat.state() {
            SeatState::Preempted { owner_id, .. } if owner_id != member_id => {
                return Err(TicketingError::PreemptionPermissionDenied);
            }
            _ => {}
        }
    }

    for seat in seats {
        match seat.state() {
            SeatState::Preempted { until, .. } if until <= now => {
                return Err(TicketingError::PreemptionExpired);
            }
            _ => {}
        }
    }

    for seat in seats {
        match seat.state() {
            // Структурно невозможно при соблюдении инварианта состояния,
            // но проверяется на случай гонки.
            SeatState::Reserved { .. } => return Err(TicketingError::AlreadyReserved),
            // Строка с токеном, но без живой лизы: токен уже отозван.
            SeatState::Available => return Err(TicketingError::PreemptionExpired),
            SeatState::Preempted { .. } => {}
        }
    }

    Ok(())
}

/// Сумма, посчитанная сервером по заблокированным строкам.
pub fn total_price(seats: &[Seat]) -> i64 {
    seats.iter().map(|s| s.price).sum()
}

/// Клиентская сумма обязана совпасть с серверной — защита от
/// подменённого клиента, пытающегося недоплатить.
pub fn validate_payment_amount(quoted: i64, computed: i64) -> Result<(), TicketingError> {
    if quoted != computed {
        return Err(TicketingError::AmountMismatch { quoted, computed });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::seat::test_support::*;
    use uuid::Uuid;

    #[test]
    fn empty_seat_set_means_unknown_token() {
        let err = validate_preempted_seats(&[], 7, Utc::now()).unwrap_err();
        assert!(matches!(err, TicketingError::PreemptionTokenInvalid));
    }

    #[test]
    fn foreign_lease_is_denied() {
        let now = Utc::now();
        let token = Uuid::new_v4();
        let seats = vec![
            preempted_seat(1, 1, 7, token, now + chrono::Duration::minutes(4)),
            preempted_seat(2, 1, 8, token, now + chrono::Duration::minutes(4)),
        ];
        let err = validate_preempted_seats(&seats, 7, now).unwrap_err();
        assert!(matches!(err, TicketingError::PreemptionPermissionDenied));
    }

    #[test]
    fn expired_lease_fails_even_before_sweep() {
        let now = Utc::now();
        // status всё ещё PREEMPTED — решает только timestamp
        let seats = vec![preempted_seat(1, 1, 7, Uuid::new_v4(), now - chrono::Duration::seconds(5))];
        let err = validate_preempted_seats(&seats, 7, now).unwrap_err();
        assert!(matches!(err, TicketingError::PreemptionExpired));
    }

    #[test]
    fn already_reserved_seat_is_rejected_defensively() {
        let now = Utc::now();
        let token = Uuid::new_v4();
        let seats = vec![
            preempted_seat(1, 1, 7, token, now + chrono::Duration::minutes(4)),
            reserved_seat(2, 1, 42),
        ];
        let err = validate_preempted_seats(&seats, 7, now).unwrap_err();
        assert!(matches!(err, TicketingError::AlreadyReserved));
    }

    #[test]
    fn valid_lease_passes() {
        let now = Utc::now();
        let token = Uuid::new_v4();
        let seats = vec![
            preempted_seat(1, 1, 7, token, now + chrono::Duration::minutes(4)),
            preempted_seat(2, 1, 7, token, now + chrono::Duration::minutes(4)),
        ];
        assert!(validate_preempted_seats(&seats, 7, now).is_ok());
    }

    #[test]
    fn amount_mismatch_is_rejected() {
        let seats = vec![available_seat(1, 1, 15000), available_seat(2, 1, 25000)];
        assert_eq!(total_price(&seats), 40000);
        assert!(validate_payment_amount(40000, total_price(&seats)).is_ok());

        let err = validate_payment_amount(30000, 40000).unwrap_err();
        assert!(matches!(
            err,
            TicketingError::AmountMismatch { quoted: 30000, computed: 40000 }
        ));
    }
}
