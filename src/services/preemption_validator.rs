//! Чистая валидация запроса на преемпцию и фильтр доступности.
//!
//! `validate_request` отсекает нелегальные запросы до открытия транзакции
//! с блокировками (fail fast, без побочных эффектов).
//! `filter_available` — авторитетный предикат доступности; он обязан
//! выполняться поверх уже заблокированных строк, а не до блокировки,
//! иначе между проверкой и захватом возможна гонка.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::error::TicketingError;
use crate::models::Seat;

/// Результат фильтрации: места, которые можно захватить, и id тех,
/// которые захватить нельзя (для отчета о частичном провале).
#[derive(Debug)]
pub struct AvailabilityPartition {
    pub available: Vec<Seat>,
    pub unavailable_ids: Vec<i64>,
}

/// Проверка легальности запроса: лимит удерживаемых мест на пользователя
/// и запрет повторного захвата уже удерживаемых им мест.
///
/// `held_seat_ids` — места, которые пользователь удерживает прямо сейчас
/// (только непросроченные лизы).
pub fn validate_request(
    requested: &[i64],
    held_seat_ids: &[i64],
    cap: u32,
) -> Result<(), TicketingError> {
    if requested.is_empty() {
        return Err(TicketingError::PreemptionEmptyRequest);
    }

    let unique: HashSet<i64> = requested.iter().copied().collect();
    if unique.len() != requested.len() {
        let mut seen = HashSet::new();
        let mut dup: Vec<i64> = requested
            .iter()
            .copied()
            .filter(|id| !seen.insert(*id))
            .collect();
        dup.sort_unstable();
        dup.dedup();
        return Err(TicketingError::PreemptionDuplicateSeat { seat_ids: dup });
    }

    let held: HashSet<i64> = held_seat_ids.iter().copied().collect();
    let mut already_held: Vec<i64> = unique.intersection(&held).copied().collect();
    if !already_held.is_empty() {
        already_held.sort_unstable();
        return Err(TicketingError::PreemptionDuplicateSeat { seat_ids: already_held });
    }

    if held.len() + requested.len() > cap as usize {
        return Err(TicketingError::PreemptionLimitExceeded {
            held: held.len(),
            requested: requested.len(),
            cap,
        });
    }

    Ok(())
}

/// Делит заблокированные строки на захватываемые и нет.
/// Место захватываемо, если оно принадлежит целевому представлению,
/// не зарезервировано и не находится под непросроченной чужой лизой.
pub fn filter_available(
    seats: Vec<Seat>,
    performance_id: i64,
    now: DateTime<Utc>,
) -> AvailabilityPartition {
    let mut available = Vec::with_capacity(seats.len());
    let mut unavailable_ids = Vec::new();

    for seat in seats {
        if seat.is_lockable(performance_id, now) {
            available.push(seat);
        } else {
            unavailable_ids.push(seat.id);
        }
    }

    unavailable_ids.sort_unstable();
    AvailabilityPartition { available, unavailable_ids }
}

/// Всё-или-ничего: запрос проходит, только если каждый запрошенный id
/// оказался в захватываемой части разбиения. Id, которых нет ни в одной
/// из частей (несуществующие места), попадают в отчет о недоступных.
pub fn require_full_availability(
    requested: &[i64],
    mut partition: AvailabilityPartition,
) -> Result<Vec<Seat>, TicketingError> {
    for &id in requested {
        if !partition.available.iter().any(|s| s.id == id)
            && !partition.unavailable_ids.contains(&id)
        {
            partition.unavailable_ids.push(id);
        }
    }

    if partition.available.len() != requested.len() {
        partition.unavailable_ids.sort_unstable();
        return Err(TicketingError::SeatsUnavailable {
            seat_ids: partition.unavailable_ids,
        });
    }

    Ok(partition.available)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::seat::test_support::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    #[test]
    fn request_within_cap_passes() {
        assert!(validate_request(&[1, 2, 3], &[], 5).is_ok());
        assert!(validate_request(&[4, 5], &[1, 2, 3], 5).is_ok());
    }

    #[test]
    fn request_over_cap_fails() {
        let err = validate_request(&[4, 5, 6], &[1, 2, 3], 5).unwrap_err();
        assert!(matches!(
            err,
            TicketingError::PreemptionLimitExceeded { held: 3, requested: 3, cap: 5 }
        ));
    }

    #[test]
    fn seat_already_held_by_same_user_is_rejected() {
        // Повторный захват не должен раздувать лимит.
        let err = validate_request(&[2, 9], &[1, 2, 3], 5).unwrap_err();
        match err {
            TicketingError::PreemptionDuplicateSeat { seat_ids } => {
                assert_eq!(seat_ids, vec![2]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_request_is_rejected() {
        let err = validate_request(&[], &[], 5).unwrap_err();
        assert!(matches!(err, TicketingError::PreemptionEmptyRequest));
    }

    #[test]
    fn repeated_ids_within_one_request_are_rejected() {
        let err = validate_request(&[1, 1, 2], &[], 5).unwrap_err();
        assert!(matches!(err, TicketingError::PreemptionDuplicateSeat { .. }));
    }

    #[test]
    fn filter_partitions_by_state_and_performance() {
        let now = Utc::now();
        let token = Uuid::new_v4();
        let seats = vec![
            available_seat(1, 1, 10000),
            // чужая непросроченная лиза
            preempted_seat(2, 1, 7, token, now + chrono::Duration::minutes(4)),
            // просроченная лиза считается свободной
            preempted_seat(3, 1, 7, token, now - chrono::Duration::seconds(1)),
            reserved_seat(4, 1, 42),
            // другое представление
            available_seat(5, 2, 10000),
        ];

        let partition = filter_available(seats, 1, now);
        let available_ids: Vec<i64> = partition.available.iter().map(|s| s.id).collect();
        assert_eq!(available_ids, vec![1, 3]);
        assert_eq!(partition.unavailable_ids, vec![2, 4, 5]);
    }

    #[test]
    fn full_availability_returns_the_locked_seats() {
        let partition = AvailabilityPartition {
            available: vec![available_seat(1, 1, 10000), available_seat(2, 1, 10000)],
            unavailable_ids: vec![],
        };

        let seats = require_full_availability(&[1, 2], partition).unwrap();
        let ids: Vec<i64> = seats.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn partially_unavailable_request_names_the_blockers() {
        let partition = AvailabilityPartition {
            available: vec![available_seat(1, 1, 10000)],
            unavailable_ids: vec![4],
        };

        let err = require_full_availability(&[1, 4], partition).unwrap_err();
        match err {
            TicketingError::SeatsUnavailable { seat_ids } => assert_eq!(seat_ids, vec![4]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nonexistent_seat_id_is_reported_as_unavailable() {
        // Id, не вернувшийся из SELECT ... FOR UPDATE, вообще не попадает
        // в разбиение; он всё равно должен провалить запрос целиком.
        let partition = AvailabilityPartition {
            available: vec![available_seat(1, 1, 10000)],
            unavailable_ids: vec![],
        };

        let err = require_full_availability(&[1, 999], partition).unwrap_err();
        match err {
            TicketingError::SeatsUnavailable { seat_ids } => assert_eq!(seat_ids, vec![999]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn competing_buyer_fails_until_lease_expires() {
        // Пользователь A удерживает [1,2,3]; запрос B на [2] проваливается,
        // называя место 2; после истечения лизы A место 2 снова доступно.
        let now = Utc::now();
        let token_a = Uuid::new_v4();
        let until = now + chrono::Duration::minutes(5);

        let seat2_locked = vec![preempted_seat(2, 1, 100, token_a, until)];
        let partition = filter_available(seat2_locked, 1, now);
        assert!(partition.available.is_empty());
        assert_eq!(partition.unavailable_ids, vec![2]);

        let after_expiry = until + chrono::Duration::seconds(1);
        let seat2_again = vec![preempted_seat(2, 1, 100, token_a, until)];
        let partition = filter_available(seat2_again, 1, after_expiry);
        assert_eq!(partition.available.len(), 1);
        assert!(partition.unavailable_ids.is_empty());
    }

    proptest! {
        // Фильтр — это разбиение: каждая входная строка попадает ровно
        // в одну из двух частей, ничего не теряется и не добавляется.
        #[test]
        fn filter_is_a_partition(ids in proptest::collection::btree_set(1i64..1000, 0..40)) {
            let now = Utc::now();
            let token = Uuid::new_v4();
            let seats: Vec<_> = ids
                .iter()
                .map(|&id| match id % 4 {
                    0 => available_seat(id, 1, 10000),
                    1 => preempted_seat(id, 1, 7, token, now + chrono::Duration::minutes(1)),
                    2 => preempted_seat(id, 1, 7, token, now - chrono::Duration::minutes(1)),
                    _ => reserved_seat(id, 1, 42),
                })
                .collect();

            let total = seats.len();
            let partition = filter_available(seats, 1, now);
            prop_assert_eq!(partition.available.len() + partition.unavailable_ids.len(), total);

            let mut seen: Vec<i64> = partition
                .available
                .iter()
                .map(|s| s.id)
                .chain(partition.unavailable_ids.iter().copied())
                .collect();
            seen.sort_unstable();
            let mut expected: Vec<i64> = ids.into_iter().collect();
            expected.sort_unstable();
            prop_assert_eq!(seen, expected);

            for seat in &partition.available {
                prop_assert!(seat.is_lockable(1, now));
            }
        }
    }
}
