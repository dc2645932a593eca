pub mod performances;
pub mod points;
pub mod reservations;
pub mod seats;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(performances::routes())
        .merge(seats::routes())
        .merge(reservations::routes())
        .merge(points::routes())
}

/// OFFSET для страницы: расширяем до i64 до умножения,
/// иначе page = u32::MAX переполняет u32.
pub(crate) fn page_offset(page: u32, page_size: u32) -> i64 {
    (page.max(1) as i64 - 1) * page_size as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_offset_is_zero_based_and_never_overflows() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        // page=0 трактуем как первую страницу
        assert_eq!(page_offset(0, 20), 0);
        assert_eq!(page_offset(u32::MAX, 100), (u32::MAX as i64 - 1) * 100);
    }
}
