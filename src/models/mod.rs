pub mod coupon;
pub mod member;
pub mod performance;
pub mod reservation;
pub mod seat;

pub use coupon::Coupon;
pub use member::Member;
pub use performance::{HallType, Performance};
pub use reservation::{Reservation, ReservationStatus};
pub use seat::{Seat, SeatState, SeatStatus};
