pub mod coupon;
pub mod history;
pub mod points;
pub mod preemption;
pub mod preemption_validator;
pub mod provisioning;
pub mod release;
pub mod reservation;
pub mod reservation_validator;
