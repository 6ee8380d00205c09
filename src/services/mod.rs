pub mod booking_service;
pub mod payment_service;
pub mod seat_layout;
pub mod seat_service;
