use serde::{Deserialize, Serialize};

pub mod booking;
pub mod payment;
pub mod seat;
pub mod user;

// Envelope for successful API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct WebResponse<T> {
    pub data: T,
}

impl<T> WebResponse<T> {
    pub fn new(data: T) -> Self {
        WebResponse { data }
    }
}
