use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::services::seat_layout::SeatPattern;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Seat {
    pub id: i32,
    pub carriage_id: i32,
    pub seat_number: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Carriage {
    pub id: i32,
    pub train_id: i32,
    pub carriage_number: i32,
    pub carriage_type: String,
    pub seat_capacity: i32,
}

// One seat joined with its carriage and, for a schedule, the ticket holding it
#[derive(Debug, sqlx::FromRow)]
pub struct SeatOccupancyRow {
    pub id: i32,
    pub carriage_id: i32,
    pub seat_number: String,
    pub carriage_number: i32,
    pub carriage_type: String,
    pub ticket_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatResponse {
    pub id: i32,
    pub carriage_id: i32,
    pub seat_number: String,
}

impl From<Seat> for SeatResponse {
    fn from(seat: Seat) -> Self {
        SeatResponse {
            id: seat.id,
            carriage_id: seat.carriage_id,
            seat_number: seat.seat_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarriageSummary {
    pub id: i32,
    pub carriage_number: i32,
    pub carriage_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatAvailabilityResponse {
    pub id: i32,
    pub carriage_id: i32,
    pub seat_number: String,
    pub is_available: bool,
    pub is_booked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<i32>,
    pub carriage: CarriageSummary,
}

impl From<SeatOccupancyRow> for SeatAvailabilityResponse {
    fn from(row: SeatOccupancyRow) -> Self {
        SeatAvailabilityResponse {
            id: row.id,
            carriage_id: row.carriage_id,
            seat_number: row.seat_number,
            is_available: row.ticket_id.is_none(),
            is_booked: row.ticket_id.is_some(),
            ticket_id: row.ticket_id,
            carriage: CarriageSummary {
                id: row.carriage_id,
                carriage_number: row.carriage_number,
                carriage_type: row.carriage_type,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CarriageAvailability {
    pub id: i32,
    pub carriage_number: i32,
    pub carriage_type: String,
    pub total_seats: usize,
    pub available_seats: usize,
    pub seats: Vec<SeatAvailabilityResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainSeatAvailabilityResponse {
    pub train_id: i32,
    pub total_seats: usize,
    pub available_seats: usize,
    pub booked_seats: usize,
    pub carriages: Vec<CarriageAvailability>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SeatLayoutEntry {
    pub id: i32,
    pub seat_number: String,
    pub row: i32,
    pub position: char,
    pub is_window: bool,
    pub is_aisle: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeatLayoutResponse {
    pub carriage_id: i32,
    pub carriage_type: String,
    pub seat_capacity: i32,
    pub layout_pattern: String,
    pub seats: Vec<SeatLayoutEntry>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateSeatsRequest {
    #[validate(custom(function = "validate_seat_pattern"))]
    pub seat_pattern: String,
    #[validate(range(min = 1, max = 50, message = "rows must be between 1 and 50"))]
    pub rows: i32,
    #[validate(range(min = 1, max = 9999, message = "start_row must be between 1 and 9999"))]
    pub start_row: Option<i32>,
}

impl GenerateSeatsRequest {
    pub fn start_row(&self) -> i32 {
        self.start_row.unwrap_or(1)
    }
}

fn validate_seat_pattern(pattern: &str) -> Result<(), ValidationError> {
    match pattern.parse::<SeatPattern>() {
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::new("seat_pattern")
            .with_message("Invalid seat pattern. Use format like 2+2, 2+3".into())),
    }
}
