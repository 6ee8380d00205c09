use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum_macros::{AsRefStr, Display, EnumString};
use validator::{Validate, ValidationError};

pub const MAX_TICKETS_PER_BOOKING: usize = 10;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TicketStatus {
    Booked,
    PendingPayment,
    Paid,
    Canceled,
}

impl TryFrom<String> for TicketStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    XenditInvoice,
    BankTransfer,
}

impl PaymentMethod {
    pub fn uses_gateway(self) -> bool {
        matches!(self, PaymentMethod::XenditInvoice)
    }
}

impl TryFrom<String> for PaymentMethod {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BookingTicketRequest {
    #[validate(range(min = 1))]
    pub schedule_id: i32,
    #[validate(range(min = 1))]
    pub seat_id: i32,
    #[validate(length(min = 1, max = 100))]
    pub passenger_name: String,
    #[validate(length(min = 1, max = 50))]
    pub passenger_id_num: String,
    #[validate(email)]
    pub passenger_email: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub passenger_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_ticket_batch"))]
pub struct CreateBookingRequest {
    #[validate(nested)]
    pub tickets: Vec<BookingTicketRequest>,
    pub payment_method: PaymentMethod,
}

// 1 to 10 tickets, and no seat requested twice for the same schedule
fn validate_ticket_batch(request: &CreateBookingRequest) -> Result<(), ValidationError> {
    if request.tickets.is_empty() || request.tickets.len() > MAX_TICKETS_PER_BOOKING {
        return Err(ValidationError::new("tickets").with_message(
            format!("A booking holds 1 to {} tickets", MAX_TICKETS_PER_BOOKING).into(),
        ));
    }

    let mut seen = HashSet::new();
    for ticket in &request.tickets {
        if !seen.insert((ticket.schedule_id, ticket.seat_id)) {
            return Err(ValidationError::new("duplicate_seat").with_message(
                format!("Seat {} is requested more than once", ticket.seat_id).into(),
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookedTicket {
    pub id: i32,
    pub seat_number: String,
    pub passenger_name: String,
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub booking_reference: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    pub payment_id: i32,
    pub tickets: Vec<BookedTicket>,
}

// Seat row locked while a booking is being reserved
#[derive(Debug, sqlx::FromRow)]
pub struct SeatForBooking {
    pub id: i32,
    pub seat_number: String,
    pub train_id: i32,
    pub price: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
pub struct BookingTicketRow {
    pub id: i32,
    pub passenger_name: String,
    pub passenger_id_num: String,
    pub passenger_email: Option<String>,
    pub passenger_phone: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: TicketStatus,
    pub seat_number: String,
    pub carriage_type: String,
    pub train_name: String,
    pub departure_station: String,
    pub arrival_station: String,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub schedule_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub train_name: String,
    pub departure_station: String,
    pub arrival_station: String,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingTicketDetail {
    pub id: i32,
    pub passenger_name: String,
    pub passenger_id_num: String,
    pub passenger_email: Option<String>,
    pub passenger_phone: Option<String>,
    pub seat_number: String,
    pub carriage_type: String,
    pub status: TicketStatus,
    pub schedule: ScheduleSummary,
}

impl From<BookingTicketRow> for BookingTicketDetail {
    fn from(row: BookingTicketRow) -> Self {
        BookingTicketDetail {
            id: row.id,
            passenger_name: row.passenger_name,
            passenger_id_num: row.passenger_id_num,
            passenger_email: row.passenger_email,
            passenger_phone: row.passenger_phone,
            seat_number: row.seat_number,
            carriage_type: row.carriage_type,
            status: row.status,
            schedule: ScheduleSummary {
                train_name: row.train_name,
                departure_station: row.departure_station,
                arrival_station: row.arrival_station,
                departure_time: row.departure_time,
                arrival_time: row.arrival_time,
                date: row.schedule_date,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDetailsResponse {
    pub booking_reference: String,
    pub payment_status: crate::models::payment::PaymentStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payment_url: Option<String>,
    pub tickets: Vec<BookingTicketDetail>,
}
