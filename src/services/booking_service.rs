use crate::gateway::{CreateInvoiceRequest, InvoiceCustomer, PaymentGateway};
use crate::models::booking::{
    BookedTicket, BookingDetailsResponse, BookingResponse, BookingTicketDetail, BookingTicketRow,
    CreateBookingRequest, SeatForBooking, TicketStatus,
};
use crate::models::payment::PaymentStatus;
use crate::models::user::UserContact;
use crate::services::payment_service::find_payment_by_reference;
use crate::utils::error::{AppError, AppResult};
use crate::utils::reference::{build_external_id, generate_booking_reference};
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use validator::Validate;

const MAX_REFERENCE_ATTEMPTS: usize = 3;
const MAX_RELEASE_ATTEMPTS: usize = 3;
const RELEASE_BACKOFF: Duration = Duration::from_millis(50);

// Rows committed by the reservation transaction
struct Reservation {
    booking_reference: String,
    payment_id: i32,
    amount: Decimal,
    user: UserContact,
    tickets: Vec<BookedTicket>,
}

enum ReserveAttempt {
    Reserved(Reservation),
    // another booking already owns the generated reference
    ReferenceTaken,
}

struct AttachedInvoice {
    payment_url: Option<String>,
}

#[derive(Clone)]
pub struct BookingService {
    pool: MySqlPool,
    gateway: Arc<dyn PaymentGateway>,
}

impl BookingService {
    pub fn new(pool: MySqlPool, gateway: Arc<dyn PaymentGateway>) -> Self {
        BookingService { pool, gateway }
    }

    /// Reserves every requested seat for the caller and, for gateway payments,
    /// opens a hosted invoice for the total.
    ///
    /// Seats are reserved in one transaction that commits before the gateway is
    /// called. If the gateway step fails the reservation is deleted again, so a
    /// failed booking never leaves tickets or a payment row behind.
    pub async fn create_booking(
        &self,
        user_id: i32,
        request: CreateBookingRequest,
    ) -> AppResult<BookingResponse> {
        request.validate()?;

        match self.book(user_id, &request).await {
            Ok(response) => {
                info!(
                    user_id,
                    booking_reference = %response.booking_reference,
                    tickets = response.tickets.len(),
                    amount = %response.amount,
                    "booking created"
                );
                Ok(response)
            }
            Err(err) => {
                warn!(user_id, error = %err, "booking failed");
                Err(AppError::booking_failed(err))
            }
        }
    }

    async fn book(
        &self,
        user_id: i32,
        request: &CreateBookingRequest,
    ) -> AppResult<BookingResponse> {
        let mut reservation = self.reserve_with_fresh_reference(user_id, request).await?;

        let mut payment_url = None;
        if request.payment_method.uses_gateway() {
            match self.open_invoice(&reservation).await {
                Ok(attached) => {
                    payment_url = attached.payment_url;
                    for ticket in &mut reservation.tickets {
                        ticket.status = TicketStatus::PendingPayment;
                    }
                }
                Err(err) => {
                    self.release(&reservation.booking_reference).await;
                    return Err(err);
                }
            }
        }

        Ok(BookingResponse {
            booking_reference: reservation.booking_reference,
            amount: reservation.amount,
            payment_url,
            payment_id: reservation.payment_id,
            tickets: reservation.tickets,
        })
    }

    async fn reserve_with_fresh_reference(
        &self,
        user_id: i32,
        request: &CreateBookingRequest,
    ) -> AppResult<Reservation> {
        let mut attempts = 0;

        while attempts < MAX_REFERENCE_ATTEMPTS {
            let booking_reference = generate_booking_reference();
            match self.reserve(user_id, request, booking_reference).await? {
                ReserveAttempt::Reserved(reservation) => return Ok(reservation),
                ReserveAttempt::ReferenceTaken => {
                    attempts += 1;
                    debug!(attempts, "booking reference collision, regenerating");
                }
            }
        }

        Err(AppError::Conflict(
            "Could not allocate a unique booking reference".into(),
        ))
    }

    async fn reserve(
        &self,
        user_id: i32,
        request: &CreateBookingRequest,
        booking_reference: String,
    ) -> AppResult<ReserveAttempt> {
        let mut tx = self.pool.begin().await?;

        // Lock every requested seat in id order; a racing booking for any of
        // them waits here until this transaction is done
        let mut seat_query = QueryBuilder::<MySql>::new(
            r#"
            SELECT s.id, s.seat_number, c.train_id, c.price
            FROM seat s
            JOIN carriage c ON c.id = s.carriage_id
            WHERE s.id IN ("#,
        );
        let mut seat_ids = seat_query.separated(", ");
        for ticket in &request.tickets {
            seat_ids.push_bind(ticket.seat_id);
        }
        seat_ids.push_unseparated(") ORDER BY s.id FOR UPDATE OF s");

        let seats: HashMap<i32, SeatForBooking> = seat_query
            .build_query_as::<SeatForBooking>()
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(|seat| (seat.id, seat))
            .collect();

        let user = sqlx::query_as::<_, UserContact>(
            "SELECT id, name, email, phone_number FROM user WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let mut schedule_trains: HashMap<i32, i32> = HashMap::new();
        let mut amount = Decimal::ZERO;
        let mut tickets = Vec::with_capacity(request.tickets.len());

        for ticket in &request.tickets {
            let seat = seats
                .get(&ticket.seat_id)
                .ok_or_else(|| AppError::NotFound(format!("Seat {} not found", ticket.seat_id)))?;

            let train_id = match schedule_trains.get(&ticket.schedule_id) {
                Some(train_id) => *train_id,
                None => {
                    let train_id: i32 =
                        sqlx::query_scalar("SELECT train_id FROM schedule WHERE id = ?")
                            .bind(ticket.schedule_id)
                            .fetch_optional(&mut *tx)
                            .await?
                            .ok_or_else(|| {
                                AppError::NotFound(format!(
                                    "Schedule {} not found",
                                    ticket.schedule_id
                                ))
                            })?;
                    schedule_trains.insert(ticket.schedule_id, train_id);
                    train_id
                }
            };

            if seat.train_id != train_id {
                return Err(AppError::ValidationError(format!(
                    "Seat {} is not on the train of schedule {}",
                    seat.seat_number, ticket.schedule_id
                )));
            }

            let holder: Option<i32> = sqlx::query_scalar(
                r#"
                SELECT id FROM ticket
                WHERE schedule_id = ? AND seat_id = ? AND active_hold = 1
                "#,
            )
            .bind(ticket.schedule_id)
            .bind(ticket.seat_id)
            .fetch_optional(&mut *tx)
            .await?;

            if holder.is_some() {
                return Err(seat_taken(&seat.seat_number));
            }

            amount += seat.price;

            let ticket_id = sqlx::query(
                r#"
                INSERT INTO ticket (
                    user_id, schedule_id, seat_id, booking_reference,
                    passenger_name, passenger_id_num, passenger_email, passenger_phone, status
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(ticket.schedule_id)
            .bind(ticket.seat_id)
            .bind(&booking_reference)
            .bind(&ticket.passenger_name)
            .bind(&ticket.passenger_id_num)
            .bind(&ticket.passenger_email)
            .bind(&ticket.passenger_phone)
            .bind(TicketStatus::Booked.as_ref())
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    seat_taken(&seat.seat_number)
                } else {
                    AppError::from(err)
                }
            })?
            .last_insert_id() as i32;

            tickets.push(BookedTicket {
                id: ticket_id,
                seat_number: seat.seat_number.clone(),
                passenger_name: ticket.passenger_name.clone(),
                status: TicketStatus::Booked,
            });
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO payment
                (booking_reference, payment_method, payment_status, payment_date, amount)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&booking_reference)
        .bind(request.payment_method.as_ref())
        .bind(PaymentStatus::Pending.as_ref())
        .bind(Utc::now().naive_utc())
        .bind(amount)
        .execute(&mut *tx)
        .await;

        let payment_id = match inserted {
            Ok(result) => result.last_insert_id() as i32,
            Err(err) if is_unique_violation(&err) => {
                tx.rollback().await?;
                return Ok(ReserveAttempt::ReferenceTaken);
            }
            Err(err) => return Err(err.into()),
        };

        tx.commit().await?;

        debug!(%booking_reference, payment_id, "seats reserved");

        Ok(ReserveAttempt::Reserved(Reservation {
            booking_reference,
            payment_id,
            amount,
            user,
            tickets,
        }))
    }

    async fn open_invoice(&self, reservation: &Reservation) -> AppResult<AttachedInvoice> {
        let request = CreateInvoiceRequest {
            external_id: build_external_id(&reservation.booking_reference),
            amount: reservation.amount,
            payer_email: reservation.user.email.clone(),
            description: format!(
                "Train Tickets - {} ({} tickets)",
                reservation.booking_reference,
                reservation.tickets.len()
            ),
            booking_reference: reservation.booking_reference.clone(),
            customer: InvoiceCustomer {
                full_name: reservation.user.name.clone(),
                email: reservation.user.email.clone(),
                mobile_number: reservation.user.phone_number.clone(),
            },
        };

        let invoice = self.gateway.create_invoice(&request).await?;

        let invoice_id = invoice.id.ok_or_else(|| {
            AppError::UpstreamFailure("Payment gateway returned no invoice id".into())
        })?;
        if invoice.invoice_url.is_none() {
            warn!(
                booking_reference = %reservation.booking_reference,
                %invoice_id,
                "payment gateway returned no invoice url"
            );
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE payment SET xendit_invoice_id = ?, payment_url = ? WHERE id = ?")
            .bind(&invoice_id)
            .bind(&invoice.invoice_url)
            .bind(reservation.payment_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE ticket SET status = ?
            WHERE booking_reference = ? AND status = ?
            "#,
        )
        .bind(TicketStatus::PendingPayment.as_ref())
        .bind(&reservation.booking_reference)
        .bind(TicketStatus::Booked.as_ref())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            booking_reference = %reservation.booking_reference,
            %invoice_id,
            "invoice attached to booking"
        );

        Ok(AttachedInvoice {
            payment_url: invoice.invoice_url,
        })
    }

    // Undo a committed reservation whose payment could not be opened
    async fn release(&self, booking_reference: &str) {
        let mut attempts = 0;

        while attempts < MAX_RELEASE_ATTEMPTS {
            match self.delete_reservation(booking_reference).await {
                Ok(()) => {
                    info!(%booking_reference, "reservation released");
                    return;
                }
                Err(err) => {
                    attempts += 1;
                    warn!(
                        %booking_reference,
                        attempts,
                        error = %err,
                        "failed to release reservation"
                    );
                    if attempts < MAX_RELEASE_ATTEMPTS {
                        sleep(RELEASE_BACKOFF * attempts as u32).await;
                    }
                }
            }
        }

        // Rows that cannot be deleted must at least stop holding their seats
        match self.void_reservation(booking_reference).await {
            Ok(()) => warn!(%booking_reference, "reservation voided instead of deleted"),
            Err(err) => error!(
                %booking_reference,
                error = %err,
                "failed to void reservation, seats stay held"
            ),
        }
    }

    // Payment row first, then tickets; the same lock order as the webhook
    async fn delete_reservation(&self, booking_reference: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM payment WHERE booking_reference = ?")
            .bind(booking_reference)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM ticket WHERE booking_reference = ?")
            .bind(booking_reference)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn void_reservation(&self, booking_reference: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE payment SET payment_status = ? WHERE booking_reference = ?")
            .bind(PaymentStatus::Failed.as_ref())
            .bind(booking_reference)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE ticket SET status = ? WHERE booking_reference = ?")
            .bind(TicketStatus::Canceled.as_ref())
            .bind(booking_reference)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_booking_details(
        &self,
        booking_reference: &str,
    ) -> AppResult<BookingDetailsResponse> {
        let payment = find_payment_by_reference(&self.pool, booking_reference)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".into()))?;

        let rows = sqlx::query_as::<_, BookingTicketRow>(
            r#"
            SELECT
                t.id,
                t.passenger_name,
                t.passenger_id_num,
                t.passenger_email,
                t.passenger_phone,
                t.status,
                s.seat_number,
                c.carriage_type,
                tr.name AS train_name,
                ds.name AS departure_station,
                ar.name AS arrival_station,
                sc.departure_time,
                sc.arrival_time,
                sc.`date` AS schedule_date
            FROM ticket t
            JOIN seat s ON s.id = t.seat_id
            JOIN carriage c ON c.id = s.carriage_id
            JOIN schedule sc ON sc.id = t.schedule_id
            JOIN train tr ON tr.id = sc.train_id
            JOIN station ds ON ds.id = sc.departure_station_id
            JOIN station ar ON ar.id = sc.arrival_station_id
            WHERE t.booking_reference = ?
            ORDER BY t.id ASC
            "#,
        )
        .bind(booking_reference)
        .fetch_all(&self.pool)
        .await?;

        Ok(BookingDetailsResponse {
            booking_reference: payment.booking_reference,
            payment_status: payment.payment_status,
            amount: payment.amount,
            payment_url: payment.payment_url,
            tickets: rows.into_iter().map(BookingTicketDetail::from).collect(),
        })
    }
}

fn seat_taken(seat_number: &str) -> AppError {
    AppError::Conflict(format!(
        "Seat {} is already booked for this schedule",
        seat_number
    ))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
