use crate::models::seat::{
    Carriage, CarriageAvailability, GenerateSeatsRequest, Seat, SeatAvailabilityResponse,
    SeatLayoutEntry, SeatLayoutResponse, SeatOccupancyRow, SeatResponse,
    TrainSeatAvailabilityResponse,
};
use crate::services::seat_layout::{parse_seat_number, SeatPattern};
use crate::utils::error::{AppError, AppResult};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use std::collections::HashMap;
use tracing::{debug, info};
use validator::Validate;

// Seats joined with the live ticket (if any) for one schedule.
// Binding NULL as the schedule matches no ticket, so every seat reads as free.
const SEAT_OCCUPANCY_SQL: &str = r#"
    SELECT
        s.id,
        s.carriage_id,
        s.seat_number,
        c.carriage_number,
        c.carriage_type,
        t.id AS ticket_id
    FROM seat s
    JOIN carriage c ON c.id = s.carriage_id
    LEFT JOIN ticket t
        ON t.seat_id = s.id
        AND t.schedule_id = ?
        AND t.active_hold = 1
    WHERE c.train_id = ?
    ORDER BY c.carriage_number ASC, s.seat_number ASC
"#;

#[derive(Clone)]
pub struct SeatService {
    pool: MySqlPool,
}

impl SeatService {
    pub fn new(pool: MySqlPool) -> Self {
        SeatService { pool }
    }

    async fn find_carriage(&self, carriage_id: i32) -> AppResult<Carriage> {
        sqlx::query_as::<_, Carriage>(
            r#"
            SELECT id, train_id, carriage_number, carriage_type, seat_capacity
            FROM carriage
            WHERE id = ?
            "#,
        )
        .bind(carriage_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Carriage not found".into()))
    }

    async fn seats_of_carriage(&self, carriage_id: i32) -> AppResult<Vec<Seat>> {
        let seats = sqlx::query_as::<_, Seat>(
            r#"
            SELECT id, carriage_id, seat_number
            FROM seat
            WHERE carriage_id = ?
            ORDER BY seat_number ASC
            "#,
        )
        .bind(carriage_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(seats)
    }

    // Seats of one carriage, ordered by seat number
    pub async fn list_seats_by_carriage(&self, carriage_id: i32) -> AppResult<Vec<SeatResponse>> {
        self.find_carriage(carriage_id).await?;

        let seats = self.seats_of_carriage(carriage_id).await?;
        Ok(seats.into_iter().map(SeatResponse::from).collect())
    }

    pub async fn list_available_seats_by_schedule(
        &self,
        schedule_id: i32,
    ) -> AppResult<Vec<SeatAvailabilityResponse>> {
        debug!(schedule_id, "listing seats for schedule");

        // Get the train running this schedule
        let train_id: i32 = sqlx::query_scalar("SELECT train_id FROM schedule WHERE id = ?")
            .bind(schedule_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Schedule not found".into()))?;

        let rows = sqlx::query_as::<_, SeatOccupancyRow>(SEAT_OCCUPANCY_SQL)
            .bind(schedule_id)
            .bind(train_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(SeatAvailabilityResponse::from).collect())
    }

    // Per-carriage and train-wide seat counts. Without a schedule there is
    // nothing to be occupied, so every seat is reported available.
    pub async fn get_train_seat_availability(
        &self,
        train_id: i32,
        schedule_id: Option<i32>,
    ) -> AppResult<TrainSeatAvailabilityResponse> {
        let train_exists: Option<i32> = sqlx::query_scalar("SELECT id FROM train WHERE id = ?")
            .bind(train_id)
            .fetch_optional(&self.pool)
            .await?;
        if train_exists.is_none() {
            return Err(AppError::NotFound("Train not found".into()));
        }

        let carriages = sqlx::query_as::<_, Carriage>(
            r#"
            SELECT id, train_id, carriage_number, carriage_type, seat_capacity
            FROM carriage
            WHERE train_id = ?
            ORDER BY carriage_number ASC
            "#,
        )
        .bind(train_id)
        .fetch_all(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, SeatOccupancyRow>(SEAT_OCCUPANCY_SQL)
            .bind(schedule_id)
            .bind(train_id)
            .fetch_all(&self.pool)
            .await?;

        let mut seats_by_carriage: HashMap<i32, Vec<SeatAvailabilityResponse>> = HashMap::new();
        for row in rows {
            seats_by_carriage
                .entry(row.carriage_id)
                .or_default()
                .push(SeatAvailabilityResponse::from(row));
        }

        let carriages: Vec<CarriageAvailability> = carriages
            .into_iter()
            .map(|carriage| {
                let seats = seats_by_carriage.remove(&carriage.id).unwrap_or_default();
                let available = seats.iter().filter(|seat| seat.is_available).count();
                CarriageAvailability {
                    id: carriage.id,
                    carriage_number: carriage.carriage_number,
                    carriage_type: carriage.carriage_type,
                    total_seats: seats.len(),
                    available_seats: available,
                    seats,
                }
            })
            .collect();

        let total_seats: usize = carriages.iter().map(|c| c.total_seats).sum();
        let available_seats: usize = carriages.iter().map(|c| c.available_seats).sum();

        Ok(TrainSeatAvailabilityResponse {
            train_id,
            total_seats,
            available_seats,
            booked_seats: total_seats - available_seats,
            carriages,
        })
    }

    pub async fn get_seat_layout(&self, carriage_id: i32) -> AppResult<SeatLayoutResponse> {
        let carriage = self.find_carriage(carriage_id).await?;
        let seats = self.seats_of_carriage(carriage_id).await?;

        let pattern = SeatPattern::infer(seats.iter().map(|seat| seat.seat_number.as_str()));

        let seats = seats
            .into_iter()
            .map(|seat| {
                let (row, position) = parse_seat_number(&seat.seat_number);
                SeatLayoutEntry {
                    id: seat.id,
                    seat_number: seat.seat_number,
                    row,
                    position,
                    is_window: pattern.is_window(position),
                    is_aisle: pattern.is_aisle(position),
                }
            })
            .collect();

        Ok(SeatLayoutResponse {
            carriage_id: carriage.id,
            carriage_type: carriage.carriage_type,
            seat_capacity: carriage.seat_capacity,
            layout_pattern: pattern.to_string(),
            seats,
        })
    }

    // Lay out a whole empty carriage in one go; refuses carriages that already have seats
    pub async fn generate_seats_for_carriage(
        &self,
        carriage_id: i32,
        request: GenerateSeatsRequest,
    ) -> AppResult<Vec<SeatResponse>> {
        request.validate()?;
        let pattern: SeatPattern = request
            .seat_pattern
            .parse()
            .map_err(|_| AppError::ValidationError("Invalid seat pattern".into()))?;
        let seat_numbers = pattern.seat_numbers(request.rows as u32, request.start_row() as u32);

        let mut tx = self.pool.begin().await?;

        // Lock the carriage so two generators cannot interleave
        let locked: Option<i32> =
            sqlx::query_scalar("SELECT id FROM carriage WHERE id = ? FOR UPDATE")
                .bind(carriage_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(AppError::NotFound("Carriage not found".into()));
        }

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seat WHERE carriage_id = ?")
            .bind(carriage_id)
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Err(AppError::Conflict(
                "Seats already exist for this carriage".into(),
            ));
        }

        let mut insert = QueryBuilder::<MySql>::new("INSERT INTO seat (carriage_id, seat_number) ");
        insert.push_values(&seat_numbers, |mut row, seat_number| {
            row.push_bind(carriage_id).push_bind(seat_number);
        });
        let created = insert.build().execute(&mut *tx).await?.rows_affected();

        sqlx::query("UPDATE carriage SET seat_capacity = ? WHERE id = ?")
            .bind(created as i32)
            .bind(carriage_id)
            .execute(&mut *tx)
            .await?;

        let seats = sqlx::query_as::<_, Seat>(
            r#"
            SELECT id, carriage_id, seat_number
            FROM seat
            WHERE carriage_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(carriage_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            carriage_id,
            pattern = %pattern,
            seats = created,
            "generated seats for carriage"
        );

        Ok(seats.into_iter().map(SeatResponse::from).collect())
    }
}
