use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;

// Database connection manager
pub struct Database {
    pub pool: MySqlPool,
}

impl Database {
    // Create a new database connection pool
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    // Get a reference to the connection pool
    pub fn get_pool(&self) -> &MySqlPool {
        &self.pool
    }
}

// Table definitions, in dependency order.
//
// `ticket.active_hold` is 1 while the ticket holds its seat and NULL once it
// is canceled. MySQL lets any number of NULLs through a unique key, so
// `ticket_active_seat_uindex` allows one live ticket per (schedule, seat)
// while keeping canceled history around.
pub const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS user (
        id INT AUTO_INCREMENT PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        email VARCHAR(255) NOT NULL,
        phone_number VARCHAR(20) NULL,
        CONSTRAINT user_email_uindex UNIQUE (email)
    )",
    "CREATE TABLE IF NOT EXISTS station (
        id INT AUTO_INCREMENT PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        code VARCHAR(10) NOT NULL,
        city VARCHAR(100) NOT NULL,
        address VARCHAR(255) NOT NULL,
        CONSTRAINT station_code_uindex UNIQUE (code)
    )",
    "CREATE TABLE IF NOT EXISTS train (
        id INT AUTO_INCREMENT PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        code VARCHAR(20) NOT NULL,
        train_type VARCHAR(30) NOT NULL,
        CONSTRAINT train_code_uindex UNIQUE (code)
    )",
    "CREATE TABLE IF NOT EXISTS carriage (
        id INT AUTO_INCREMENT PRIMARY KEY,
        train_id INT NOT NULL,
        carriage_number INT NOT NULL,
        carriage_type VARCHAR(30) NOT NULL,
        seat_capacity INT DEFAULT 0 NOT NULL,
        price DECIMAL(12,2) NOT NULL,
        CONSTRAINT carriage_train_number_uindex UNIQUE (train_id, carriage_number),
        CONSTRAINT carriage_train_id_fk
            FOREIGN KEY (train_id) REFERENCES train(id)
            ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS seat (
        id INT AUTO_INCREMENT PRIMARY KEY,
        carriage_id INT NOT NULL,
        seat_number VARCHAR(10) NOT NULL,
        CONSTRAINT seat_carriage_number_uindex UNIQUE (carriage_id, seat_number),
        CONSTRAINT seat_carriage_id_fk
            FOREIGN KEY (carriage_id) REFERENCES carriage(id)
            ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS schedule (
        id INT AUTO_INCREMENT PRIMARY KEY,
        train_id INT NOT NULL,
        departure_station_id INT NOT NULL,
        arrival_station_id INT NOT NULL,
        departure_time DATETIME NOT NULL,
        arrival_time DATETIME NOT NULL,
        `date` DATE NOT NULL,
        CONSTRAINT schedule_times_check CHECK (arrival_time > departure_time),
        CONSTRAINT schedule_stations_check CHECK (departure_station_id <> arrival_station_id),
        CONSTRAINT schedule_train_id_fk
            FOREIGN KEY (train_id) REFERENCES train(id),
        CONSTRAINT schedule_departure_station_fk
            FOREIGN KEY (departure_station_id) REFERENCES station(id),
        CONSTRAINT schedule_arrival_station_fk
            FOREIGN KEY (arrival_station_id) REFERENCES station(id)
    )",
    "CREATE TABLE IF NOT EXISTS ticket (
        id INT AUTO_INCREMENT PRIMARY KEY,
        user_id INT NOT NULL,
        schedule_id INT NOT NULL,
        seat_id INT NOT NULL,
        booking_reference VARCHAR(40) NOT NULL,
        passenger_name VARCHAR(100) NOT NULL,
        passenger_id_num VARCHAR(50) NOT NULL,
        passenger_email VARCHAR(255) NULL,
        passenger_phone VARCHAR(20) NULL,
        status VARCHAR(20) DEFAULT 'booked' NOT NULL,
        active_hold TINYINT AS (
            CASE WHEN status IN ('booked', 'pending_payment', 'paid') THEN 1 ELSE NULL END
        ) STORED,
        INDEX ticket_booking_reference_index (booking_reference),
        CONSTRAINT ticket_active_seat_uindex UNIQUE (schedule_id, seat_id, active_hold),
        CONSTRAINT ticket_user_id_fk
            FOREIGN KEY (user_id) REFERENCES user(id),
        CONSTRAINT ticket_schedule_id_fk
            FOREIGN KEY (schedule_id) REFERENCES schedule(id),
        CONSTRAINT ticket_seat_id_fk
            FOREIGN KEY (seat_id) REFERENCES seat(id)
    )",
    "CREATE TABLE IF NOT EXISTS payment (
        id INT AUTO_INCREMENT PRIMARY KEY,
        booking_reference VARCHAR(40) NOT NULL,
        payment_method VARCHAR(30) NOT NULL,
        payment_status VARCHAR(20) DEFAULT 'pending' NOT NULL,
        payment_date DATETIME NOT NULL,
        amount DECIMAL(12,2) NOT NULL,
        xendit_invoice_id VARCHAR(100) NULL,
        xendit_payment_id VARCHAR(100) NULL,
        payment_url VARCHAR(500) NULL,
        CONSTRAINT payment_booking_reference_uindex UNIQUE (booking_reference),
        INDEX payment_xendit_invoice_id_index (xendit_invoice_id)
    )",
];

// Create every table that does not exist yet
pub async fn create_tables(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    for create_sql in SCHEMA {
        sqlx::query(create_sql).execute(pool).await?;
    }

    Ok(())
}
