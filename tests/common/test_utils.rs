#![allow(dead_code)]

use async_trait::async_trait;
use dotenv::dotenv;
use once_cell::sync::OnceCell;
use rust_decimal::Decimal;
use sqlx::mysql::MySqlPool as Pool;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{Error, Executor};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use train_booking_system::db;
use train_booking_system::gateway::{CreateInvoiceRequest, Invoice, PaymentGateway};
use train_booking_system::models::booking::{
    BookingTicketRequest, CreateBookingRequest, PaymentMethod,
};
use train_booking_system::utils::error::{AppError, AppResult};

// One database per test binary; every test connects to it with its own pool
// because a pool cannot outlive the runtime of the test that opened it
static DB_NAME: OnceCell<String> = OnceCell::new();
static SCHEMA_READY: tokio::sync::OnceCell<()> = tokio::sync::OnceCell::const_new();

pub struct TestDb;

fn admin_database_url() -> Option<String> {
    dotenv().ok();
    env::var("ADMIN_DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
}

// Passenger name whose tickets refuse to be deleted, see RELEASE_FAULT_TRIGGER
pub const UNDELETABLE_PASSENGER: &str = "Undeletable Passenger";

// Makes DELETE fail for one passenger's tickets so a failing cleanup can be
// reproduced. Sent as a plain text query: MySQL cannot prepare CREATE TRIGGER.
const RELEASE_FAULT_TRIGGER: &str = r#"
    CREATE TRIGGER ticket_release_fault BEFORE DELETE ON ticket
    FOR EACH ROW
    BEGIN
        IF OLD.passenger_name = 'Undeletable Passenger' THEN
            SIGNAL SQLSTATE '45000' SET MESSAGE_TEXT = 'ticket delete refused';
        END IF;
    END
"#;

// Server url without the database path
fn server_url(db_url: &str) -> String {
    db_url.split('/').collect::<Vec<&str>>()[..3].join("/")
}

impl TestDb {
    // Database tests are #[ignore]d by default; running them without a server is an error
    pub async fn get_instance(test_file: &str) -> Result<Pool, Error> {
        let admin_url =
            admin_database_url().expect("ADMIN_DATABASE_URL must be set to run database tests");
        let base_url = server_url(&admin_url);

        let db_name = DB_NAME
            .get_or_init(|| {
                let stem = Path::new(test_file)
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or("suite")
                    .to_string();
                let millis = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap()
                    .as_millis();
                format!("train_test_{}_{}", stem, millis)
            })
            .clone();

        let (init_name, init_url) = (db_name.clone(), base_url.clone());
        SCHEMA_READY
            .get_or_try_init(|| async move {
                let (db_name, base_url) = (init_name, init_url);
                println!("Creating test database {}", db_name);
                let admin_pool = MySqlPoolOptions::new()
                    .max_connections(1)
                    .connect(&base_url)
                    .await?;
                sqlx::query(&format!("CREATE DATABASE IF NOT EXISTS {}", db_name))
                    .execute(&admin_pool)
                    .await?;
                admin_pool.close().await;

                let pool = MySqlPoolOptions::new()
                    .max_connections(1)
                    .connect(&format!("{}/{}", base_url, db_name))
                    .await?;
                db::create_tables(&pool).await?;
                (&pool).execute(RELEASE_FAULT_TRIGGER).await?;
                pool.close().await;
                Ok::<(), Error>(())
            })
            .await?;

        let pool = MySqlPoolOptions::new()
            .max_connections(20)
            .connect(&format!("{}/{}", base_url, db_name))
            .await?;
        Ok(pool)
    }

    // Teardown after the whole test binary ran (called from a #[dtor])
    pub fn cleanup_database_sync() -> Result<(), Error> {
        let (db_name, admin_url) = match (DB_NAME.get(), admin_database_url()) {
            (Some(name), Some(url)) if SCHEMA_READY.initialized() => (name.clone(), url),
            _ => return Ok(()),
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Io)?;

        runtime.block_on(async {
            println!("Dropping test database {}", db_name);
            let admin_pool = MySqlPoolOptions::new()
                .max_connections(1)
                .connect(&server_url(&admin_url))
                .await?;
            sqlx::query(&format!("DROP DATABASE IF EXISTS {}", db_name))
                .execute(&admin_pool)
                .await?;
            admin_pool.close().await;
            Ok::<(), Error>(())
        })
    }
}

// Short random code; station codes only allow 10 characters
pub fn unique_code() -> String {
    format!("{:08X}", rand::random::<u32>())
}

/// A train running one schedule between two fresh stations, with one carriage
/// and no seats yet.
#[derive(Debug, Clone)]
pub struct RailFixture {
    pub train_id: i32,
    pub carriage_id: i32,
    pub schedule_id: i32,
    pub departure_station_id: i32,
    pub arrival_station_id: i32,
    pub price: Decimal,
}

pub async fn create_station(pool: &Pool, prefix: &str, city: &str) -> Result<i32, Error> {
    let code = format!("{}{}", prefix, unique_code());
    let result = sqlx::query("INSERT INTO station (name, code, city, address) VALUES (?, ?, ?, ?)")
        .bind(format!("{} Station {}", city, code))
        .bind(&code)
        .bind(city)
        .bind("Jl. Stasiun No. 1")
        .execute(pool)
        .await?;
    Ok(result.last_insert_id() as i32)
}

pub async fn create_train(pool: &Pool) -> Result<i32, Error> {
    let code = format!("T{}", unique_code());
    let result = sqlx::query("INSERT INTO train (name, code, train_type) VALUES (?, ?, ?)")
        .bind(format!("Argo Bromo {}", code))
        .bind(&code)
        .bind("executive")
        .execute(pool)
        .await?;
    Ok(result.last_insert_id() as i32)
}

pub async fn add_carriage(
    pool: &Pool,
    train_id: i32,
    carriage_number: i32,
    carriage_type: &str,
    price: Decimal,
) -> Result<i32, Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO carriage (train_id, carriage_number, carriage_type, seat_capacity, price)
        VALUES (?, ?, ?, 0, ?)
        "#,
    )
    .bind(train_id)
    .bind(carriage_number)
    .bind(carriage_type)
    .bind(price)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id() as i32)
}

pub async fn add_schedule(
    pool: &Pool,
    train_id: i32,
    departure_station_id: i32,
    arrival_station_id: i32,
) -> Result<i32, Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO schedule
            (train_id, departure_station_id, arrival_station_id,
             departure_time, arrival_time, `date`)
        VALUES (?, ?, ?, '2025-08-06 08:00:00', '2025-08-06 13:30:00', '2025-08-06')
        "#,
    )
    .bind(train_id)
    .bind(departure_station_id)
    .bind(arrival_station_id)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id() as i32)
}

pub async fn create_rail_fixture(pool: &Pool, price: Decimal) -> Result<RailFixture, Error> {
    let departure_station_id = create_station(pool, "A", "Jakarta").await?;
    let arrival_station_id = create_station(pool, "B", "Surabaya").await?;
    let train_id = create_train(pool).await?;
    let carriage_id = add_carriage(pool, train_id, 1, "executive", price).await?;
    let schedule_id = add_schedule(pool, train_id, departure_station_id, arrival_station_id).await?;

    Ok(RailFixture {
        train_id,
        carriage_id,
        schedule_id,
        departure_station_id,
        arrival_station_id,
        price,
    })
}

pub async fn create_user(pool: &Pool, name: &str) -> Result<i32, Error> {
    let email = format!(
        "{}.{}@example.com",
        name.to_lowercase().replace(' ', "."),
        unique_code().to_lowercase()
    );
    let result = sqlx::query("INSERT INTO user (name, email, phone_number) VALUES (?, ?, ?)")
        .bind(name)
        .bind(email)
        .bind("0812-3456-7890")
        .execute(pool)
        .await?;
    Ok(result.last_insert_id() as i32)
}

pub async fn seat_id(pool: &Pool, carriage_id: i32, seat_number: &str) -> Result<i32, Error> {
    sqlx::query_scalar("SELECT id FROM seat WHERE carriage_id = ? AND seat_number = ?")
        .bind(carriage_id)
        .bind(seat_number)
        .fetch_one(pool)
        .await
}

// Writes a ticket directly, bypassing the booking flow
pub async fn insert_ticket(
    pool: &Pool,
    user_id: i32,
    schedule_id: i32,
    seat_id: i32,
    booking_reference: &str,
    status: &str,
) -> Result<i32, Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO ticket
            (user_id, schedule_id, seat_id, booking_reference,
             passenger_name, passenger_id_num, status)
        VALUES (?, ?, ?, ?, 'Fixture Passenger', 'ID000', ?)
        "#,
    )
    .bind(user_id)
    .bind(schedule_id)
    .bind(seat_id)
    .bind(booking_reference)
    .bind(status)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id() as i32)
}

pub async fn ticket_statuses(pool: &Pool, booking_reference: &str) -> Result<Vec<String>, Error> {
    sqlx::query_scalar("SELECT status FROM ticket WHERE booking_reference = ? ORDER BY id")
        .bind(booking_reference)
        .fetch_all(pool)
        .await
}

pub async fn payment_status(pool: &Pool, booking_reference: &str) -> Result<Option<String>, Error> {
    sqlx::query_scalar("SELECT payment_status FROM payment WHERE booking_reference = ?")
        .bind(booking_reference)
        .fetch_optional(pool)
        .await
}

pub async fn count_user_rows(pool: &Pool, user_id: i32) -> Result<(i64, i64), Error> {
    let tickets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ticket WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    let payments: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM payment
        WHERE booking_reference IN (SELECT booking_reference FROM ticket WHERE user_id = ?)
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok((tickets, payments))
}

pub async fn count_payments(pool: &Pool) -> Result<i64, Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM payment")
        .fetch_one(pool)
        .await
}

pub fn ticket_request(
    schedule_id: i32,
    seat_id: i32,
    passenger_name: &str,
) -> BookingTicketRequest {
    BookingTicketRequest {
        schedule_id,
        seat_id,
        passenger_name: passenger_name.to_string(),
        passenger_id_num: "ID123456789".to_string(),
        passenger_email: Some("john.doe@email.com".to_string()),
        passenger_phone: Some("+628123456789".to_string()),
    }
}

pub fn booking_request(
    tickets: Vec<BookingTicketRequest>,
    payment_method: PaymentMethod,
) -> CreateBookingRequest {
    CreateBookingRequest {
        tickets,
        payment_method,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Ok,
    Fail,
    NoInvoiceId,
    NoUrl,
}

/// In-memory gateway. Invoice ids are `inv_<booking reference>`.
pub struct FakeGateway {
    mode: GatewayMode,
    requests: Mutex<Vec<CreateInvoiceRequest>>,
    statuses: Mutex<HashMap<String, String>>,
    lookups: AtomicUsize,
}

impl FakeGateway {
    pub fn new(mode: GatewayMode) -> Arc<Self> {
        Arc::new(FakeGateway {
            mode,
            requests: Mutex::new(Vec::new()),
            statuses: Mutex::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn invoice_id(booking_reference: &str) -> String {
        format!("inv_{}", booking_reference)
    }

    pub fn requests(&self) -> Vec<CreateInvoiceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn set_status(&self, invoice_id: &str, status: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(invoice_id.to_string(), status.to_string());
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_invoice(&self, request: &CreateInvoiceRequest) -> AppResult<Invoice> {
        self.requests.lock().unwrap().push(request.clone());

        let invoice_id = Self::invoice_id(&request.booking_reference);
        let invoice_url = format!("https://checkout.example/web/{}", invoice_id);

        match self.mode {
            GatewayMode::Fail => Err(AppError::UpstreamFailure("gateway unavailable".into())),
            GatewayMode::NoInvoiceId => Ok(Invoice {
                id: None,
                external_id: Some(request.external_id.clone()),
                status: Some("PENDING".into()),
                invoice_url: Some(invoice_url),
            }),
            GatewayMode::NoUrl => Ok(Invoice {
                id: Some(invoice_id),
                external_id: Some(request.external_id.clone()),
                status: Some("PENDING".into()),
                invoice_url: None,
            }),
            GatewayMode::Ok => Ok(Invoice {
                id: Some(invoice_id),
                external_id: Some(request.external_id.clone()),
                status: Some("PENDING".into()),
                invoice_url: Some(invoice_url),
            }),
        }
    }

    async fn get_invoice(&self, invoice_id: &str) -> AppResult<Invoice> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let status = self.statuses.lock().unwrap().get(invoice_id).cloned();

        match status {
            Some(status) => Ok(Invoice {
                id: Some(invoice_id.to_string()),
                external_id: None,
                status: Some(status),
                invoice_url: None,
            }),
            None => Err(AppError::UpstreamFailure(format!(
                "Invoice {} not found",
                invoice_id
            ))),
        }
    }
}
