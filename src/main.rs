use dotenv::dotenv;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use train_booking_system::build_rocket;
use train_booking_system::config::{AppConfig, AppEnvironment};
use train_booking_system::db::{self, Database};
use train_booking_system::gateway::xendit::XenditClient;
use train_booking_system::gateway::PaymentGateway;
use train_booking_system::utils::jwt::JwtConfig;

#[rocket::main]
async fn main() -> Result<(), String> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("train_booking_system=info")),
        )
        .with(fmt::layer().with_target(false))
        .init();

    let config = AppConfig::from_env().map_err(|e| e.to_string())?;
    let webhook_auth = config.webhook_auth().map_err(|e| e.to_string())?;
    if config.environment == AppEnvironment::Development {
        warn!("development mode: payment webhooks are accepted without a signature");
    }
    if config.xendit.secret_key.is_none() {
        warn!("XENDIT_SECRET_KEY is not set, gateway bookings will fail");
    }

    // Connect to the database
    let database = Database::new(&config.database_url, config.database_max_connections)
        .await
        .map_err(|e| format!("Failed to connect to database: {}", e))?;
    db::create_tables(database.get_pool())
        .await
        .map_err(|e| format!("Failed to create tables: {}", e))?;

    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        XenditClient::new(&config.xendit, &config.frontend_url).map_err(|e| e.to_string())?,
    );

    info!(environment = ?config.environment, "starting train booking service");

    build_rocket(
        database.get_pool().clone(),
        gateway,
        JwtConfig {
            secret: config.jwt_secret.clone(),
        },
        webhook_auth,
    )
    .launch()
    .await
    .map_err(|e| e.to_string())?;

    Ok(())
}
