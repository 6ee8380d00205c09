#[macro_use]
extern crate rocket;

pub mod config;
pub mod db;
pub mod gateway;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use sqlx::MySqlPool;
use std::sync::Arc;

use crate::gateway::PaymentGateway;
use crate::services::booking_service::BookingService;
use crate::services::payment_service::PaymentService;
use crate::services::seat_service::SeatService;
use crate::utils::jwt::JwtConfig;
use crate::utils::signature::WebhookAuth;

// Services are built once here and shared with every request as managed state
pub fn build_rocket(
    pool: MySqlPool,
    gateway: Arc<dyn PaymentGateway>,
    jwt: JwtConfig,
    webhook_auth: WebhookAuth,
) -> Rocket<Build> {
    let seat_service = SeatService::new(pool.clone());
    let booking_service = BookingService::new(pool.clone(), gateway.clone());
    let payment_service = PaymentService::new(pool, gateway, webhook_auth);

    rocket::build()
        .manage(jwt)
        .manage(seat_service)
        .manage(booking_service)
        .manage(payment_service)
        .mount(
            "/api",
            routes![
                routes::seat_route::list_seats_by_carriage,
                routes::seat_route::get_seat_layout,
                routes::seat_route::generate_seats,
                routes::seat_route::list_available_seats_by_schedule,
                routes::seat_route::get_train_seat_availability,
                routes::booking_route::create_booking,
                routes::booking_route::get_booking_details,
                routes::payment_route::list_my_payments,
                routes::payment_route::get_payment_by_booking_reference,
                routes::payment_route::sync_payment_status,
                routes::payment_route::xendit_webhook,
            ],
        )
        .attach(AdHoc::on_response("CORS", |_, res| {
            Box::pin(async move {
                res.set_header(rocket::http::Header::new(
                    "Access-Control-Allow-Origin",
                    "*",
                ));
            })
        }))
}
