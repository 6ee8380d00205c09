use crate::models::booking::{BookingDetailsResponse, BookingResponse, CreateBookingRequest};
use crate::models::WebResponse;
use crate::services::booking_service::BookingService;
use crate::utils::error::AppError;
use crate::utils::jwt::AuthenticatedUser;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;

#[post("/bookings", format = "json", data = "<request>")]
pub async fn create_booking(
    request: Json<CreateBookingRequest>,
    auth: AuthenticatedUser,
    booking_service: &State<BookingService>,
) -> Result<(Status, Json<WebResponse<BookingResponse>>), AppError> {
    let booking = booking_service
        .create_booking(auth.user_id, request.into_inner())
        .await?;

    Ok((Status::Created, Json(WebResponse::new(booking))))
}

#[get("/bookings/<booking_reference>")]
pub async fn get_booking_details(
    booking_reference: &str,
    _auth: AuthenticatedUser,
    booking_service: &State<BookingService>,
) -> Result<Json<WebResponse<BookingDetailsResponse>>, AppError> {
    let details = booking_service.get_booking_details(booking_reference).await?;
    Ok(Json(WebResponse::new(details)))
}
