use crate::models::seat::{
    GenerateSeatsRequest, SeatAvailabilityResponse, SeatLayoutResponse, SeatResponse,
    TrainSeatAvailabilityResponse,
};
use crate::models::WebResponse;
use crate::services::seat_service::SeatService;
use crate::utils::error::AppError;
use crate::utils::jwt::AuthenticatedUser;
use rocket::serde::json::Json;
use rocket::State;

#[derive(Debug, FromForm)]
pub struct TrainAvailabilityQuery {
    #[field(name = "scheduleId")]
    #[field(name = "schedule_id")]
    pub schedule_id: Option<i32>,
}

#[get("/seats/carriage/<carriage_id>")]
pub async fn list_seats_by_carriage(
    carriage_id: i32,
    _auth: AuthenticatedUser,
    seat_service: &State<SeatService>,
) -> Result<Json<WebResponse<Vec<SeatResponse>>>, AppError> {
    let seats = seat_service.list_seats_by_carriage(carriage_id).await?;
    Ok(Json(WebResponse::new(seats)))
}

#[get("/seats/carriage/<carriage_id>/layout")]
pub async fn get_seat_layout(
    carriage_id: i32,
    _auth: AuthenticatedUser,
    seat_service: &State<SeatService>,
) -> Result<Json<WebResponse<SeatLayoutResponse>>, AppError> {
    let layout = seat_service.get_seat_layout(carriage_id).await?;
    Ok(Json(WebResponse::new(layout)))
}

#[post("/seats/carriage/<carriage_id>/generate", format = "json", data = "<request>")]
pub async fn generate_seats(
    carriage_id: i32,
    request: Json<GenerateSeatsRequest>,
    _auth: AuthenticatedUser,
    seat_service: &State<SeatService>,
) -> Result<Json<WebResponse<Vec<SeatResponse>>>, AppError> {
    let seats = seat_service
        .generate_seats_for_carriage(carriage_id, request.into_inner())
        .await?;
    Ok(Json(WebResponse::new(seats)))
}

#[get("/seats/schedule/<schedule_id>/available")]
pub async fn list_available_seats_by_schedule(
    schedule_id: i32,
    _auth: AuthenticatedUser,
    seat_service: &State<SeatService>,
) -> Result<Json<WebResponse<Vec<SeatAvailabilityResponse>>>, AppError> {
    let seats = seat_service
        .list_available_seats_by_schedule(schedule_id)
        .await?;
    Ok(Json(WebResponse::new(seats)))
}

#[get("/seats/train/<train_id>/available?<query..>")]
pub async fn get_train_seat_availability(
    train_id: i32,
    query: TrainAvailabilityQuery,
    _auth: AuthenticatedUser,
    seat_service: &State<SeatService>,
) -> Result<Json<WebResponse<TrainSeatAvailabilityResponse>>, AppError> {
    let availability = seat_service
        .get_train_seat_availability(train_id, query.schedule_id)
        .await?;
    Ok(Json(WebResponse::new(availability)))
}
