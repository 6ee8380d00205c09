use crate::models::payment::{PaymentResponse, WebhookAck};
use crate::models::WebResponse;
use crate::services::payment_service::PaymentService;
use crate::utils::error::AppError;
use crate::utils::jwt::AuthenticatedUser;
use crate::utils::signature::CallbackToken;
use rocket::data::{Data, ToByteUnit};
use rocket::serde::json::Json;
use rocket::State;

#[get("/payments")]
pub async fn list_my_payments(
    auth: AuthenticatedUser,
    payment_service: &State<PaymentService>,
) -> Result<Json<WebResponse<Vec<PaymentResponse>>>, AppError> {
    let payments = payment_service.list_payments_for_user(auth.user_id).await?;
    Ok(Json(WebResponse::new(payments)))
}

#[get("/payments/booking/<booking_reference>")]
pub async fn get_payment_by_booking_reference(
    booking_reference: &str,
    _auth: AuthenticatedUser,
    payment_service: &State<PaymentService>,
) -> Result<Json<WebResponse<PaymentResponse>>, AppError> {
    let payment = payment_service
        .get_payment_by_booking_reference(booking_reference)
        .await?;
    Ok(Json(WebResponse::new(payment)))
}

#[post("/payments/booking/<booking_reference>/sync")]
pub async fn sync_payment_status(
    booking_reference: &str,
    _auth: AuthenticatedUser,
    payment_service: &State<PaymentService>,
) -> Result<Json<WebResponse<PaymentResponse>>, AppError> {
    let payment = payment_service.sync_payment_status(booking_reference).await?;
    Ok(Json(WebResponse::new(payment)))
}

pub const WEBHOOK_BODY_LIMIT: u64 = 1024 * 1024;

// Gateway callback. The body is read raw because the signature covers its exact bytes;
// whatever happens to it, the gateway gets an acknowledgement back.
#[post("/payments/webhook/xendit", data = "<body>")]
pub async fn xendit_webhook(
    body: Data<'_>,
    token: CallbackToken,
    payment_service: &State<PaymentService>,
) -> Json<WebhookAck> {
    let body = match body.open(WEBHOOK_BODY_LIMIT.bytes()).into_bytes().await {
        Ok(body) if body.is_complete() => body.into_inner(),
        Ok(_) => {
            return Json(WebhookAck::failed(AppError::ValidationError(format!(
                "Webhook payload exceeds {} bytes",
                WEBHOOK_BODY_LIMIT
            ))))
        }
        Err(err) => {
            return Json(WebhookAck::failed(AppError::ValidationError(format!(
                "Unreadable webhook payload: {}",
                err
            ))))
        }
    };

    let ack = payment_service
        .handle_external_payment_notification(&body, token.0.as_deref())
        .await;
    Json(ack)
}
