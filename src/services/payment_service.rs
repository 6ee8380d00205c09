use crate::gateway::PaymentGateway;
use crate::models::payment::{
    Payment, PaymentOutcome, PaymentResponse, PaymentStatus, WebhookAck, WebhookReceipt,
    XenditWebhookPayload,
};
use crate::utils::error::{AppError, AppResult};
use crate::utils::reference::booking_reference_from_external_id;
use crate::utils::signature::WebhookAuth;
use sqlx::MySqlPool;
use std::sync::Arc;
use tracing::{debug, info, warn};

const PAYMENT_COLUMNS: &str = r#"
    id, booking_reference, payment_method, payment_status, payment_date,
    amount, xendit_invoice_id, xendit_payment_id, payment_url
"#;

pub(crate) async fn find_payment_by_reference(
    pool: &MySqlPool,
    booking_reference: &str,
) -> AppResult<Option<Payment>> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {} FROM payment WHERE booking_reference = ?",
        PAYMENT_COLUMNS
    ))
    .bind(booking_reference)
    .fetch_optional(pool)
    .await?;

    Ok(payment)
}

#[derive(Clone)]
pub struct PaymentService {
    pool: MySqlPool,
    gateway: Arc<dyn PaymentGateway>,
    webhook_auth: WebhookAuth,
}

impl PaymentService {
    pub fn new(
        pool: MySqlPool,
        gateway: Arc<dyn PaymentGateway>,
        webhook_auth: WebhookAuth,
    ) -> Self {
        PaymentService {
            pool,
            gateway,
            webhook_auth,
        }
    }

    /// Applies a gateway invoice notification to the payment and the tickets
    /// of its booking.
    ///
    /// Never fails: the gateway gets an acknowledgement either way, with
    /// `success: false` and the reason when the notification was rejected.
    pub async fn handle_external_payment_notification(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> WebhookAck {
        match self.process_notification(raw_body, signature).await {
            Ok(receipt) => {
                info!(
                    booking_reference = %receipt.booking_reference,
                    payment_status = %receipt.payment_status,
                    tickets = receipt.ticket_count,
                    "payment webhook applied"
                );
                WebhookAck::processed(receipt)
            }
            Err(err) => {
                warn!(error = %err, "payment webhook rejected");
                WebhookAck::failed(err)
            }
        }
    }

    async fn process_notification(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> AppResult<WebhookReceipt> {
        // The signature covers the exact bytes received, so check before parsing
        self.webhook_auth.check(raw_body, signature)?;

        let payload: XenditWebhookPayload = serde_json::from_slice(raw_body)
            .map_err(|err| AppError::ValidationError(format!("Invalid webhook payload: {}", err)))?;

        debug!(
            invoice_id = ?payload.id,
            external_id = ?payload.external_id,
            status = %payload.status,
            "payment webhook received"
        );

        let payment = self.resolve_payment(&payload).await?;
        let outcome = PaymentOutcome::from_gateway_status(&payload.status);

        self.apply_outcome(&payment, outcome, payload.payment_id.as_deref())
            .await
    }

    // By invoice id first, then by the booking reference inside the external id
    async fn resolve_payment(&self, payload: &XenditWebhookPayload) -> AppResult<Payment> {
        let invoice_ids: Vec<&str> = [payload.id.as_deref(), payload.invoice_id.as_deref()]
            .into_iter()
            .flatten()
            .collect();

        if let Some(first) = invoice_ids.first() {
            let second = invoice_ids.get(1).unwrap_or(first);
            let payment = sqlx::query_as::<_, Payment>(&format!(
                "SELECT {} FROM payment WHERE xendit_invoice_id IN (?, ?) LIMIT 1",
                PAYMENT_COLUMNS
            ))
            .bind(*first)
            .bind(*second)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(payment) = payment {
                return Ok(payment);
            }
        }

        let booking_reference = payload
            .external_id
            .as_deref()
            .and_then(booking_reference_from_external_id);

        match booking_reference {
            Some(booking_reference) => find_payment_by_reference(&self.pool, booking_reference)
                .await?
                .ok_or_else(|| AppError::NotFound("Payment not found".into())),
            None => Err(AppError::NotFound("Payment not found".into())),
        }
    }

    // Payment and tickets move together; replaying an outcome rewrites the same values.
    // The payment row is locked before its tickets, as everywhere else.
    async fn apply_outcome(
        &self,
        payment: &Payment,
        outcome: PaymentOutcome,
        xendit_payment_id: Option<&str>,
    ) -> AppResult<WebhookReceipt> {
        let mut tx = self.pool.begin().await?;

        let current: String =
            sqlx::query_scalar("SELECT payment_status FROM payment WHERE id = ? FOR UPDATE")
                .bind(payment.id)
                .fetch_one(&mut *tx)
                .await?;
        let current = PaymentStatus::try_from(current)
            .map_err(|err| AppError::DatabaseError(format!("Unknown payment status: {}", err)))?;

        let payment_status = if outcome.applies_to(current) {
            sqlx::query(
                r#"
                UPDATE payment
                SET payment_status = ?,
                    xendit_payment_id = COALESCE(?, xendit_payment_id)
                WHERE id = ?
                "#,
            )
            .bind(outcome.payment_status.as_ref())
            .bind(xendit_payment_id)
            .bind(payment.id)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE ticket SET status = ? WHERE booking_reference = ?")
                .bind(outcome.ticket_status.as_ref())
                .bind(&payment.booking_reference)
                .execute(&mut *tx)
                .await
                .map_err(|err| match err {
                    sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                        AppError::Conflict("A seat of this booking has been booked again".into())
                    }
                    other => AppError::from(other),
                })?;

            outcome.payment_status
        } else {
            debug!(
                booking_reference = %payment.booking_reference,
                payment_status = %current,
                "pending notification for a settled payment left unapplied"
            );
            current
        };

        let ticket_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ticket WHERE booking_reference = ?")
                .bind(&payment.booking_reference)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(WebhookReceipt {
            payment_id: payment.id,
            booking_reference: payment.booking_reference.clone(),
            payment_status,
            ticket_count,
        })
    }

    pub async fn get_payment_by_booking_reference(
        &self,
        booking_reference: &str,
    ) -> AppResult<PaymentResponse> {
        find_payment_by_reference(&self.pool, booking_reference)
            .await?
            .map(PaymentResponse::from)
            .ok_or_else(|| AppError::NotFound("Payment not found".into()))
    }

    // Payments of every booking holding at least one of the user's tickets, newest first
    pub async fn list_payments_for_user(&self, user_id: i32) -> AppResult<Vec<PaymentResponse>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {} FROM payment
            WHERE booking_reference IN (
                SELECT booking_reference FROM ticket WHERE user_id = ?
            )
            ORDER BY payment_date DESC, id DESC
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments.into_iter().map(PaymentResponse::from).collect())
    }

    /// Pulls the invoice status from the gateway and applies it the same way a
    /// notification would. Recovers bookings whose webhook never arrived.
    pub async fn sync_payment_status(&self, booking_reference: &str) -> AppResult<PaymentResponse> {
        let payment = find_payment_by_reference(&self.pool, booking_reference)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".into()))?;

        let invoice_id = payment.xendit_invoice_id.as_deref().ok_or_else(|| {
            AppError::ValidationError("Payment has no gateway invoice to sync".into())
        })?;

        let invoice = self.gateway.get_invoice(invoice_id).await?;
        let status = invoice.status.ok_or_else(|| {
            AppError::UpstreamFailure("Payment gateway returned no invoice status".into())
        })?;

        let receipt = self
            .apply_outcome(&payment, PaymentOutcome::from_gateway_status(&status), None)
            .await?;
        info!(
            %booking_reference,
            %invoice_id,
            gateway_status = %status,
            payment_status = %receipt.payment_status,
            "payment status synced"
        );

        self.get_payment_by_booking_reference(booking_reference)
            .await
    }
}
