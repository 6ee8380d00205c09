use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::models::booking::{PaymentMethod, TicketStatus};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Where a gateway status leaves the payment and the tickets of its booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub payment_status: PaymentStatus,
    pub ticket_status: TicketStatus,
}

impl PaymentOutcome {
    // Gateway statuses are compared case-insensitively; unknown ones stay pending
    pub fn from_gateway_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "paid" | "settled" => PaymentOutcome {
                payment_status: PaymentStatus::Success,
                ticket_status: TicketStatus::Paid,
            },
            "expired" | "failed" => PaymentOutcome {
                payment_status: PaymentStatus::Failed,
                ticket_status: TicketStatus::Canceled,
            },
            _ => PaymentOutcome {
                payment_status: PaymentStatus::Pending,
                ticket_status: TicketStatus::PendingPayment,
            },
        }
    }

    // A pending report never reopens a payment that already settled or failed
    pub fn applies_to(&self, current: PaymentStatus) -> bool {
        self.payment_status.is_terminal() || !current.is_terminal()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Payment {
    pub id: i32,
    pub booking_reference: String,
    #[sqlx(try_from = "String")]
    pub payment_method: PaymentMethod,
    #[sqlx(try_from = "String")]
    pub payment_status: PaymentStatus,
    pub payment_date: NaiveDateTime,
    pub amount: Decimal,
    pub xendit_invoice_id: Option<String>,
    pub xendit_payment_id: Option<String>,
    pub payment_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: i32,
    pub booking_reference: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_date: NaiveDateTime,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub xendit_invoice_id: Option<String>,
    pub xendit_payment_id: Option<String>,
    pub payment_url: Option<String>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        PaymentResponse {
            id: payment.id,
            booking_reference: payment.booking_reference,
            payment_method: payment.payment_method,
            payment_status: payment.payment_status,
            payment_date: payment.payment_date,
            amount: payment.amount,
            xendit_invoice_id: payment.xendit_invoice_id,
            xendit_payment_id: payment.xendit_payment_id,
            payment_url: payment.payment_url,
        }
    }
}

/// Invoice callback body as sent by Xendit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XenditWebhookPayload {
    pub id: Option<String>,
    pub external_id: Option<String>,
    pub status: String,
    pub amount: Option<f64>,
    pub paid_amount: Option<f64>,
    pub payment_method: Option<String>,
    pub payment_channel: Option<String>,
    pub paid_at: Option<String>,
    pub invoice_id: Option<String>,
    pub payment_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookReceipt {
    pub payment_id: i32,
    pub booking_reference: String,
    pub payment_status: PaymentStatus,
    pub ticket_count: i64,
}

/// Acknowledgement returned to the gateway, whether or not processing worked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<WebhookReceipt>,
}

impl WebhookAck {
    pub fn processed(receipt: WebhookReceipt) -> Self {
        WebhookAck {
            success: true,
            message: "Webhook processed successfully".to_string(),
            data: Some(receipt),
        }
    }

    pub fn failed(reason: impl std::fmt::Display) -> Self {
        WebhookAck {
            success: false,
            message: format!("Webhook processing failed: {}", reason),
            data: None,
        }
    }
}
