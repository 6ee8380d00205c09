//! Outbound payment gateway.
//!
//! The booking and payment services only see [`PaymentGateway`]; the Xendit
//! REST client is the production implementation.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::error::AppResult;

pub mod xendit;

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceCustomer {
    pub full_name: String,
    pub email: String,
    pub mobile_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateInvoiceRequest {
    pub external_id: String,
    pub amount: Decimal,
    pub payer_email: String,
    pub description: String,
    pub booking_reference: String,
    pub customer: InvoiceCustomer,
}

/// Hosted invoice as returned by the gateway. Every field is optional on the
/// wire; callers decide which ones they cannot do without.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: Option<String>,
    pub external_id: Option<String>,
    pub status: Option<String>,
    pub invoice_url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_invoice(&self, request: &CreateInvoiceRequest) -> AppResult<Invoice>;

    async fn get_invoice(&self, invoice_id: &str) -> AppResult<Invoice>;
}
