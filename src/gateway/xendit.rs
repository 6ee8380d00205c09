use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::XenditConfig;
use crate::gateway::{CreateInvoiceRequest, Invoice, PaymentGateway};
use crate::utils::error::{AppError, AppResult};

const INVOICE_DURATION_SECS: u32 = 86_400;
const CURRENCY: &str = "IDR";
const DEFAULT_PHONE: &str = "6281234567890";
const PAYMENT_METHODS: &[&str] = &["CREDIT_CARD", "BCA", "BNI", "BRI", "MANDIRI", "QRIS"];

#[derive(Debug, Serialize)]
struct InvoiceCustomerBody {
    given_names: String,
    surname: String,
    email: String,
    mobile_number: String,
}

#[derive(Debug, Serialize)]
struct CreateInvoiceBody<'a> {
    external_id: &'a str,
    amount: f64,
    description: &'a str,
    currency: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payer_email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    invoice_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    should_send_email: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    success_redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer: Option<InvoiceCustomerBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_methods: Option<&'static [&'static str]>,
}

/// Xendit invoice API client (`/v2/invoices`), authenticated with the secret key.
pub struct XenditClient {
    http: Client,
    api_url: String,
    secret_key: Option<String>,
    frontend_url: String,
}

impl XenditClient {
    pub fn new(config: &XenditConfig, frontend_url: &str) -> AppResult<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(XenditClient {
            http,
            api_url: config.api_url.clone(),
            secret_key: config.secret_key.clone(),
            frontend_url: frontend_url.to_string(),
        })
    }

    fn secret_key(&self) -> AppResult<&str> {
        match self.secret_key.as_deref() {
            Some(key) if key.starts_with("xnd_") => Ok(key),
            _ => Err(AppError::UpstreamFailure(
                "Xendit secret key is missing or invalid".into(),
            )),
        }
    }

    fn full_body<'a>(
        &self,
        request: &'a CreateInvoiceRequest,
        amount: f64,
    ) -> CreateInvoiceBody<'a> {
        let (given_names, surname) = split_name(&request.customer.full_name);

        CreateInvoiceBody {
            external_id: &request.external_id,
            amount,
            description: &request.description,
            currency: CURRENCY,
            payer_email: Some(&request.payer_email),
            invoice_duration: Some(INVOICE_DURATION_SECS),
            should_send_email: Some(true),
            success_redirect_url: Some(format!(
                "{}/payment/success/{}",
                self.frontend_url, request.booking_reference
            )),
            failure_redirect_url: Some(format!(
                "{}/payment/failed/{}",
                self.frontend_url, request.booking_reference
            )),
            customer: Some(InvoiceCustomerBody {
                given_names,
                surname,
                email: request.customer.email.clone(),
                mobile_number: format!(
                    "+{}",
                    normalize_phone(request.customer.mobile_number.as_deref())
                ),
            }),
            payment_methods: Some(PAYMENT_METHODS),
        }
    }

    // Bare minimum Xendit accepts, used when the full body is rejected
    fn minimal_body<'a>(request: &'a CreateInvoiceRequest, amount: f64) -> CreateInvoiceBody<'a> {
        CreateInvoiceBody {
            external_id: &request.external_id,
            amount,
            description: &request.description,
            currency: CURRENCY,
            payer_email: None,
            invoice_duration: None,
            should_send_email: None,
            success_redirect_url: None,
            failure_redirect_url: None,
            customer: None,
            payment_methods: None,
        }
    }

    async fn post_invoice(
        &self,
        body: &CreateInvoiceBody<'_>,
    ) -> AppResult<Result<Invoice, (StatusCode, String)>> {
        let response = self
            .http
            .post(format!("{}/v2/invoices", self.api_url))
            .basic_auth(self.secret_key()?, None::<&str>)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(Ok(response.json::<Invoice>().await?))
        } else {
            Ok(Err((status, response.text().await.unwrap_or_default())))
        }
    }
}

#[async_trait]
impl PaymentGateway for XenditClient {
    async fn create_invoice(&self, request: &CreateInvoiceRequest) -> AppResult<Invoice> {
        self.secret_key()?;
        let amount = request.amount.to_f64().ok_or_else(|| {
            AppError::UpstreamFailure(format!("Amount {} cannot be invoiced", request.amount))
        })?;

        debug!(external_id = %request.external_id, amount, "creating xendit invoice");
        match self.post_invoice(&self.full_body(request, amount)).await? {
            Ok(invoice) => return Ok(invoice),
            Err((status, body)) if status == StatusCode::BAD_REQUEST => {
                warn!(%status, %body, "xendit rejected invoice, retrying with minimal body");
            }
            Err((status, body)) => {
                return Err(AppError::UpstreamFailure(format!(
                    "Xendit invoice creation failed: {} {}",
                    status, body
                )))
            }
        }

        match self.post_invoice(&Self::minimal_body(request, amount)).await? {
            Ok(invoice) => Ok(invoice),
            Err((status, body)) => Err(AppError::UpstreamFailure(format!(
                "Xendit invoice creation failed: {} {}",
                status, body
            ))),
        }
    }

    async fn get_invoice(&self, invoice_id: &str) -> AppResult<Invoice> {
        let response = self
            .http
            .get(format!("{}/v2/invoices/{}", self.api_url, invoice_id))
            .basic_auth(self.secret_key()?, None::<&str>)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamFailure(format!(
                "Failed to get invoice {}: {} {}",
                invoice_id, status, body
            )));
        }

        Ok(response.json::<Invoice>().await?)
    }
}

/// Indonesian mobile number without `+`: separators removed, leading `0`
/// replaced by the `62` country code.
pub fn normalize_phone(phone: Option<&str>) -> String {
    let digits: String = phone
        .unwrap_or(DEFAULT_PHONE)
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '+'))
        .collect();

    if digits.is_empty() {
        DEFAULT_PHONE.to_string()
    } else if digits.starts_with("62") {
        digits
    } else {
        format!("62{}", digits.trim_start_matches('0'))
    }
}

// First word is the given name, the rest the surname
pub fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let given = parts.next().unwrap_or("Customer").to_string();
    let surname = parts.collect::<Vec<_>>().join(" ");

    if surname.is_empty() {
        (given, "User".to_string())
    } else {
        (given, surname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InvoiceCustomer;
    use rust_decimal::Decimal;

    fn client(secret_key: Option<&str>) -> XenditClient {
        XenditClient::new(
            &XenditConfig {
                secret_key: secret_key.map(str::to_string),
                webhook_token: None,
                api_url: "http://127.0.0.1:9".into(),
            },
            "https://tiketin.example",
        )
        .unwrap()
    }

    fn request() -> CreateInvoiceRequest {
        CreateInvoiceRequest {
            external_id: "tiketin_BOOK-20250806-ABC123_1733472000000".into(),
            amount: Decimal::new(15000000, 2),
            payer_email: "john.doe@email.com".into(),
            description: "Train Tickets - BOOK-20250806-ABC123 (1 tickets)".into(),
            booking_reference: "BOOK-20250806-ABC123".into(),
            customer: InvoiceCustomer {
                full_name: "John Ronald Doe".into(),
                email: "john.doe@email.com".into(),
                mobile_number: Some("0812-3456-789".into()),
            },
        }
    }

    #[test]
    fn phone_numbers_get_country_code() {
        assert_eq!(normalize_phone(Some("0812-3456-789")), "628123456789");
        assert_eq!(normalize_phone(Some("+62 812 3456 789")), "628123456789");
        assert_eq!(normalize_phone(Some("812345")), "62812345");
        assert_eq!(normalize_phone(Some(" ")), DEFAULT_PHONE);
        assert_eq!(normalize_phone(None), DEFAULT_PHONE);
    }

    #[test]
    fn names_split_into_given_and_surname() {
        assert_eq!(
            split_name("John Ronald Doe"),
            ("John".to_string(), "Ronald Doe".to_string())
        );
        assert_eq!(split_name("Cher"), ("Cher".to_string(), "User".to_string()));
        assert_eq!(split_name(""), ("Customer".to_string(), "User".to_string()));
    }

    #[test]
    fn full_body_carries_redirects_and_customer() {
        let client = client(Some("xnd_development_123"));
        let request = request();
        let body = serde_json::to_value(client.full_body(&request, 150000.0)).unwrap();

        assert_eq!(body["amount"], 150000.0);
        assert_eq!(body["currency"], "IDR");
        assert_eq!(
            body["success_redirect_url"],
            "https://tiketin.example/payment/success/BOOK-20250806-ABC123"
        );
        assert_eq!(body["customer"]["given_names"], "John");
        assert_eq!(body["customer"]["mobile_number"], "+628123456789");

        let minimal = serde_json::to_value(XenditClient::minimal_body(&request, 150000.0)).unwrap();
        assert!(minimal.get("customer").is_none());
        assert!(minimal.get("payer_email").is_none());
    }

    #[tokio::test]
    async fn refuses_to_call_without_a_secret_key() {
        let err = client(None).create_invoice(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamFailure(_)));

        let err = client(Some("sk_live_123")).get_invoice("inv_1").await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamFailure(_)));
    }
}
