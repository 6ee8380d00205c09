use crate::utils::error::{AppError, AppResult};
use hmac::{Hmac, Mac};
use rocket::request::{FromRequest, Outcome};
use rocket::Request;
use sha2::Sha256;
use std::convert::Infallible;

type HmacSha256 = Hmac<Sha256>;

pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

/// Hex encoded HMAC-SHA256 of `body` keyed with `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a hex signature against the exact raw body, in constant time.
pub fn verify(secret: &str, body: &[u8], signature: &str) -> bool {
    let expected = match hex::decode(signature.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// How inbound gateway notifications are authenticated.
#[derive(Debug, Clone)]
pub enum WebhookAuth {
    /// Local development: notifications are accepted unsigned.
    Trusted,
    SharedSecret(String),
}

impl WebhookAuth {
    pub fn check(&self, raw_body: &[u8], signature: Option<&str>) -> AppResult<()> {
        match self {
            WebhookAuth::Trusted => Ok(()),
            WebhookAuth::SharedSecret(secret) => match signature {
                Some(signature) if verify(secret, raw_body, signature) => Ok(()),
                Some(_) => Err(AppError::AuthError("Invalid webhook signature".into())),
                None => Err(AppError::AuthError("Missing webhook signature".into())),
            },
        }
    }
}

// The callback token header, if the caller sent one
#[derive(Debug)]
pub struct CallbackToken(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CallbackToken {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(CallbackToken(
            request
                .headers()
                .get_one(CALLBACK_TOKEN_HEADER)
                .map(str::to_owned),
        ))
    }
}
