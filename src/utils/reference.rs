use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

const REFERENCE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const EXTERNAL_ID_PREFIX: &str = "tiketin";

static EXTERNAL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^tiketin_(.+?)_\d+$").expect("valid external id pattern"));

/// `BOOK-YYYYMMDD-XXXXXX`. Uniqueness is enforced by the payment table, not here.
pub fn generate_booking_reference() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())] as char)
        .collect();

    format!("BOOK-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

// External id sent to the gateway; it carries the booking reference back to us
pub fn build_external_id(booking_reference: &str) -> String {
    format!(
        "{}_{}_{}",
        EXTERNAL_ID_PREFIX,
        booking_reference,
        Utc::now().timestamp_millis()
    )
}

pub fn booking_reference_from_external_id(external_id: &str) -> Option<&str> {
    EXTERNAL_ID
        .captures(external_id)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}
