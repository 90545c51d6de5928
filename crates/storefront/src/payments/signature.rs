//! Checkout signature verification.
//!
//! After a successful checkout the provider hands the browser
//! `hex(HMAC-SHA256(order_id + "|" + payment_id, key_secret))`. Recomputing it
//! server-side is the tamper check that ties a payment to the order it was
//! created for.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

/// Compute the expected hex signature for an order/payment pair.
#[must_use]
pub fn sign(key_secret: &SecretString, provider_order_id: &str, provider_payment_id: &str) -> String {
    // HMAC accepts keys of any length.
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(key_secret.expose_secret().as_bytes()) else {
        return String::new();
    };
    mac.update(provider_order_id.as_bytes());
    mac.update(b"|");
    mac.update(provider_payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Whether `signature` matches the order/payment pair.
#[must_use]
pub fn verify(
    key_secret: &SecretString,
    provider_order_id: &str,
    provider_payment_id: &str,
    signature: &str,
) -> bool {
    let expected = sign(key_secret, provider_order_id, provider_payment_id);
    !expected.is_empty() && constant_time_compare(&expected, &signature.trim().to_ascii_lowercase())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
