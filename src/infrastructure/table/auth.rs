//! Shared Key Lite request signing for the table service

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::connection::StorageAccount;
use crate::domain::DomainError;

type HmacSha256 = Hmac<Sha256>;

/// RFC 1123 date as expected in the `x-ms-date` header
pub(super) fn format_request_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Builds the `Authorization` header value.
///
/// `path` is the encoded URL path as sent on the wire; the canonicalized
/// resource is `/{account}{path}`.
pub(super) fn shared_key_lite(
    account: &StorageAccount,
    request_date: &str,
    path: &str,
) -> Result<String, DomainError> {
    let string_to_sign = format!("{}\n/{}{}", request_date, account.name(), path);

    let mut mac = HmacSha256::new_from_slice(account.key())
        .map_err(|e| DomainError::configuration(format!("Invalid signing key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(format!("SharedKeyLite {}:{}", account.name(), signature))
}
