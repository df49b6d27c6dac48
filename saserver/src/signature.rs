//! Webhook signature check for incident notifications.
//!
//! The sender signs `url_root` followed by every form field as `key` + `value`,
//! keys in ascending order, with HMAC-SHA1 and sends the base64 digest in the
//! `X-VictorOps-Signature` header.

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "X-VictorOps-Signature";

type HmacSha1 = Hmac<Sha1>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("no X-VictorOps-Signature header in request")]
    MissingHeader,
    #[error("webhook signature does not match")]
    Mismatch,
    #[error("unusable webhook key: {0}")]
    InvalidKey(String),
}

/// Form fields of a webhook, sorted by key. The first value of a repeated key wins.
pub type FormParams = BTreeMap<String, String>;

/// Decodes an `application/x-www-form-urlencoded` body.
pub fn parse_form(body: &[u8]) -> FormParams {
    let mut params = FormParams::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}

/// The string the sender signs.
pub fn signature_base(url_root: &str, params: &FormParams) -> String {
    params
        .iter()
        .fold(url_root.to_string(), |mut acc, (key, value)| {
            acc.push_str(key);
            acc.push_str(value);
            acc
        })
}

/// Base64 HMAC-SHA1 of the signature base, as the sender computes it.
pub fn compute_signature(
    secret: &str,
    url_root: &str,
    params: &FormParams,
) -> Result<String, AuthError> {
    let mac = signed(secret, url_root, params)?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Checks `header` against the expected signature in constant time.
pub fn verify_signature(
    secret: &str,
    url_root: &str,
    params: &FormParams,
    header: Option<&str>,
) -> Result<(), AuthError> {
    let header = header.ok_or(AuthError::MissingHeader)?;
    let supplied = STANDARD
        .decode(header.trim())
        .map_err(|_| AuthError::Mismatch)?;

    signed(secret, url_root, params)?
        .verify_slice(&supplied)
        .map_err(|_| AuthError::Mismatch)
}

fn signed(secret: &str, url_root: &str, params: &FormParams) -> Result<HmacSha1, AuthError> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
    mac.update(signature_base(url_root, params).as_bytes());
    Ok(mac)
}
