//! Request credential checks
//!
//! Credentials are compared by SHA-256 digest so the comparison time does
//! not depend on how many leading bytes match.

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

use crate::error::ApiError;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

fn matches(provided: &str, expected: &str) -> bool {
    Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Order webhooks carry `X-Webhook-Secret`; checked only when a secret is configured
pub fn verify_webhook_secret(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let provided = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if matches(provided, expected) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("Invalid webhook secret"))
    }
}

/// `Authorization: Bearer <token>`; with no token configured every caller is refused
pub fn verify_bearer(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    match (bearer_token(headers), expected) {
        (Some(provided), Some(expected)) if matches(provided, expected) => Ok(()),
        _ => Err(ApiError::Unauthorized("Unauthorized")),
    }
}
