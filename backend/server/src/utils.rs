use std::net::SocketAddr;

use axum::http::{HeaderMap, header::CONTENT_TYPE};
use serde_json::Value;

use crate::error::AppError;

pub const FORWARDED_FOR: &str = "x-forwarded-for";
pub const UNKNOWN_IDENTITY: &str = "unknown";

pub const OPTION_ID: &str = "optionId";

/// First `X-Forwarded-For` entry, else the peer's IP, else `"unknown"`.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|address| address.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
}

/// `application/json`, parameters such as `charset` ignored.
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}

/// Body must be a JSON object whose `optionId` is an integer.
pub fn get_option_id_from_body(body: &[u8]) -> Result<i64, AppError> {
    let Value::Object(vote) =
        serde_json::from_slice::<Value>(body).map_err(|_| AppError::MalformedPayload)?
    else {
        return Err(AppError::MalformedPayload);
    };

    vote.get(OPTION_ID)
        .and_then(as_integer)
        .ok_or(AppError::MalformedPayload)
}

// integral floats like 3.0 count, 3.5 or "3" don't
fn as_integer(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };

    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|float| float.fract() == 0.0)
            .filter(|float| *float >= i64::MIN as f64 && *float < i64::MAX as f64)
            .map(|float| float as i64)
    })
}
