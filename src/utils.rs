// Utility modules

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::{
    constants::MAX_PAGE_LIMIT,
    error::{AppError, Result},
};

/// Clamp a caller-supplied page size into `1..=MAX_PAGE_LIMIT`.
pub fn ensure_page_limit(limit: Option<u32>, default: u32) -> Result<u32> {
    let limit = limit.unwrap_or(default);
    if limit == 0 {
        return Err(AppError::BadRequest("limit must be greater than zero".to_string()));
    }
    if limit > MAX_PAGE_LIMIT {
        return Err(AppError::BadRequest(format!(
            "limit must not exceed {}",
            MAX_PAGE_LIMIT
        )));
    }
    Ok(limit)
}

/// Validates a `0x`-prefixed 20-byte hex address and returns it lowercased.
pub fn normalize_address(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| AppError::BadRequest(format!("Invalid address: {}", trimmed)))?;
    if body.len() != 40 || hex::decode(body).is_err() {
        return Err(AppError::BadRequest(format!("Invalid address: {}", trimmed)));
    }
    Ok(format!("0x{}", body.to_ascii_lowercase()))
}

pub fn is_address(raw: &str) -> bool {
    normalize_address(raw).is_ok()
}

/// Validates a `0x`-prefixed 32-byte transaction hash and returns it lowercased.
pub fn normalize_tx_hash(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("0x")
        .ok_or_else(|| AppError::BadRequest("Transaction hash must start with 0x".to_string()))?;
    if body.len() != 64 || hex::decode(body).is_err() {
        return Err(AppError::BadRequest(
            "Transaction hash must be 32 bytes of hex".to_string(),
        ));
    }
    Ok(format!("0x{}", body.to_ascii_lowercase()))
}

/// Parses a human token amount ("1.5") and rejects zero, negatives and garbage.
pub fn parse_positive_amount(raw: &str) -> Result<Decimal> {
    let value = Decimal::from_str(raw.trim())
        .map_err(|_| AppError::BadRequest(format!("Invalid amount: {}", raw.trim())))?;
    if value <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "Amount must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

/// "1.500000" -> "1.5", "2.000" -> "2"
pub fn trim_decimal_string(raw: &str) -> String {
    if !raw.contains('.') {
        return raw.to_string();
    }
    let trimmed = raw.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Accepts `"1.5"` or `1.5` for amount-like fields; blank strings become `None`.
pub fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Any JSON value that does not fit `T` (including `null`) becomes `T::default()`.
pub fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    use serde::Deserialize;

    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Accepts `1.5` or `"1.5"`; anything else is `None`.
pub fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    })
}

/// Random hex identifier for sessions.
pub fn random_id() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}
