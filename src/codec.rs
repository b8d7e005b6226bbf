//! Conversion between the ledger's hexadecimal integers and [`SessionId`].
//!
//! The ledger encodes integers as arbitrary-precision hex strings. Locally a
//! session id is a `u64`; anything wider is reported as an overflow instead
//! of being truncated.

use crate::ledger::SessionId;
use derive_more::Display;
use tracing::{instrument, warn};

/// Failure converting an encoded session id.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum CodecError {
    /// The input is not a hexadecimal (or, for user input, decimal) integer.
    #[display("Malformed session id: {:?}", _0)]
    Malformed(String),

    /// The value does not fit in the local integer type.
    #[display("Session id {} exceeds the supported range", _0)]
    Overflow(String),
}

impl std::error::Error for CodecError {}

/// Decodes a hexadecimal session id, with or without a `0x` prefix.
#[instrument]
pub fn decode_session_id(encoded: &str) -> Result<SessionId, CodecError> {
    let trimmed = encoded.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() {
        warn!("Empty hexadecimal session id");
        return Err(CodecError::Malformed(encoded.to_string()));
    }

    let mut value: u64 = 0;
    for ch in digits.chars() {
        let digit = ch
            .to_digit(16)
            .ok_or_else(|| CodecError::Malformed(encoded.to_string()))?;
        value = value
            .checked_mul(16)
            .and_then(|v| v.checked_add(u64::from(digit)))
            .ok_or_else(|| {
                warn!(encoded, "Session id overflows u64");
                CodecError::Overflow(encoded.to_string())
            })?;
    }

    Ok(SessionId::new(value))
}

/// Encodes a session id in the ledger's hexadecimal form.
pub fn encode_session_id(id: SessionId) -> String {
    format!("{:#x}", id.get())
}

/// Parses a session id typed by a user as a non-negative decimal integer.
#[instrument]
pub fn parse_session_id(input: &str) -> Result<SessionId, CodecError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CodecError::Malformed(input.to_string()));
    }
    // All digits, so the only possible parse failure is range.
    trimmed
        .parse::<u64>()
        .map(SessionId::new)
        .map_err(|_| CodecError::Overflow(input.to_string()))
}
