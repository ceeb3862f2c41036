//! Address and argument encoding helpers
//!
//! Entry-function arguments travel as JSON values: free text is UTF-8 encoded
//! and sent as a `0x`-prefixed hex byte string, numbers as plain integers and
//! addresses as normalized strings. View results come back in the same shape
//! and are decoded with the `decode_*` helpers.

use crate::classifier::{ClassifiedError, ErrorKind};
use serde_json::Value;

/// Length in hex characters of a long-form account address
const ADDRESS_HEX_LEN: usize = 64;

pub fn string_to_bytes(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Lossy UTF-8 decode; invalid sequences become U+FFFD
pub fn bytes_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Normalize an account address to `0x` + 64 lowercase hex characters
pub fn normalize_address(address: &str) -> Result<String, ClassifiedError> {
    let trimmed = address.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex_part.is_empty() || hex_part.len() > ADDRESS_HEX_LEN {
        return Err(ClassifiedError::new(
            ErrorKind::InvalidArgument,
            format!("invalid address length: {:?}", address),
        ));
    }
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ClassifiedError::new(
            ErrorKind::InvalidArgument,
            format!("address is not hex: {:?}", address),
        ));
    }

    Ok(format!(
        "0x{:0>width$}",
        hex_part.to_ascii_lowercase(),
        width = ADDRESS_HEX_LEN
    ))
}

/// Compare two addresses after normalization
pub fn same_address(a: &str, b: &str) -> bool {
    match (normalize_address(a), normalize_address(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// `0x1234...abcd` form for log lines and notifications
pub fn short_address(address: &str) -> String {
    if address.len() <= 12 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

/// Encode free text as a byte-vector argument
pub fn text_arg(text: &str) -> Value {
    bytes_arg(&string_to_bytes(text))
}

pub fn bytes_arg(bytes: &[u8]) -> Value {
    Value::String(format!("0x{}", hex::encode(bytes)))
}

pub fn u64_arg(value: u64) -> Value {
    Value::from(value)
}

pub fn u8_arg(value: u8) -> Value {
    Value::from(value)
}

/// View functions take 64-bit integers as decimal strings
pub fn u64_view_arg(value: u64) -> Value {
    Value::String(value.to_string())
}

/// Encode an address argument, normalizing it first
pub fn address_arg(address: &str) -> Result<Value, ClassifiedError> {
    normalize_address(address).map(Value::String)
}

/// Decode a byte-vector value (`"0x..."` hex string or JSON array of numbers)
pub fn decode_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::String(s) => {
            let hex_part = s.strip_prefix("0x").unwrap_or(s);
            hex::decode(hex_part).ok()
        }
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
            .collect(),
        _ => None,
    }
}

/// Decode a byte-vector value into text
pub fn decode_text(value: &Value) -> Option<String> {
    decode_bytes(value).map(|bytes| bytes_to_string(&bytes))
}

/// Decode an integer sent either as a JSON number or as a decimal string
pub fn decode_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
