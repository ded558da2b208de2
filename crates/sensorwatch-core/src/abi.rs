//! # ABI Module
//!
//! Contract log codec for the `DataRecorded` event, built on `ethers-core`'s
//! ABI decoder.
//!
//! ```solidity
//! event DataRecorded(string deviceId, int256 temperature, int256 humidity);
//! ```
//!
//! No argument is indexed, so `topics` holds only the event signature hash and
//! the three values live ABI-encoded in `data`. The topic is derived from the
//! event definition rather than stored, so it cannot drift from the decoder.
//!
//! The decoder does not judge numeric ranges; it hands the two int256 values
//! to the normalizer as signed decimal text.

use crate::primitives::DATA_RECORDED_EVENT;
use crate::{LogEntry, RawEvent, SensorError};
use ethers_core::abi::{self, Event, EventParam, ParamType, RawLog, Token};
use ethers_core::types::{Bytes, H256, I256};
use std::sync::LazyLock;

static DATA_RECORDED: LazyLock<Event> = LazyLock::new(|| Event {
    name: DATA_RECORDED_EVENT.to_string(),
    inputs: vec![
        param("deviceId", ParamType::String),
        param("temperature", ParamType::Int(256)),
        param("humidity", ParamType::Int(256)),
    ],
    anonymous: false,
});

fn param(name: &str, kind: ParamType) -> EventParam {
    EventParam {
        name: name.to_string(),
        kind,
        indexed: false,
    }
}

/// `topics[0]` of every `DataRecorded` log (keccak-256 of the signature).
#[must_use]
pub fn data_recorded_topic() -> H256 {
    DATA_RECORDED.signature()
}

/// Decode a provider log into a `RawEvent`.
///
/// Fails when `topics[0]` is not the `DataRecorded` hash or the data is not a
/// well-formed `(string, int256, int256)` encoding.
pub fn decode_data_recorded(log: &LogEntry) -> Result<RawEvent, SensorError> {
    let raw = RawLog {
        topics: log.topics.clone(),
        data: log.data.to_vec(),
    };
    let parsed = DATA_RECORDED
        .parse_log(raw)
        .map_err(|e| SensorError::MalformedLog(e.to_string()))?;

    let mut values = parsed.params.into_iter().map(|p| p.value);
    match (values.next(), values.next(), values.next()) {
        (Some(Token::String(device_id)), Some(Token::Int(temperature)), Some(Token::Int(humidity))) => {
            Ok(RawEvent::new(
                device_id,
                I256::from_raw(temperature).to_string(),
                I256::from_raw(humidity).to_string(),
                log.block_number,
                log.log_index,
            ))
        }
        _ => Err(SensorError::MalformedLog(
            "unexpected DataRecorded parameters".to_string(),
        )),
    }
}

/// ABI-encode `DataRecorded` arguments as log data.
///
/// Matches what the contract emits for `recordData(deviceId, temperature, humidity)`.
#[must_use]
pub fn encode_data_recorded(device_id: &str, temperature: i64, humidity: i64) -> Bytes {
    abi::encode(&[
        Token::String(device_id.to_string()),
        Token::Int(I256::from(temperature).into_raw()),
        Token::Int(I256::from(humidity).into_raw()),
    ])
    .into()
}

/// Parse a scaled integer field.
///
/// Accepts a decimal integer (`"2550"`, `"-305"`) or a short `0x`-prefixed hex
/// value. Anything outside `i64` is refused.
#[must_use]
pub fn parse_scaled(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()) => {
            i64::from_str_radix(digits, 16).ok()
        }
        Some(_) => None,
        None => trimmed.parse::<i64>().ok(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
