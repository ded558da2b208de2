//! # Core Type Definitions
//!
//! This module contains all core types for the Sensorwatch ingestion core:
//! - Identifiers (`DeviceId`, `BlockNumber`, `ContractAddress`, `SessionId`)
//! - Fixed-point decimal values (`Centi`)
//! - Raw provider input (`LogEntry`, `RawEvent`, `BlockMeta`)
//! - The normalized observation (`Reading`)
//! - Error types (`SensorError`, `Rejection`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Are immutable once constructed where they represent observations
//! - Implement `Ord` where they participate in ordering or de-duplication

use crate::primitives::{ADDRESS_HEX_LENGTH, MAX_DEVICE_ID_LENGTH, SCALE_FACTOR};
use ethers_core::types::{Address, Bytes, H256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of the sensor that produced a reading.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device id, rejecting empty or oversized identifiers.
    pub fn new(id: impl Into<String>) -> Result<Self, SensorError> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_DEVICE_ID_LENGTH {
            return Err(SensorError::InvalidDeviceId(id));
        }
        Ok(Self(id))
    }

    /// Get the device id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordinal of a block on chain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct BlockNumber(pub u64);

impl BlockNumber {
    /// The following block, saturating at `u64::MAX`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Get the raw block number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of the deployed telemetry contract.
///
/// Parsed from `0x` followed by 40 hex digits in any case; displayed as
/// lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractAddress(Address);

impl ContractAddress {
    /// Parse an address string. A checksummed address is accepted as is.
    pub fn parse(raw: &str) -> Result<Self, SensorError> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| SensorError::InvalidAddress(raw.to_string()))?;

        if digits.len() != ADDRESS_HEX_LENGTH {
            return Err(SensorError::InvalidAddress(raw.to_string()));
        }
        digits
            .parse::<Address>()
            .map(Self)
            .map_err(|_| SensorError::InvalidAddress(raw.to_string()))
    }

    /// The address as an `ethers` value.
    #[must_use]
    pub fn as_address(&self) -> Address {
        self.0
    }

    /// True when `other` (as reported by a provider) is this contract.
    #[must_use]
    pub fn matches(&self, other: &Address) -> bool {
        self.0 == *other
    }
}

impl TryFrom<String> for ContractAddress {
    type Error = SensorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContractAddress> for String {
    fn from(address: ContractAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identifier of one capability-provider session (one wallet connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// FIXED-POINT DECIMAL
// =============================================================================

/// A decimal value with exactly two fractional digits.
///
/// Stores the on-chain scaled integer unchanged; the decimal point sits
/// `SCALE_FACTOR` to the left. `Centi(2550)` is `25.50`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Centi(pub i64);

impl Centi {
    /// Create from the raw scaled integer.
    #[must_use]
    pub const fn from_scaled(scaled: i64) -> Self {
        Self(scaled)
    }

    /// The raw scaled integer.
    #[must_use]
    pub const fn scaled(self) -> i64 {
        self.0
    }

    /// Absolute fractional hundredths (0..=99).
    #[must_use]
    pub const fn fraction(self) -> u64 {
        (self.0 % SCALE_FACTOR).unsigned_abs()
    }
}

impl fmt::Display for Centi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let whole = (self.0 / SCALE_FACTOR).unsigned_abs();
        write!(f, "{}{}.{:02}", sign, whole, self.fraction())
    }
}

// =============================================================================
// PROVIDER INPUT
// =============================================================================

/// One raw log as returned by the provider, before ABI decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Emitting contract address.
    pub address: Address,
    /// Indexed topics; `topics[0]` is the event signature hash.
    pub topics: Vec<H256>,
    /// ABI encoding of the non-indexed arguments.
    pub data: Bytes,
    /// Containing block.
    pub block_number: BlockNumber,
    /// Position of the log within its block.
    pub log_index: u64,
    /// True when the log was dropped by a chain reorganisation.
    #[serde(default)]
    pub removed: bool,
}

/// Decoded `DataRecorded` arguments plus the log position.
///
/// The numeric arguments are kept as text; the normalizer decides whether
/// they are valid scaled integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub device_id: String,
    pub temperature: String,
    pub humidity: String,
    pub block_number: BlockNumber,
    pub log_index: u64,
}

impl RawEvent {
    /// Create a raw event.
    #[must_use]
    pub fn new(
        device_id: impl Into<String>,
        temperature: impl Into<String>,
        humidity: impl Into<String>,
        block_number: BlockNumber,
        log_index: u64,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            temperature: temperature.into(),
            humidity: humidity.into(),
            block_number,
            log_index,
        }
    }
}

/// Metadata of the block containing an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    pub number: BlockNumber,
    /// Consensus timestamp, seconds since the Unix epoch.
    pub timestamp: i64,
}

impl BlockMeta {
    /// Create block metadata.
    #[must_use]
    pub const fn new(number: BlockNumber, timestamp: i64) -> Self {
        Self { number, timestamp }
    }
}

// =============================================================================
// READING
// =============================================================================

/// One normalized sensor observation, ready for display.
///
/// Fields are private: a `Reading` cannot change after the normalizer
/// builds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    device_id: DeviceId,
    temperature_celsius: Centi,
    humidity_percent: Centi,
    observed_at: String,
    observed_at_epoch: i64,
    source_block: BlockNumber,
    log_index: u64,
}

impl Reading {
    pub(crate) fn new(
        device_id: DeviceId,
        temperature_celsius: Centi,
        humidity_percent: Centi,
        observed_at: String,
        observed_at_epoch: i64,
        source_block: BlockNumber,
        log_index: u64,
    ) -> Self {
        Self {
            device_id,
            temperature_celsius,
            humidity_percent,
            observed_at,
            observed_at_epoch,
            source_block,
            log_index,
        }
    }

    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    #[must_use]
    pub fn temperature_celsius(&self) -> Centi {
        self.temperature_celsius
    }

    #[must_use]
    pub fn humidity_percent(&self) -> Centi {
        self.humidity_percent
    }

    /// Display wall-clock time of the containing block.
    #[must_use]
    pub fn observed_at(&self) -> &str {
        &self.observed_at
    }

    /// Raw block timestamp in seconds.
    #[must_use]
    pub fn observed_at_epoch(&self) -> i64 {
        self.observed_at_epoch
    }

    #[must_use]
    pub fn source_block(&self) -> BlockNumber {
        self.source_block
    }

    #[must_use]
    pub fn log_index(&self) -> u64 {
        self.log_index
    }

    /// Key used to recognize re-delivered events.
    #[must_use]
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            source_block: self.source_block,
            device_id: self.device_id.clone(),
            temperature: self.temperature_celsius,
            humidity: self.humidity_percent,
        }
    }
}

/// Composite identity of a reading for de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DedupKey {
    pub source_block: BlockNumber,
    pub device_id: DeviceId,
    pub temperature: Centi,
    pub humidity: Centi,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Sensorwatch core.
///
/// - No silent failures
/// - The core never panics; all errors are recoverable values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// A device identifier is empty or too long.
    #[error("Invalid device id: {0:?}")]
    InvalidDeviceId(String),

    /// A contract address is not `0x` + 40 hex digits.
    #[error("Invalid contract address: {0:?}")]
    InvalidAddress(String),

    /// A log could not be decoded as `DataRecorded`.
    #[error("Malformed log: {0}")]
    MalformedLog(String),

    /// The display clock configuration is invalid.
    #[error("Invalid display clock: {0}")]
    InvalidClock(String),

    /// A lifecycle transition was requested from the wrong state.
    #[error("Invalid lifecycle transition: {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

/// Why the normalizer refused to build a `Reading` from an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The event belongs to a device other than the target (filter, not error).
    #[error("Event for foreign device {0:?}")]
    ForeignDevice(String),

    /// A numeric field is not a valid scaled integer.
    #[error("Field {field} is not a scaled integer: {raw:?}")]
    MalformedField { field: &'static str, raw: String },

    /// The block metadata does not describe the event's block.
    #[error("Block metadata mismatch: event in {event}, metadata for {block}")]
    BlockMismatch {
        event: BlockNumber,
        block: BlockNumber,
    },

    /// The block timestamp cannot be represented as a wall-clock time.
    #[error("Block timestamp out of range: {0}")]
    InvalidTimestamp(i64),
}

impl Rejection {
    /// True for the device filter, which is expected traffic rather than a fault.
    #[must_use]
    pub fn is_filter(&self) -> bool {
        matches!(self, Self::ForeignDevice(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centi_display_two_decimals() {
        assert_eq!(Centi(2550).to_string(), "25.50");
        assert_eq!(Centi(6012).to_string(), "60.12");
        assert_eq!(Centi(7).to_string(), "0.07");
        assert_eq!(Centi(-305).to_string(), "-3.05");
        assert_eq!(Centi(-5).to_string(), "-0.05");
        assert_eq!(Centi(0).to_string(), "0.00");
    }

    #[test]
    fn centi_fraction_is_unsigned() {
        let value = Centi::from_scaled(-1234);
        assert_eq!(value.fraction(), 34);
        assert_eq!(value.scaled(), -1234);
    }

    #[test]
    fn centi_extremes_do_not_overflow() {
        assert_eq!(Centi(i64::MIN).to_string(), "-92233720368547758.08");
        assert_eq!(Centi(i64::MAX).to_string(), "92233720368547758.07");
    }

    #[test]
    fn device_id_rejects_empty() {
        assert!(DeviceId::new("").is_err());
        assert!(DeviceId::new("x".repeat(MAX_DEVICE_ID_LENGTH + 1)).is_err());
        assert_eq!(DeviceId::new("device-01").expect("id").as_str(), "device-01");
    }

    #[test]
    fn contract_address_normalizes_case() {
        let address =
            ContractAddress::parse("0x5FbDB2315678afecb367f032d93F642f64180aa3").expect("address");
        assert_eq!(address.to_string(), "0x5fbdb2315678afecb367f032d93f642f64180aa3");

        let upper =
            ContractAddress::parse("0X5FBDB2315678AFECB367F032D93F642F64180AA3").expect("address");
        assert!(address.matches(&upper.as_address()));
        assert!(!address.matches(&Address::zero()));
    }

    #[test]
    fn contract_address_rejects_garbage() {
        assert!(ContractAddress::parse("").is_err());
        assert!(ContractAddress::parse("5fbdb2315678afecb367f032d93f642f64180aa3").is_err());
        assert!(ContractAddress::parse("0x5fbdb").is_err());
        assert!(ContractAddress::parse("0xzzbdb2315678afecb367f032d93f642f64180aa3").is_err());
    }

    #[test]
    fn contract_address_serde_validates() {
        let parsed: Result<ContractAddress, _> = serde_json::from_str("\"0x1234\"");
        assert!(parsed.is_err());

        let address =
            ContractAddress::parse("0x5FbDB2315678afecb367f032d93F642f64180aa3").expect("address");
        let json = serde_json::to_string(&address).expect("serialize");
        assert_eq!(json, "\"0x5fbdb2315678afecb367f032d93f642f64180aa3\"");
    }

    #[test]
    fn block_number_next_saturates() {
        assert_eq!(BlockNumber(1).next(), BlockNumber(2));
        assert_eq!(BlockNumber(u64::MAX).next(), BlockNumber(u64::MAX));
    }

    #[test]
    fn rejection_filter_flag() {
        assert!(Rejection::ForeignDevice("device-02".into()).is_filter());
        assert!(!Rejection::InvalidTimestamp(0).is_filter());
    }
}
