//! # Innate Primitives
//!
//! Hardcoded runtime constants for the Sensorwatch core.
//!
//! The contract schema is fixed: these values are compiled into the binary
//! and are immutable at runtime. Anything a deployment may vary lives in the
//! application configuration instead.

/// Scale applied on chain to temperature and humidity (two decimal places).
///
/// The gateway multiplies readings by this factor before `recordData`;
/// the normalizer places the decimal point back.
pub const SCALE_FACTOR: i64 = 100;

/// Name of the only event the adapter subscribes to.
pub const DATA_RECORDED_EVENT: &str = "DataRecorded";

/// Canonical Solidity signature of the event; its keccak-256 is `topics[0]`.
pub const DATA_RECORDED_SIGNATURE: &str = "DataRecorded(string,int256,int256)";

/// Number of hex digits in an address (20 bytes).
pub const ADDRESS_HEX_LENGTH: usize = 40;

/// Maximum length for device identifiers.
///
/// Longer identifiers are rejected before a reading is constructed.
pub const MAX_DEVICE_ID_LENGTH: usize = 256;

/// Device the dashboard follows when none is configured.
pub const DEFAULT_DEVICE_ID: &str = "device-01";

/// Number of most recent appends checked for re-delivered events.
///
/// Re-delivery happens when the adapter retries a block range, so
/// duplicates arrive close to their original. 128 covers several full
/// retry ranges at the gateway's write rate.
pub const DEFAULT_DEDUP_WINDOW: usize = 128;

/// Upper bound for a configured de-duplication window.
pub const MAX_DEDUP_WINDOW: usize = 65536;

/// Default wall-clock format (dotted time of day).
pub const DEFAULT_TIME_FORMAT: &str = "%H.%M.%S";

/// Largest accepted UTC offset for the display clock, in seconds.
pub const MAX_UTC_OFFSET_SECONDS: i32 = 86_399;
