//! # sensorwatch-core
//!
//! The deterministic ingestion core for Sensorwatch - THE LOGIC.
//!
//! This crate turns `DataRecorded(deviceId, temperature, humidity)` contract
//! logs into an ordered, de-duplicated series of sensor readings:
//!
//! ```text
//! LogEntry ──abi──▶ RawEvent ──Normalizer──▶ Reading ──SeriesAccumulator──▶ SeriesSnapshot
//!                                  ▲                          ▲
//!                              BlockMeta               Lifecycle::deliver
//! ```
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Owns the series; the only mutation path is `Lifecycle::deliver`
//! - Uses fixed-point integers for every measured value (no floats)
//! - Never initiates interaction; it only reacts to delivered events
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod abi;
pub mod clock;
pub mod lifecycle;
pub mod normalizer;
pub mod primitives;
pub mod series;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    BlockMeta, BlockNumber, Centi, ContractAddress, DedupKey, DeviceId, LogEntry, RawEvent,
    Reading, Rejection, SensorError, SessionId,
};

// =============================================================================
// RE-EXPORTS: Ingestion Pipeline
// =============================================================================

pub use abi::{data_recorded_topic, decode_data_recorded, encode_data_recorded, parse_scaled};
pub use clock::DisplayClock;
pub use lifecycle::{Delivery, DeliveryStats, Lifecycle, LifecycleState, Ticket};
pub use normalizer::Normalizer;
pub use series::{AppendOutcome, SeriesAccumulator, SeriesSnapshot};
