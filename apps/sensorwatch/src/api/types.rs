//! # API Request/Response Types
//!
//! JSON structures for the HTTP API. Decimal values travel as strings with
//! two fractional digits ("25.50") so no client has to round a float.

use crate::manager::ManagerStatus;
use crate::provider::SessionContext;
use sensorwatch_core::{DeliveryStats, Reading, SeriesSnapshot, SessionId};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Lifecycle status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// `idle`, `subscribing`, `active` or `tearing_down`.
    pub state: String,
    pub session: Option<u64>,
    pub account: Option<String>,
    pub chain_id: Option<u64>,
    pub series_length: usize,
    pub revision: u64,
    pub stats: StatsJson,
}

impl From<ManagerStatus> for StatusResponse {
    fn from(status: ManagerStatus) -> Self {
        Self {
            state: status.state.name().to_string(),
            session: status.state.session().map(|s| s.0),
            account: status.context.as_ref().map(|c| c.account().to_string()),
            chain_id: status.context.as_ref().map(SessionContext::chain_id),
            series_length: status.series_length,
            revision: status.revision,
            stats: StatsJson::from(status.stats),
        }
    }
}

/// Delivery counters of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsJson {
    pub appended: u64,
    pub duplicates: u64,
    pub filtered: u64,
    pub rejected: u64,
    pub stale: u64,
    pub dropped_lookups: u64,
}

impl From<DeliveryStats> for StatsJson {
    fn from(stats: DeliveryStats) -> Self {
        Self {
            appended: stats.appended,
            duplicates: stats.duplicates,
            filtered: stats.filtered,
            rejected: stats.rejected,
            stale: stats.stale,
            dropped_lookups: stats.dropped_lookups,
        }
    }
}

// =============================================================================
// SERIES RESPONSE
// =============================================================================

/// One reading as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingJson {
    pub device_id: String,
    pub temperature_celsius: String,
    pub humidity_percent: String,
    pub observed_at: String,
    pub observed_at_epoch: i64,
    pub source_block: u64,
    pub log_index: u64,
}

impl From<&Reading> for ReadingJson {
    fn from(reading: &Reading) -> Self {
        Self {
            device_id: reading.device_id().to_string(),
            temperature_celsius: reading.temperature_celsius().to_string(),
            humidity_percent: reading.humidity_percent().to_string(),
            observed_at: reading.observed_at().to_string(),
            observed_at_epoch: reading.observed_at_epoch(),
            source_block: reading.source_block().value(),
            log_index: reading.log_index(),
        }
    }
}

/// Series snapshot response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesResponse {
    pub session: Option<u64>,
    pub revision: u64,
    pub readings: Vec<ReadingJson>,
}

impl From<&SeriesSnapshot> for SeriesResponse {
    fn from(snapshot: &SeriesSnapshot) -> Self {
        Self {
            session: snapshot.session().map(|s| s.0),
            revision: snapshot.revision(),
            readings: snapshot.iter().map(ReadingJson::from).collect(),
        }
    }
}

// =============================================================================
// SESSION RESPONSE
// =============================================================================

/// Result of a connect or disconnect request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub success: bool,
    pub session: Option<u64>,
    pub account: Option<String>,
    pub chain_id: Option<u64>,
    pub error: Option<String>,
}

impl SessionResponse {
    pub fn connected(session: Option<SessionId>, context: &SessionContext) -> Self {
        Self {
            success: true,
            session: session.map(|s| s.0),
            account: Some(context.account().to_string()),
            chain_id: Some(context.chain_id()),
            error: None,
        }
    }

    /// `success` reports whether a session existed.
    pub fn disconnected(had_session: bool) -> Self {
        Self {
            success: had_session,
            session: None,
            account: None,
            chain_id: None,
            error: (!had_session).then(|| "No active session".to_string()),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            session: None,
            account: None,
            chain_id: None,
            error: Some(msg.into()),
        }
    }
}
