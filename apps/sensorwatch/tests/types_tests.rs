//! Serialization tests for the HTTP API types.

#![allow(clippy::unwrap_used, clippy::panic)]

use sensorwatch::api::{
    HealthResponse, ReadingJson, SeriesResponse, SessionResponse, StatsJson, StatusResponse,
};
use sensorwatch::manager::ManagerStatus;
use sensorwatch::provider::{SessionContext, Signer};
use sensorwatch_core::{
    BlockMeta, BlockNumber, DeliveryStats, DeviceId, DisplayClock, LifecycleState, Normalizer,
    RawEvent, SeriesAccumulator, SessionId,
};

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_deserialization() {
    let json = r#"{"status":"ok","version":"0.3.0"}"#;
    let health: HealthResponse = serde_json::from_str(json).unwrap();
    assert_eq!(health.version, "0.3.0");
}

// =============================================================================
// STATUS RESPONSE TESTS
// =============================================================================

#[test]
fn test_status_from_active_manager() {
    let context = SessionContext::new("0xabc", Signer::new("0xabc", 31337));
    let status = StatusResponse::from(ManagerStatus {
        state: LifecycleState::Active(SessionId(4)),
        context: Some(context),
        series_length: 2,
        revision: 7,
        stats: DeliveryStats {
            appended: 2,
            duplicates: 1,
            ..DeliveryStats::default()
        },
    });

    assert_eq!(status.state, "active");
    assert_eq!(status.session, Some(4));
    assert_eq!(status.account.as_deref(), Some("0xabc"));
    assert_eq!(status.chain_id, Some(31337));
    assert_eq!(status.stats.duplicates, 1);
}

#[test]
fn test_status_response_serialization() {
    let status = StatusResponse {
        state: "idle".to_string(),
        session: None,
        account: None,
        chain_id: None,
        series_length: 0,
        revision: 0,
        stats: StatsJson::default(),
    };

    let json = serde_json::to_string(&status).unwrap();
    assert!(json.contains("\"state\":\"idle\""));
    assert!(json.contains("\"session\":null"));
    assert!(json.contains("\"dropped_lookups\":0"));
}

// =============================================================================
// SERIES RESPONSE TESTS
// =============================================================================

#[test]
fn test_reading_values_are_decimal_strings() {
    let normalizer = Normalizer::new(DeviceId::new("device-01").unwrap(), DisplayClock::utc());
    let raw = RawEvent::new("device-01", "-305", "4500", BlockNumber(9), 2);
    let reading = normalizer
        .normalize(&raw, &BlockMeta::new(BlockNumber(9), 3600))
        .unwrap();

    let json = ReadingJson::from(&reading);

    assert_eq!(json.temperature_celsius, "-3.05");
    assert_eq!(json.humidity_percent, "45.00");
    assert_eq!(json.observed_at, "01.00.00");
    assert_eq!(json.observed_at_epoch, 3600);
    assert_eq!(json.source_block, 9);
    assert_eq!(json.log_index, 2);
}

#[test]
fn test_series_response_keeps_order() {
    let normalizer = Normalizer::new(DeviceId::new("device-01").unwrap(), DisplayClock::utc());
    let mut series = SeriesAccumulator::new();
    let _ = series.reset(SessionId(1));
    for block in [3, 5] {
        let raw = RawEvent::new("device-01", "2550", "6012", BlockNumber(block), 0);
        let meta = BlockMeta::new(BlockNumber(block), block as i64 * 12);
        let _ = series.append(normalizer.normalize(&raw, &meta).unwrap());
    }

    let response = SeriesResponse::from(&series.snapshot());

    assert_eq!(response.session, Some(1));
    let blocks: Vec<u64> = response.readings.iter().map(|r| r.source_block).collect();
    assert_eq!(blocks, vec![3, 5]);
}

// =============================================================================
// SESSION RESPONSE TESTS
// =============================================================================

#[test]
fn test_session_response_connected() {
    let context = SessionContext::new("0xabc", Signer::new("0xabc", 1));
    let response = SessionResponse::connected(Some(SessionId(3)), &context);

    assert!(response.success);
    assert_eq!(response.session, Some(3));
    assert_eq!(response.error, None);
}

#[test]
fn test_session_response_disconnected() {
    assert!(SessionResponse::disconnected(true).success);

    let response = SessionResponse::disconnected(false);
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("No active session"));
}

#[test]
fn test_session_response_error_round_trip() {
    let response = SessionResponse::error("no accounts");
    let json = serde_json::to_string(&response).unwrap();
    let back: SessionResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(back, response);
}
