//! # Normalizer Module
//!
//! Maps one decoded event plus its block metadata to a canonical `Reading`.
//!
//! - Filter events to the single target device
//! - Reject malformed numeric fields before anything is constructed
//! - Place the decimal point (`SCALE_FACTOR`) without floating point
//! - No side effects, no I/O

use crate::abi::parse_scaled;
use crate::clock::DisplayClock;
use crate::{BlockMeta, Centi, DeviceId, RawEvent, Reading, Rejection};

/// Pure event-to-reading conversion for one target device.
#[derive(Debug, Clone)]
pub struct Normalizer {
    target: DeviceId,
    clock: DisplayClock,
}

impl Normalizer {
    /// Create a normalizer for `target`, formatting times with `clock`.
    #[must_use]
    pub fn new(target: DeviceId, clock: DisplayClock) -> Self {
        Self { target, clock }
    }

    /// Normalize an event.
    ///
    /// Checks run in order: device filter, numeric fields, block
    /// consistency, timestamp range. The first failure wins.
    pub fn normalize(&self, raw: &RawEvent, block: &BlockMeta) -> Result<Reading, Rejection> {
        if raw.device_id != self.target.as_str() {
            return Err(Rejection::ForeignDevice(raw.device_id.clone()));
        }

        let temperature = parse_field("temperature", &raw.temperature)?;
        let humidity = parse_field("humidity", &raw.humidity)?;

        if block.number != raw.block_number {
            return Err(Rejection::BlockMismatch {
                event: raw.block_number,
                block: block.number,
            });
        }

        let observed_at = self
            .clock
            .format_timestamp(block.timestamp)
            .ok_or(Rejection::InvalidTimestamp(block.timestamp))?;

        Ok(Reading::new(
            self.target.clone(),
            temperature,
            humidity,
            observed_at,
            block.timestamp,
            raw.block_number,
            raw.log_index,
        ))
    }
}

fn parse_field(field: &'static str, raw: &str) -> Result<Centi, Rejection> {
    parse_scaled(raw)
        .map(Centi::from_scaled)
        .ok_or_else(|| Rejection::MalformedField {
            field,
            raw: raw.to_string(),
        })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlockNumber;

    fn make_normalizer() -> Normalizer {
        Normalizer::new(DeviceId::new("device-01").expect("id"), DisplayClock::utc())
    }

    fn make_event(device: &str, temperature: &str, humidity: &str) -> RawEvent {
        RawEvent::new(device, temperature, humidity, BlockNumber(42), 0)
    }

    fn block_42() -> BlockMeta {
        BlockMeta::new(BlockNumber(42), 1_700_000_000)
    }

    #[test]
    fn normalizes_reference_event() {
        let reading = make_normalizer()
            .normalize(&make_event("device-01", "2550", "6012"), &block_42())
            .expect("normalize");

        assert_eq!(reading.device_id().as_str(), "device-01");
        assert_eq!(reading.temperature_celsius(), Centi(2550));
        assert_eq!(reading.temperature_celsius().to_string(), "25.50");
        assert_eq!(reading.humidity_percent().to_string(), "60.12");
        assert_eq!(reading.source_block(), BlockNumber(42));
        assert_eq!(reading.observed_at_epoch(), 1_700_000_000);
        assert_eq!(reading.observed_at(), "22.13.20");
    }

    #[test]
    fn filters_foreign_device() {
        let result = make_normalizer().normalize(&make_event("device-02", "2550", "6012"), &block_42());
        assert_eq!(result, Err(Rejection::ForeignDevice("device-02".to_string())));
    }

    #[test]
    fn device_match_is_exact() {
        let normalizer = make_normalizer();
        assert!(normalizer
            .normalize(&make_event("DEVICE-01", "1", "1"), &block_42())
            .is_err());
        assert!(normalizer
            .normalize(&make_event("device-01 ", "1", "1"), &block_42())
            .is_err());
    }

    #[test]
    fn rejects_malformed_temperature() {
        let result = make_normalizer().normalize(&make_event("device-01", "hot", "6012"), &block_42());
        assert!(matches!(
            result,
            Err(Rejection::MalformedField { field: "temperature", .. })
        ));
    }

    #[test]
    fn rejects_malformed_humidity() {
        let result = make_normalizer().normalize(&make_event("device-01", "2550", "60.12"), &block_42());
        assert!(matches!(
            result,
            Err(Rejection::MalformedField { field: "humidity", .. })
        ));
    }

    #[test]
    fn foreign_device_wins_over_malformed_fields() {
        let result = make_normalizer().normalize(&make_event("device-02", "x", "y"), &block_42());
        assert!(matches!(result, Err(Rejection::ForeignDevice(_))));
    }

    #[test]
    fn rejects_block_mismatch() {
        let block = BlockMeta::new(BlockNumber(43), 1_700_000_000);
        let result = make_normalizer().normalize(&make_event("device-01", "1", "1"), &block);
        assert!(matches!(result, Err(Rejection::BlockMismatch { .. })));
    }

    #[test]
    fn rejects_unrepresentable_timestamp() {
        let block = BlockMeta::new(BlockNumber(42), i64::MAX);
        let result = make_normalizer().normalize(&make_event("device-01", "1", "1"), &block);
        assert_eq!(result, Err(Rejection::InvalidTimestamp(i64::MAX)));
    }
}
