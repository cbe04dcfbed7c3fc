//! JSON payload codec
//!
//! Sensor nodes publish objects like
//! `{"loc": "STA1", "status": "IN", "timestamp_esp32": "..."}` (older firmware
//! sends `timestamp` instead). The gateway forwards accepted transitions as
//! [`ForwardedPayload`], adding its own receive time and the coil index.

use crate::types::{EventKind, FlowError, ForwardedEvent, Result, StationEvent, StationId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format of the gateway timestamp added to forwarded payloads
pub const GATEWAY_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Raw sensor payload; every field is optional until validated
#[derive(Debug, Default, Deserialize)]
struct RawStationPayload {
    loc: Option<Value>,
    status: Option<Value>,
    timestamp_esp32: Option<Value>,
    timestamp: Option<Value>,
    timestamp_jetson: Option<Value>,
}

/// Payload published by the gateway for each forwarded event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardedPayload {
    pub loc: StationId,
    pub status: EventKind,
    pub timestamp_esp32: String,
    pub timestamp_jetson: String,
    pub coil: u16,
}

impl ForwardedPayload {
    pub fn new(event: &ForwardedEvent, forwarded_at: Timestamp) -> Self {
        Self {
            loc: event.station,
            status: event.kind,
            timestamp_esp32: event.source_timestamp.clone(),
            timestamp_jetson: forwarded_at.format(GATEWAY_TIMESTAMP_FORMAT).to_string(),
            coil: event.actuator_index,
        }
    }
}

/// A forwarded event as seen by the bridge, with the gateway's timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedEvent {
    pub event: StationEvent,
    pub gateway_timestamp: String,
}

/// Decode a sensor payload into a station event
///
/// Invalid UTF-8 is replaced rather than rejected; missing, empty or unknown
/// fields yield [`FlowError::InvalidPayload`].
pub fn decode_station_payload(bytes: &[u8]) -> Result<StationEvent> {
    let raw = parse_raw(bytes)?;
    station_event_from(&raw)
}

/// Decode a gateway payload on the bridge side
///
/// Same rules as [`decode_station_payload`], and the gateway timestamp must
/// also be present. The coil index in the payload is not trusted; the bridge
/// derives its own mapping.
pub fn decode_forwarded_payload(bytes: &[u8]) -> Result<RelayedEvent> {
    let raw = parse_raw(bytes)?;
    let event = station_event_from(&raw)?;
    let gateway_timestamp = text_field(raw.timestamp_jetson.as_ref())
        .ok_or_else(|| FlowError::InvalidPayload("missing timestamp_jetson".to_string()))?;

    Ok(RelayedEvent {
        event,
        gateway_timestamp,
    })
}

/// Encode a forwarded event as a single-line JSON document
pub fn encode_forwarded(event: &ForwardedEvent, forwarded_at: Timestamp) -> Result<String> {
    Ok(serde_json::to_string(&ForwardedPayload::new(event, forwarded_at))?)
}

fn parse_raw(bytes: &[u8]) -> Result<RawStationPayload> {
    let text = String::from_utf8_lossy(bytes);
    serde_json::from_str(&text).map_err(|e| FlowError::InvalidPayload(e.to_string()))
}

fn station_event_from(raw: &RawStationPayload) -> Result<StationEvent> {
    let loc = text_field(raw.loc.as_ref())
        .ok_or_else(|| FlowError::InvalidPayload("missing loc".to_string()))?;
    let status = text_field(raw.status.as_ref())
        .ok_or_else(|| FlowError::InvalidPayload("missing status".to_string()))?;
    let source_timestamp = text_field(raw.timestamp_esp32.as_ref())
        .or_else(|| text_field(raw.timestamp.as_ref()))
        .ok_or_else(|| FlowError::InvalidPayload("missing timestamp".to_string()))?;

    Ok(StationEvent {
        station: loc.parse()?,
        kind: status.parse()?,
        source_timestamp,
    })
}

/// Non-empty text of a string or numeric JSON field
fn text_field(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_decode_station_payload() {
        let payload = br#"{"loc": " sta2 ", "status": "out", "timestamp_esp32": "2025-03-01 08:00:00.120"}"#;
        let event = decode_station_payload(payload).unwrap();

        assert_eq!(event.station, StationId::Sta2);
        assert_eq!(event.kind, EventKind::Out);
        assert_eq!(event.source_timestamp, "2025-03-01 08:00:00.120");
    }

    #[test]
    fn test_legacy_timestamp_field() {
        let payload = br#"{"loc": "STA1", "status": "IN", "timestamp": 1712345}"#;
        let event = decode_station_payload(payload).unwrap();
        assert_eq!(event.source_timestamp, "1712345");
    }

    #[test]
    fn test_timestamp_esp32_preferred() {
        let payload = br#"{"loc": "STA1", "status": "IN", "timestamp_esp32": "a", "timestamp": "b"}"#;
        assert_eq!(decode_station_payload(payload).unwrap().source_timestamp, "a");

        // An empty primary field falls back to the legacy one
        let payload = br#"{"loc": "STA1", "status": "IN", "timestamp_esp32": "", "timestamp": "b"}"#;
        assert_eq!(decode_station_payload(payload).unwrap().source_timestamp, "b");
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        let cases: [&[u8]; 7] = [
            b"not json",
            b"[1, 2, 3]",
            br#"{"status": "IN", "timestamp": "t"}"#,
            br#"{"loc": "STA1", "timestamp": "t"}"#,
            br#"{"loc": "STA1", "status": "IN"}"#,
            br#"{"loc": "STA9", "status": "IN", "timestamp": "t"}"#,
            br#"{"loc": "STA1", "status": "MAYBE", "timestamp": "t"}"#,
        ];

        for payload in cases {
            assert!(
                matches!(decode_station_payload(payload), Err(FlowError::InvalidPayload(_))),
                "payload should be rejected: {}",
                String::from_utf8_lossy(payload)
            );
        }
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut payload = br#"{"loc": "STA3", "status": "IN", "timestamp": "t"#.to_vec();
        payload.push(0xFF);
        payload.extend_from_slice(br#""}"#);

        let event = decode_station_payload(&payload).unwrap();
        assert_eq!(event.station, StationId::Sta3);
        assert!(event.source_timestamp.starts_with('t'));
    }

    #[test]
    fn test_encode_then_relay() {
        let forwarded = ForwardedEvent {
            station: StationId::Sta1,
            kind: EventKind::In,
            source_timestamp: "2025-03-01 08:00:00.000".to_string(),
            actuator_index: 0,
        };
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 1).unwrap();

        let line = encode_forwarded(&forwarded, at).unwrap();
        assert!(line.contains(r#""timestamp_jetson":"2025-03-01T08:00:01.000""#));
        assert!(!line.contains('\n'));

        let relayed = decode_forwarded_payload(line.as_bytes()).unwrap();
        assert_eq!(relayed.event.station, StationId::Sta1);
        assert_eq!(relayed.event.kind, EventKind::In);
        assert_eq!(relayed.gateway_timestamp, "2025-03-01T08:00:01.000");
    }

    #[test]
    fn test_relay_requires_gateway_timestamp() {
        let payload = br#"{"loc": "STA1", "status": "IN", "timestamp_esp32": "t"}"#;
        assert!(decode_forwarded_payload(payload).is_err());
    }
}
