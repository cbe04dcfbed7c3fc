//! Bridge mode
//!
//! Reads gateway payloads, maps them to coils and pulses each coil. The
//! coil writer used from the command line records every write as a JSON
//! line, standing in for the discrete-I/O client.

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use flowgate_core::format::{fmt_millis, normalize_timestamp};
use flowgate_core::{decode_forwarded_payload, CoilMapper, CoilWriter, FlowError, PulseBridge};
use serde::Serialize;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeReport {
    pub lines: u64,
    pub malformed: u64,
    pub pulses: u64,
    pub pulse_failures: u64,
}

#[derive(Serialize)]
struct CoilWrite {
    at: String,
    coil: u16,
    value: bool,
}

/// Coil writer that logs each write as a JSON line
pub struct CoilLogWriter<W: Write> {
    writer: W,
}

impl<W: Write> CoilLogWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> CoilWriter for CoilLogWriter<W> {
    fn write_coil(&mut self, address: u16, value: bool) -> flowgate_core::Result<()> {
        let record = CoilWrite {
            at: fmt_millis(&Utc::now()),
            coil: address,
            value,
        };
        let line = serde_json::to_string(&record)?;
        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| FlowError::Coil {
                address,
                reason: e.to_string(),
            })
    }
}

pub fn run_bridge<R: BufRead, W: CoilWriter>(
    input: R,
    mapper: &mut CoilMapper,
    bridge: &mut PulseBridge<W>,
) -> Result<BridgeReport> {
    let mut report = BridgeReport::default();

    for line in input.split(b'\n') {
        let line = line.context("Failed to read gateway input")?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        report.lines += 1;

        let relayed = match decode_forwarded_payload(&line) {
            Ok(relayed) => relayed,
            Err(e) => {
                log::debug!("Dropping payload: {}", e);
                report.malformed += 1;
                continue;
            }
        };

        let Some(coil) = mapper.map(&relayed.event) else {
            continue;
        };

        let received_at = Local::now();
        match bridge.pulse(coil) {
            Ok(timing) => {
                report.pulses += 1;
                let event = &relayed.event;
                log::info!(
                    "{} ESP32_{} at {} (coil {})\n  timestamp_sensor: {}\n  timestamp_gateway: {}\n  timestamp_bridge: {}\n  timestamp_actuator: {}",
                    event.kind,
                    event.station.sensor_index(),
                    event.station,
                    coil,
                    normalize_timestamp(&event.source_timestamp),
                    normalize_timestamp(&relayed.gateway_timestamp),
                    fmt_millis(&received_at),
                    fmt_millis(&timing.finished_at.with_timezone(&Local)),
                );
            }
            Err(e) => {
                log::warn!("Pulse on coil {} failed: {}", coil, e);
                report.pulse_failures += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_core::{BridgeConfig, GateConfig, MemoryCoilBank};
    use std::io::Cursor;

    const INPUT: &str = r#"{"loc":"STA1","status":"IN","timestamp_esp32":"2025-03-01 08:00:00.000","timestamp_jetson":"2025-03-01T08:00:00.050","coil":0}
{"loc":"STA1","status":"OUT","timestamp_esp32":"2025-03-01 08:04:00.000","timestamp_jetson":"2025-03-01T08:04:00.040","coil":1}
{"loc":"STA1","status":"OUT","timestamp_esp32":"2025-03-01 08:04:01.000"}
{"loc":"STA3","status":"OUT","timestamp_esp32":"2025-03-01 08:09:00.000","timestamp_jetson":"2025-03-01T08:09:00.030","coil":3}
"#;

    fn instant() -> BridgeConfig {
        BridgeConfig { pulse_ms: 0 }
    }

    #[test]
    fn test_bridge_pulses_mapped_coils() {
        let mut mapper = CoilMapper::new(GateConfig::new()).unwrap();
        let mut bridge = PulseBridge::new(CoilLogWriter::new(Vec::new()), &instant());

        let report = run_bridge(Cursor::new(INPUT), &mut mapper, &mut bridge).unwrap();
        assert_eq!(report.lines, 4);
        assert_eq!(report.malformed, 1); // missing timestamp_jetson
        assert_eq!(report.pulses, 3);

        let log = String::from_utf8(bridge.into_writer().into_inner()).unwrap();
        let writes: Vec<(u64, bool)> = log
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                (value["coil"].as_u64().unwrap(), value["value"].as_bool().unwrap())
            })
            .collect();
        assert_eq!(
            writes,
            vec![(0, true), (0, false), (1, true), (1, false), (3, true), (3, false)]
        );
    }

    #[test]
    fn test_invalid_utf8_line_counted_as_malformed() {
        let mut input = b"\xC3\x28 not a payload\n".to_vec();
        input.extend_from_slice(INPUT.as_bytes());

        let mut mapper = CoilMapper::new(GateConfig::new()).unwrap();
        let mut bridge = PulseBridge::new(MemoryCoilBank::new(4), &instant());

        let report = run_bridge(Cursor::new(input), &mut mapper, &mut bridge).unwrap();
        assert_eq!(report.lines, 5);
        assert_eq!(report.malformed, 2);
        assert_eq!(report.pulses, 3);
    }

    #[test]
    fn test_pulse_failure_counted() {
        let mut mapper = CoilMapper::new(GateConfig::new()).unwrap();
        // Only coil 0 exists
        let mut bridge = PulseBridge::new(MemoryCoilBank::new(1), &instant());

        let report = run_bridge(Cursor::new(INPUT), &mut mapper, &mut bridge).unwrap();
        assert_eq!(report.pulses, 1);
        assert_eq!(report.pulse_failures, 2);
    }
}
