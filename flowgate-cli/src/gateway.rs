//! Gateway mode
//!
//! Reads one sensor payload per line, runs it through the station gate and
//! publishes forwarded events to the sink. Lines are taken as raw bytes, so
//! invalid UTF-8 reaches the decoder instead of ending the run. Malformed
//! lines are dropped and delivery failures are logged; neither stops the
//! gateway.

use anyhow::{Context, Result};
use flowgate_core::{decode_station_payload, EventSink, GateStats, StationGateTracker};
use std::io::BufRead;

/// What the gateway did with its input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayReport {
    pub lines: u64,
    pub malformed: u64,
    pub delivery_failures: u64,
    pub gate: GateStats,
}

pub fn run_gateway<R: BufRead, S: EventSink>(
    input: R,
    gate: &mut StationGateTracker,
    sink: &mut S,
) -> Result<GatewayReport> {
    let mut report = GatewayReport::default();

    for line in input.split(b'\n') {
        let line = line.context("Failed to read sensor input")?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        report.lines += 1;

        let event = match decode_station_payload(&line) {
            Ok(event) => event,
            Err(e) => {
                log::debug!("Dropping payload: {}", e);
                report.malformed += 1;
                continue;
            }
        };

        let Some(forwarded) = gate.handle(event) else {
            continue;
        };

        match sink.forward(&forwarded) {
            Ok(()) => log::debug!(
                "Forwarded {} {} -> coil {}",
                forwarded.station,
                forwarded.kind,
                forwarded.actuator_index
            ),
            Err(e) => {
                log::warn!("Could not forward {} {}: {}", forwarded.station, forwarded.kind, e);
                report.delivery_failures += 1;
            }
        }
    }

    report.gate = gate.stats();
    Ok(report)
}
