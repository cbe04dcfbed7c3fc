//! Station gate
//!
//! Debounces the noisy IN/OUT stream of each station into one arrival and
//! one departure per visit. A station is armed by its first IN and disarmed
//! by the next OUT; repeated INs while armed and OUTs while unarmed are
//! suppressed. Which accepted transitions are forwarded, and to which
//! actuator index, is decided by the station's [`StationPolicy`].

use crate::config::{GateConfig, StationPolicy};
use crate::types::{EventKind, ForwardedEvent, Result, StationEvent, StationId};
use serde::Serialize;
use std::collections::BTreeMap;

/// Counters describing what the gate has done with its input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateStats {
    /// Events that changed a station's armed flag
    pub accepted: u64,
    /// Events rejected as malformed or for an unknown station
    pub dropped: u64,
    /// Accepted events that produced a forwarded event
    pub forwarded: u64,
    /// Duplicate INs and stray OUTs
    pub suppressed: u64,
}

/// Per-station arming gate
pub struct StationGateTracker {
    policies: BTreeMap<StationId, StationPolicy>,
    armed: BTreeMap<StationId, bool>,
    stats: GateStats,
}

impl StationGateTracker {
    /// Create a gate with every configured station unarmed
    pub fn new(config: GateConfig) -> Result<Self> {
        config.validate()?;

        let policies: BTreeMap<_, _> = config
            .stations
            .into_iter()
            .map(|policy| (policy.station, policy))
            .collect();
        let armed = policies.keys().map(|station| (*station, false)).collect();

        Ok(Self {
            policies,
            armed,
            stats: GateStats::default(),
        })
    }

    /// Apply one event and return what, if anything, must be forwarded
    ///
    /// The armed flag is committed before this returns; delivering the
    /// forwarded event is the caller's concern and cannot undo it.
    pub fn handle(&mut self, event: StationEvent) -> Option<ForwardedEvent> {
        if event.source_timestamp.trim().is_empty() {
            log::debug!("Dropping {} {} event without timestamp", event.station, event.kind);
            self.stats.dropped += 1;
            return None;
        }

        let (Some(policy), Some(armed)) = (
            self.policies.get(&event.station),
            self.armed.get_mut(&event.station),
        ) else {
            log::debug!("Dropping event for unconfigured station {}", event.station);
            self.stats.dropped += 1;
            return None;
        };

        let actuator_index = match (event.kind, *armed) {
            (EventKind::In, false) => {
                *armed = true;
                policy.in_index
            }
            (EventKind::Out, true) => {
                *armed = false;
                Some(policy.out_index)
            }
            (EventKind::In, true) | (EventKind::Out, false) => {
                log::trace!("Suppressed {} at {} (armed: {})", event.kind, event.station, *armed);
                self.stats.suppressed += 1;
                return None;
            }
        };

        self.stats.accepted += 1;
        log::info!(
            "{} ESP32_{} at {}: {}",
            event.kind,
            event.station.sensor_index(),
            event.station,
            event.source_timestamp
        );

        let actuator_index = actuator_index?;
        self.stats.forwarded += 1;

        Some(ForwardedEvent {
            station: event.station,
            kind: event.kind,
            source_timestamp: event.source_timestamp,
            actuator_index,
        })
    }

    /// Whether the station has an accepted IN outstanding
    pub fn is_armed(&self, station: StationId) -> bool {
        self.armed.get(&station).copied().unwrap_or(false)
    }

    pub fn stats(&self) -> GateStats {
        self.stats
    }

    /// Disarm every station
    pub fn reset(&mut self) {
        for armed in self.armed.values_mut() {
            *armed = false;
        }
    }
}
