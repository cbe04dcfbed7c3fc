//! Configuration types
//!
//! Station mapping, forwarding policy, polling cadence and compliance
//! threshold are parameters rather than constants. The defaults reproduce the
//! reference deployment: three stations, only STA1 forwards its IN (coil 0),
//! OUT coils 1-3, stage coils 4-6, 500ms polling, a two hour threshold.

use crate::types::{FlowError, Result, Stage, StationId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Forwarding policy for a single station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationPolicy {
    pub station: StationId,

    /// Actuator index pulsed when the station's IN is forwarded.
    /// `None` means the station arms silently on IN.
    #[serde(default)]
    pub in_index: Option<u16>,

    /// Actuator index pulsed when the station's OUT is forwarded
    pub out_index: u16,
}

impl StationPolicy {
    /// A station that arms silently and forwards only its OUT
    pub fn new(station: StationId, out_index: u16) -> Self {
        Self {
            station,
            in_index: None,
            out_index,
        }
    }

    /// Builder method: also forward the station's IN
    pub fn with_in_index(mut self, in_index: u16) -> Self {
        self.in_index = Some(in_index);
        self
    }

    pub fn forwards_in(&self) -> bool {
        self.in_index.is_some()
    }
}

/// Configuration for the station gate (and the bridge-side coil mapper)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub stations: Vec<StationPolicy>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            stations: vec![
                StationPolicy::new(StationId::Sta1, 1).with_in_index(0),
                StationPolicy::new(StationId::Sta2, 2),
                StationPolicy::new(StationId::Sta3, 3),
            ],
        }
    }
}

impl GateConfig {
    /// Create a gate configuration with the reference station mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration with no known stations
    pub fn empty() -> Self {
        Self {
            stations: Vec::new(),
        }
    }

    /// Builder method: add or replace a station policy
    pub fn with_station(mut self, policy: StationPolicy) -> Self {
        self.stations.retain(|p| p.station != policy.station);
        self.stations.push(policy);
        self
    }

    /// Look up the policy for a station, if it is configured
    pub fn policy(&self, station: StationId) -> Option<&StationPolicy> {
        self.stations.iter().find(|p| p.station == station)
    }

    /// Check that stations are unique and all actuator indices are disjoint
    pub fn validate(&self) -> Result<()> {
        let mut seen_stations = BTreeSet::new();
        let mut seen_indices = BTreeSet::new();

        for policy in &self.stations {
            if !seen_stations.insert(policy.station) {
                return Err(FlowError::InvalidConfig(format!(
                    "station {} configured more than once",
                    policy.station
                )));
            }

            for index in policy.in_index.iter().chain(std::iter::once(&policy.out_index)) {
                if !seen_indices.insert(*index) {
                    return Err(FlowError::InvalidConfig(format!(
                        "actuator index {} used more than once (station {})",
                        index, policy.station
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Configuration for the pathway monitor and its polling loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Polling interval in milliseconds (default: 500ms)
    pub poll_interval_ms: u64,

    /// Maximum allowed registration -> evaluation time in seconds (default: 2h)
    pub compliance_threshold_secs: u64,

    /// Coil address of the registration signal
    pub registration_coil: u16,

    /// Coil address of the triage signal
    pub triage_coil: u16,

    /// Coil address of the evaluation signal
    pub evaluation_coil: u16,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            compliance_threshold_secs: 2 * 60 * 60,
            registration_coil: 4,
            triage_coil: 5,
            evaluation_coil: 6,
        }
    }
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the polling interval
    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Builder method: set the compliance threshold
    pub fn with_compliance_threshold(mut self, threshold: std::time::Duration) -> Self {
        self.compliance_threshold_secs = threshold.as_secs();
        self
    }

    /// Builder method: set the coil address for each stage
    pub fn with_stage_coils(mut self, registration: u16, triage: u16, evaluation: u16) -> Self {
        self.registration_coil = registration;
        self.triage_coil = triage;
        self.evaluation_coil = evaluation;
        self
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    /// Compliance threshold as a signed duration
    ///
    /// Fails when the configured number of seconds does not fit a
    /// `chrono::Duration`.
    pub fn compliance_threshold(&self) -> Result<chrono::Duration> {
        i64::try_from(self.compliance_threshold_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                FlowError::InvalidConfig(format!(
                    "compliance_threshold_secs {} is out of range",
                    self.compliance_threshold_secs
                ))
            })
    }

    /// Coil address carrying the given stage's signal
    pub fn coil_for(&self, stage: Stage) -> u16 {
        match stage {
            Stage::Registration => self.registration_coil,
            Stage::Triage => self.triage_coil,
            Stage::Evaluation => self.evaluation_coil,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(FlowError::InvalidConfig(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        self.compliance_threshold()?;

        let coils: BTreeSet<u16> = Stage::ALL.iter().map(|s| self.coil_for(*s)).collect();
        if coils.len() != Stage::ALL.len() {
            return Err(FlowError::InvalidConfig(
                "stage coils must be distinct".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration for the actuator pulse bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// How long a coil is held asserted, in milliseconds (default: 200ms)
    pub pulse_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { pulse_ms: 200 }
    }
}

impl BridgeConfig {
    pub fn pulse_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.pulse_ms)
    }
}
