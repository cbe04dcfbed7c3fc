//! Core types for the flowgate library
//!
//! This module defines the vocabulary shared by the station gate and the
//! pathway monitor: station identifiers, IN/OUT event kinds, stage samples
//! and the events each state machine emits.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp type used throughout the library
pub type Timestamp = DateTime<Utc>;

/// Result type for flowgate operations
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors that can occur in flowgate
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Coil {address} access failed: {reason}")]
    Coil { address: u16, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// One of the fixed physical monitoring points
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StationId {
    Sta1,
    Sta2,
    Sta3,
}

impl StationId {
    /// All known stations, in sensor-node order
    pub const ALL: [StationId; 3] = [StationId::Sta1, StationId::Sta2, StationId::Sta3];

    /// Index of the sensor node wired to this station
    pub fn sensor_index(self) -> usize {
        match self {
            StationId::Sta1 => 0,
            StationId::Sta2 => 1,
            StationId::Sta3 => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StationId::Sta1 => "STA1",
            StationId::Sta2 => "STA2",
            StationId::Sta3 => "STA3",
        }
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StationId {
    type Err = FlowError;

    /// Case-insensitive, surrounding whitespace ignored
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STA1" => Ok(StationId::Sta1),
            "STA2" => Ok(StationId::Sta2),
            "STA3" => Ok(StationId::Sta3),
            other => Err(FlowError::InvalidPayload(format!("unknown station: {:?}", other))),
        }
    }
}

/// Presence transition reported by a station sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    In,
    Out,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::In => "IN",
            EventKind::Out => "OUT",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(EventKind::In),
            "OUT" => Ok(EventKind::Out),
            other => Err(FlowError::InvalidPayload(format!("unknown status: {:?}", other))),
        }
    }
}

/// One inbound observation from a station sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationEvent {
    pub station: StationId,
    pub kind: EventKind,
    /// Opaque, order-preserving timestamp supplied by the sensor node
    pub source_timestamp: String,
}

impl StationEvent {
    pub fn new(station: StationId, kind: EventKind, source_timestamp: impl Into<String>) -> Self {
        Self {
            station,
            kind,
            source_timestamp: source_timestamp.into(),
        }
    }
}

/// A gate-accepted transition worth propagating to the actuator layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedEvent {
    pub station: StationId,
    pub kind: EventKind,
    pub source_timestamp: String,
    /// Actuator (coil) index chosen by the station's forwarding policy
    pub actuator_index: u16,
}

/// One of the three sequential pathway checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Registration,
    Triage,
    Evaluation,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Registration, Stage::Triage, Stage::Evaluation];
}

/// A fully readable snapshot of the three stage signals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSignals {
    pub registration: bool,
    pub triage: bool,
    pub evaluation: bool,
}

impl StageSignals {
    pub fn new(registration: bool, triage: bool, evaluation: bool) -> Self {
        Self {
            registration,
            triage,
            evaluation,
        }
    }

    /// Signals that went false -> true relative to `previous`
    pub fn rising_since(&self, previous: &StageSignals) -> StageSignals {
        StageSignals {
            registration: !previous.registration && self.registration,
            triage: !previous.triage && self.triage,
            evaluation: !previous.evaluation && self.evaluation,
        }
    }

    /// True when every signal is deasserted
    pub fn all_clear(&self) -> bool {
        !self.registration && !self.triage && !self.evaluation
    }
}

/// One polled observation of the stage signals
///
/// A `None` signal means the underlying read failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSample {
    #[serde(alias = "at")]
    pub sampled_at: Timestamp,
    #[serde(default)]
    pub registration: Option<bool>,
    #[serde(default)]
    pub triage: Option<bool>,
    #[serde(default)]
    pub evaluation: Option<bool>,
}

impl StageSample {
    /// Sample where all three reads succeeded
    pub fn readable(sampled_at: Timestamp, registration: bool, triage: bool, evaluation: bool) -> Self {
        Self {
            sampled_at,
            registration: Some(registration),
            triage: Some(triage),
            evaluation: Some(evaluation),
        }
    }

    /// Sample where every read failed
    pub fn unreadable(sampled_at: Timestamp) -> Self {
        Self {
            sampled_at,
            registration: None,
            triage: None,
            evaluation: None,
        }
    }

    /// The signal snapshot, or `None` if any signal could not be read
    pub fn signals(&self) -> Option<StageSignals> {
        Some(StageSignals {
            registration: self.registration?,
            triage: self.triage?,
            evaluation: self.evaluation?,
        })
    }
}

/// Emitted by the pathway monitor when a stage is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    RegistrationReached {
        at: Timestamp,
    },

    TriageReached {
        at: Timestamp,
        since_registration: Duration,
    },

    EvaluationReached {
        at: Timestamp,
        since_triage: Duration,
        /// Elapsed time from registration to evaluation
        total: Duration,
        /// True if `total` is within the compliance threshold
        compliant: bool,
    },
}

impl StageEvent {
    /// Get the timestamp of this event
    pub fn at(&self) -> Timestamp {
        match self {
            StageEvent::RegistrationReached { at } => *at,
            StageEvent::TriageReached { at, .. } => *at,
            StageEvent::EvaluationReached { at, .. } => *at,
        }
    }

    /// The stage this event reports
    pub fn stage(&self) -> Stage {
        match self {
            StageEvent::RegistrationReached { .. } => Stage::Registration,
            StageEvent::TriageReached { .. } => Stage::Triage,
            StageEvent::EvaluationReached { .. } => Stage::Evaluation,
        }
    }
}
