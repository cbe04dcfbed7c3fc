//! Flowgate Core Library
//!
//! State machines for correlating station presence events and monitoring a
//! patient's pathway through registration, triage and evaluation.
//!
//! # Architecture
//!
//! Two independent, single-owner components:
//! - [`StationGateTracker`] debounces per-station IN/OUT events and decides
//!   which transitions are forwarded, and to which actuator index
//! - [`PathwayMonitor`] detects rising edges on three stage signals, records
//!   stage timestamps and checks total time against a compliance threshold
//!
//! Transports (pub/sub, discrete-I/O clients, notification rendering) sit
//! behind the traits in [`ports`]. The library never lets a transport
//! failure undo a state transition.
//!
//! # Example Usage
//!
//! ```
//! use flowgate_core::{EventKind, GateConfig, StationEvent, StationGateTracker, StationId};
//!
//! let mut gate = StationGateTracker::new(GateConfig::new()).unwrap();
//!
//! let arrival = gate.handle(StationEvent::new(StationId::Sta1, EventKind::In, "08:00:00.000"));
//! assert_eq!(arrival.map(|e| e.actuator_index), Some(0));
//!
//! // Repeated INs while the station is armed are suppressed
//! assert!(gate.handle(StationEvent::new(StationId::Sta1, EventKind::In, "08:00:00.300")).is_none());
//! ```

// Public modules
pub mod bridge;
pub mod codec;
pub mod config;
pub mod format;
pub mod gate;
pub mod pathway;
pub mod ports;
pub mod runner;
pub mod types;

// Re-export main types for convenience
pub use bridge::{CoilMapper, PulseBridge, PulseTiming};
pub use codec::{decode_forwarded_payload, decode_station_payload, encode_forwarded, ForwardedPayload, RelayedEvent};
pub use config::{BridgeConfig, GateConfig, MonitorConfig, StationPolicy};
pub use gate::{GateStats, StationGateTracker};
pub use pathway::{PathwayMonitor, PathwayStage, PathwayState};
pub use ports::{
    CoilReader, CoilSignalSource, CoilWriter, EventSink, JsonLinesSink, LogNotifier,
    MemoryCoilBank, Notification, NotificationLevel, Notifier, SignalSource,
};
pub use runner::{MonitorRunner, RunSummary, StopHandle};
pub use types::{
    EventKind, FlowError, ForwardedEvent, Result, Stage, StageEvent, StageSample,
    StageSignals, StationEvent, StationId, Timestamp,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
