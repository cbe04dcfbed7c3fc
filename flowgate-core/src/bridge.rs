//! Actuator bridge
//!
//! Turns forwarded station events into coil pulses. For stations whose IN is
//! forwarded, the receiving side keeps its own window so that a replayed or
//! duplicated OUT cannot pulse twice: an IN opens the window, the first OUT
//! closes it. Stations that arm silently never send an IN, so their OUTs
//! are already debounced by the gateway and map straight to a coil.

use crate::config::{BridgeConfig, GateConfig, StationPolicy};
use crate::ports::CoilWriter;
use crate::types::{EventKind, Result, StationEvent, StationId, Timestamp};
use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Duration;

/// Maps relayed station events to coil addresses
pub struct CoilMapper {
    policies: BTreeMap<StationId, StationPolicy>,
    waiting: BTreeMap<StationId, bool>,
}

impl CoilMapper {
    pub fn new(config: GateConfig) -> Result<Self> {
        config.validate()?;

        let policies: BTreeMap<_, _> = config
            .stations
            .into_iter()
            .map(|policy| (policy.station, policy))
            .collect();
        let waiting = policies.keys().map(|station| (*station, false)).collect();

        Ok(Self { policies, waiting })
    }

    /// Coil to pulse for this event, if any
    ///
    /// Every IN (re)opens the station's window, even if it is already open.
    /// An OUT from a station that forwards IN pulses only when the window is
    /// open, and closes it.
    pub fn map(&mut self, event: &StationEvent) -> Option<u16> {
        let policy = self.policies.get(&event.station)?;
        let waiting = self.waiting.get_mut(&event.station)?;

        match event.kind {
            EventKind::In => {
                *waiting = true;
                policy.in_index
            }
            EventKind::Out if *waiting || !policy.forwards_in() => {
                *waiting = false;
                Some(policy.out_index)
            }
            EventKind::Out => {
                log::debug!("Ignoring OUT at {} with no open window", event.station);
                None
            }
        }
    }

    pub fn is_waiting(&self, station: StationId) -> bool {
        self.waiting.get(&station).copied().unwrap_or(false)
    }
}

/// Wall-clock bounds of one pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseTiming {
    pub coil: u16,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

/// Performs assert / hold / deassert pulses on a coil writer
pub struct PulseBridge<W: CoilWriter> {
    writer: W,
    hold: Duration,
}

impl<W: CoilWriter> PulseBridge<W> {
    pub fn new(writer: W, config: &BridgeConfig) -> Self {
        Self {
            writer,
            hold: config.pulse_duration(),
        }
    }

    /// Pulse a coil, blocking for the hold duration
    ///
    /// If asserting fails the coil is left alone. If deasserting fails the
    /// error is returned and the coil may still be asserted.
    pub fn pulse(&mut self, coil: u16) -> Result<PulseTiming> {
        let started_at = Utc::now();

        self.writer.write_coil(coil, true)?;
        if !self.hold.is_zero() {
            std::thread::sleep(self.hold);
        }
        if let Err(e) = self.writer.write_coil(coil, false) {
            log::warn!("Coil {} may still be asserted: {}", coil, e);
            return Err(e);
        }

        Ok(PulseTiming {
            coil,
            started_at,
            finished_at: Utc::now(),
        })
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}
