//! Port traits for the outside world
//!
//! The gate and the monitor never talk to a transport directly. Forwarding
//! sinks, coil clients, signal sources and notification renderers implement
//! these traits; the adapters below cover line-oriented I/O and an in-memory
//! coil bank.

use crate::codec::encode_forwarded;
use crate::config::MonitorConfig;
use crate::types::{FlowError, ForwardedEvent, Result, Stage, StageSample, Timestamp};
use chrono::Utc;
use std::io::Write;

/// Outbound forwarding sink (gateway -> bridge)
pub trait EventSink {
    /// Deliver one forwarded event. Failures are reported, never retried here.
    fn forward(&mut self, event: &ForwardedEvent) -> Result<()>;
}

/// Write side of a discrete-I/O client
pub trait CoilWriter {
    fn write_coil(&mut self, address: u16, value: bool) -> Result<()>;
}

/// Read side of a discrete-I/O client
pub trait CoilReader {
    /// Current value of a coil, or `None` if the read failed
    fn read_coil(&mut self, address: u16) -> Option<bool>;
}

/// Supplies stage samples to the monitor loop
pub trait SignalSource {
    /// Next sample, or `None` once the source is closed for good
    fn sample(&mut self) -> Option<StageSample>;
}

/// Severity of a human-readable notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>, level: NotificationLevel) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            level,
        }
    }
}

/// Renders notifications. Rendering problems stay inside the implementation.
pub trait Notifier {
    fn notify(&mut self, notification: &Notification);
}

/// Writes each forwarded event as one JSON line, stamped with the send time
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn forward_at(&mut self, event: &ForwardedEvent, at: Timestamp) -> Result<()> {
        let line = encode_forwarded(event, at)?;
        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| FlowError::Delivery(e.to_string()))
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn forward(&mut self, event: &ForwardedEvent) -> Result<()> {
        self.forward_at(event, Utc::now())
    }
}

/// Fixed-size in-memory coil table
///
/// Addresses outside the table fail: reads return `None`, writes an error.
#[derive(Debug, Clone)]
pub struct MemoryCoilBank {
    coils: Vec<bool>,
}

impl MemoryCoilBank {
    pub fn new(size: usize) -> Self {
        Self {
            coils: vec![false; size],
        }
    }

    pub fn get(&self, address: u16) -> Option<bool> {
        self.coils.get(address as usize).copied()
    }
}

impl CoilReader for MemoryCoilBank {
    fn read_coil(&mut self, address: u16) -> Option<bool> {
        self.get(address)
    }
}

impl CoilWriter for MemoryCoilBank {
    fn write_coil(&mut self, address: u16, value: bool) -> Result<()> {
        match self.coils.get_mut(address as usize) {
            Some(coil) => {
                *coil = value;
                Ok(())
            }
            None => Err(FlowError::Coil {
                address,
                reason: format!("address out of range (bank size {})", self.coils.len()),
            }),
        }
    }
}

/// Live signal source: reads the three stage coils on every poll
pub struct CoilSignalSource<R: CoilReader> {
    reader: R,
    registration_coil: u16,
    triage_coil: u16,
    evaluation_coil: u16,
}

impl<R: CoilReader> CoilSignalSource<R> {
    pub fn new(reader: R, config: &MonitorConfig) -> Self {
        Self {
            reader,
            registration_coil: config.coil_for(Stage::Registration),
            triage_coil: config.coil_for(Stage::Triage),
            evaluation_coil: config.coil_for(Stage::Evaluation),
        }
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }
}

impl<R: CoilReader> SignalSource for CoilSignalSource<R> {
    fn sample(&mut self) -> Option<StageSample> {
        Some(StageSample {
            sampled_at: Utc::now(),
            registration: self.reader.read_coil(self.registration_coil),
            triage: self.reader.read_coil(self.triage_coil),
            evaluation: self.reader.read_coil(self.evaluation_coil),
        })
    }
}

/// Renders notifications through the `log` facade
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, notification: &Notification) {
        match notification.level {
            NotificationLevel::Alert => {
                log::warn!("[{}] {}", notification.title, notification.body)
            }
            NotificationLevel::Info | NotificationLevel::Success => {
                log::info!("[{}] {}", notification.title, notification.body)
            }
        }
    }
}
