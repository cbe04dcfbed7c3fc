//! Pathway monitor
//!
//! Four-state automaton driven by rising edges on the registration, triage
//! and evaluation signals:
//!
//! ```text
//! WaitRegistration --reg edge--> WaitTriage --tri edge--> WaitEvaluation
//!        ^                                                      |
//!        +------ all signals false <-- WaitReset <--eval edge---+
//! ```
//!
//! Stages only advance in order; an out-of-order edge is ignored, never
//! attributed to a later stage. There is no timeout: the monitor waits in
//! its current state until the expected edge arrives.

use crate::types::{StageEvent, StageSample, StageSignals, Timestamp};
use chrono::Duration;

/// Position of the automaton within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathwayStage {
    WaitRegistration,
    WaitTriage,
    WaitEvaluation,
    /// Cycle complete, waiting for every signal to be deasserted
    WaitReset,
}

/// Mutable record of the automaton
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathwayState {
    pub stage: PathwayStage,
    pub registration_at: Option<Timestamp>,
    pub triage_at: Option<Timestamp>,
    /// Last readable sample, for edge detection
    pub previous: StageSignals,
}

impl Default for PathwayState {
    fn default() -> Self {
        Self {
            stage: PathwayStage::WaitRegistration,
            registration_at: None,
            triage_at: None,
            previous: StageSignals::default(),
        }
    }
}

pub struct PathwayMonitor {
    compliance_threshold: Duration,
    state: PathwayState,
}

impl PathwayMonitor {
    pub fn new(compliance_threshold: Duration) -> Self {
        Self {
            compliance_threshold,
            state: PathwayState::default(),
        }
    }

    /// Feed one polled sample; returns the stage reached, if any
    ///
    /// Samples with an unreadable signal are skipped without touching state.
    pub fn tick(&mut self, sample: &StageSample) -> Option<StageEvent> {
        let Some(current) = sample.signals() else {
            log::trace!("Skipping unreadable sample at {}", sample.sampled_at);
            return None;
        };

        let rising = current.rising_since(&self.state.previous);
        let now = sample.sampled_at;
        let state = &mut self.state;

        let event = match (state.stage, state.registration_at, state.triage_at) {
            (PathwayStage::WaitRegistration, _, _) if rising.registration => {
                state.registration_at = Some(now);
                state.stage = PathwayStage::WaitTriage;
                Some(StageEvent::RegistrationReached { at: now })
            }
            (PathwayStage::WaitTriage, Some(registered), _) if rising.triage => {
                state.triage_at = Some(now);
                state.stage = PathwayStage::WaitEvaluation;
                Some(StageEvent::TriageReached {
                    at: now,
                    since_registration: now - registered,
                })
            }
            (PathwayStage::WaitEvaluation, Some(registered), Some(triaged)) if rising.evaluation => {
                let total = now - registered;
                state.registration_at = None;
                state.triage_at = None;
                state.stage = PathwayStage::WaitReset;
                Some(StageEvent::EvaluationReached {
                    at: now,
                    since_triage: now - triaged,
                    total,
                    compliant: total <= self.compliance_threshold,
                })
            }
            (PathwayStage::WaitReset, _, _) if current.all_clear() => {
                log::debug!("All stage signals cleared, waiting for registration");
                state.stage = PathwayStage::WaitRegistration;
                None
            }
            _ => None,
        };

        state.previous = current;

        if let Some(ref event) = event {
            log::info!("Pathway stage reached: {:?}", event);
        }
        event
    }

    pub fn stage(&self) -> PathwayStage {
        self.state.stage
    }

    pub fn state(&self) -> &PathwayState {
        &self.state
    }

    pub fn compliance_threshold(&self) -> Duration {
        self.compliance_threshold
    }

    /// Abandon the current cycle and wait for a new registration
    ///
    /// The previous snapshot is kept so a signal still held high does not
    /// register as a fresh edge.
    pub fn reset(&mut self) {
        let previous = self.state.previous;
        self.state = PathwayState {
            previous,
            ..PathwayState::default()
        };
    }
}
