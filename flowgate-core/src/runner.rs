//! Monitor polling loop
//!
//! Drives a [`PathwayMonitor`] from a [`SignalSource`] at a fixed cadence.
//! Each iteration reads, ticks and notifies before sleeping; iterations never
//! overlap. Stopping is cooperative and only observed between iterations.

use crate::format::{fmt_elapsed, fmt_hms};
use crate::pathway::PathwayMonitor;
use crate::ports::{Notification, NotificationLevel, Notifier, SignalSource};
use crate::types::StageEvent;
use chrono::{Duration, Local};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const MONITOR_TITLE: &str = "Pathway monitor";

/// Cloneable stop signal shared with whoever ends the run
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// What happened during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Samples taken from the source
    pub samples: u64,
    /// Samples skipped because a signal was unreadable
    pub unreadable: u64,
    pub registrations: u64,
    pub triages: u64,
    pub compliant: u64,
    pub non_compliant: u64,
}

impl RunSummary {
    fn record(&mut self, event: &StageEvent) {
        match event {
            StageEvent::RegistrationReached { .. } => self.registrations += 1,
            StageEvent::TriageReached { .. } => self.triages += 1,
            StageEvent::EvaluationReached { compliant: true, .. } => self.compliant += 1,
            StageEvent::EvaluationReached { compliant: false, .. } => self.non_compliant += 1,
        }
    }
}

pub struct MonitorRunner<S: SignalSource, N: Notifier> {
    monitor: PathwayMonitor,
    source: S,
    notifier: N,
    interval: std::time::Duration,
    max_samples: Option<u64>,
    stop: StopHandle,
}

impl<S: SignalSource, N: Notifier> MonitorRunner<S, N> {
    /// Create a runner; a zero interval polls back to back (replay)
    pub fn new(monitor: PathwayMonitor, source: S, notifier: N, interval: std::time::Duration) -> Self {
        Self {
            monitor,
            source,
            notifier,
            interval,
            max_samples: None,
            stop: StopHandle::new(),
        }
    }

    /// Builder method: stop after this many samples
    pub fn with_max_samples(mut self, max_samples: u64) -> Self {
        self.max_samples = Some(max_samples);
        self
    }

    /// Handle that stops the run between iterations
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn monitor(&self) -> &PathwayMonitor {
        &self.monitor
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Poll until stopped, the sample limit is hit or the source closes
    pub fn run(&mut self) -> RunSummary {
        let mut summary = RunSummary::default();
        self.notifier.notify(&Notification::new(
            MONITOR_TITLE,
            "Connected and listening",
            NotificationLevel::Info,
        ));

        while !self.stop.is_stopped() && self.max_samples.map_or(true, |max| summary.samples < max) {
            let Some(sample) = self.source.sample() else {
                log::info!("Signal source closed");
                break;
            };
            summary.samples += 1;

            if sample.signals().is_none() {
                log::debug!("Unreadable stage signals at {}, retrying next poll", sample.sampled_at);
                summary.unreadable += 1;
            } else if let Some(event) = self.monitor.tick(&sample) {
                log::debug!("{:?} reached at {}", event.stage(), event.at());
                summary.record(&event);
                for notification in stage_notifications(&event, self.monitor.compliance_threshold()) {
                    self.notifier.notify(&notification);
                }
            }

            if !self.interval.is_zero() && !self.stop.is_stopped() {
                std::thread::sleep(self.interval);
            }
        }

        self.notifier.notify(&Notification::new(
            MONITOR_TITLE,
            "Monitoring stopped",
            NotificationLevel::Info,
        ));
        log::info!("Monitor run finished: {:?}", summary);
        summary
    }
}

/// Human-readable notifications for a stage event
pub fn stage_notifications(event: &StageEvent, threshold: Duration) -> Vec<Notification> {
    match event {
        StageEvent::RegistrationReached { at } => vec![Notification::new(
            "Registration",
            format!("Time: {}", fmt_hms(&at.with_timezone(&Local))),
            NotificationLevel::Success,
        )],
        StageEvent::TriageReached {
            at,
            since_registration,
        } => vec![
            Notification::new(
                "Triage arrival",
                format!("Time: {}", fmt_hms(&at.with_timezone(&Local))),
                NotificationLevel::Success,
            ),
            Notification::new(
                "Registration → Triage",
                fmt_elapsed(*since_registration),
                NotificationLevel::Success,
            ),
        ],
        StageEvent::EvaluationReached {
            at,
            since_triage,
            total,
            compliant,
        } => {
            let (verdict, level) = if *compliant {
                ("Compliant", NotificationLevel::Success)
            } else {
                ("Not compliant", NotificationLevel::Alert)
            };
            vec![
                Notification::new(
                    "Medical evaluation",
                    format!(
                        "Time: {} (triage → evaluation {})",
                        fmt_hms(&at.with_timezone(&Local)),
                        fmt_elapsed(*since_triage)
                    ),
                    NotificationLevel::Success,
                ),
                Notification::new(
                    format!("Care within {}", fmt_elapsed(threshold)),
                    format!("{}\nTotal time: {}", verdict, fmt_elapsed(*total)),
                    level,
                ),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StageSample, Timestamp};
    use chrono::{TimeZone, Utc};
    use std::collections::VecDeque;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    struct ScriptedSource(VecDeque<StageSample>);

    impl SignalSource for ScriptedSource {
        fn sample(&mut self) -> Option<StageSample> {
            self.0.pop_front()
        }
    }

    #[derive(Default)]
    struct CollectingNotifier(Vec<Notification>);

    impl Notifier for CollectingNotifier {
        fn notify(&mut self, notification: &Notification) {
            self.0.push(notification.clone());
        }
    }

    fn script(samples: &[(i64, Option<bool>, Option<bool>, Option<bool>)]) -> ScriptedSource {
        ScriptedSource(
            samples
                .iter()
                .map(|(minutes, registration, triage, evaluation)| StageSample {
                    sampled_at: t0() + Duration::minutes(*minutes),
                    registration: *registration,
                    triage: *triage,
                    evaluation: *evaluation,
                })
                .collect(),
        )
    }

    fn runner(source: ScriptedSource) -> MonitorRunner<ScriptedSource, CollectingNotifier> {
        MonitorRunner::new(
            PathwayMonitor::new(Duration::hours(2)),
            source,
            CollectingNotifier::default(),
            std::time::Duration::ZERO,
        )
    }

    #[test]
    fn test_run_until_source_closes() {
        let source = script(&[
            (0, Some(false), Some(false), Some(false)),
            (1, Some(true), Some(false), Some(false)),
            (2, None, Some(true), Some(false)),
            (6, Some(true), Some(true), Some(false)),
            (91, Some(true), Some(true), Some(true)),
        ]);
        let mut runner = runner(source);
        let summary = runner.run();

        assert_eq!(summary.samples, 5);
        assert_eq!(summary.unreadable, 1);
        assert_eq!(summary.registrations, 1);
        assert_eq!(summary.triages, 1);
        assert_eq!(summary.compliant, 1);
        assert_eq!(summary.non_compliant, 0);

        let titles: Vec<&str> = runner.notifier().0.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                MONITOR_TITLE,
                "Registration",
                "Triage arrival",
                "Registration → Triage",
                "Medical evaluation",
                "Care within 02:00:00",
                MONITOR_TITLE,
            ]
        );
    }

    #[test]
    fn test_max_samples_limit() {
        let source = script(&[(0, Some(true), Some(false), Some(false)); 10]);
        let mut runner = runner(source).with_max_samples(3);

        assert_eq!(runner.run().samples, 3);
    }

    #[test]
    fn test_stop_handle_ends_run() {
        let source = script(&[(0, Some(false), Some(false), Some(false)); 4]);
        let mut runner = runner(source);
        runner.stop_handle().stop();

        let summary = runner.run();
        assert_eq!(summary.samples, 0);
        assert_eq!(runner.notifier().0.len(), 2); // start and stop only
    }

    /// Never closes; every poll reads all signals low
    struct IdleSource;

    impl SignalSource for IdleSource {
        fn sample(&mut self) -> Option<StageSample> {
            Some(StageSample::readable(Utc::now(), false, false, false))
        }
    }

    #[test]
    fn test_stop_from_another_thread_interrupts_polling() {
        let mut runner = MonitorRunner::new(
            PathwayMonitor::new(Duration::hours(2)),
            IdleSource,
            CollectingNotifier::default(),
            std::time::Duration::from_millis(5),
        );
        let stop = runner.stop_handle();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(30));
            stop.stop();
        });

        let summary = runner.run();
        stopper.join().unwrap();

        assert!(summary.samples > 0);
        let last = runner.notifier().0.last().unwrap();
        assert_eq!(last.body, "Monitoring stopped");
    }

    #[test]
    fn test_non_compliant_notification_is_alert() {
        let event = StageEvent::EvaluationReached {
            at: t0(),
            since_triage: Duration::minutes(100),
            total: Duration::minutes(150),
            compliant: false,
        };
        let notifications = stage_notifications(&event, Duration::hours(2));

        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[1].level, NotificationLevel::Alert);
        assert_eq!(notifications[1].body, "Not compliant\nTotal time: 02:30:00");
    }

    #[test]
    fn test_triage_notification_shows_elapsed() {
        let event = StageEvent::TriageReached {
            at: t0(),
            since_registration: Duration::minutes(5),
        };
        let notifications = stage_notifications(&event, Duration::hours(2));
        assert_eq!(notifications[1].body, "00:05:00");
    }
}
