//! End-to-end: sensor payloads through the gate, across the codec, into the
//! bridge's coil bank, and back out as stage signals for the monitor.

use chrono::{Duration, TimeZone, Utc};
use flowgate_core::{
    decode_forwarded_payload, decode_station_payload, BridgeConfig, CoilMapper, CoilSignalSource,
    CoilWriter, EventSink, ForwardedEvent, GateConfig, JsonLinesSink, MemoryCoilBank,
    MonitorConfig, PathwayMonitor, PulseBridge, SignalSource, StageEvent, StageSample,
    StationGateTracker, StationId,
};

const SENSOR_STREAM: &[&str] = &[
    r#"{"loc": "STA1", "status": "IN", "timestamp_esp32": "2025-03-01 08:00:00.000"}"#,
    r#"{"loc": "STA1", "status": "IN", "timestamp_esp32": "2025-03-01 08:00:00.300"}"#,
    r#"{"loc": "sta2", "status": "OUT", "timestamp_esp32": "2025-03-01 08:00:01.000"}"#,
    r#"garbage"#,
    r#"{"loc": "STA1", "status": "OUT", "timestamp_esp32": "2025-03-01 08:02:00.000"}"#,
    r#"{"loc": "STA2", "status": "IN", "timestamp": "2025-03-01 08:03:00.000"}"#,
    r#"{"loc": "STA2", "status": "IN", "timestamp": "2025-03-01 08:03:00.500"}"#,
    r#"{"loc": "STA2", "status": "OUT", "timestamp": "2025-03-01 08:10:00.000"}"#,
    r#"{"loc": "STA4", "status": "OUT", "timestamp": "2025-03-01 08:11:00.000"}"#,
    r#"{"loc": "STA3", "status": "IN"}"#,
];

fn run_gateway() -> (Vec<ForwardedEvent>, String) {
    let mut gate = StationGateTracker::new(GateConfig::new()).unwrap();
    let mut sink = JsonLinesSink::new(Vec::new());
    let mut forwarded = Vec::new();

    for line in SENSOR_STREAM {
        let Ok(event) = decode_station_payload(line.as_bytes()) else {
            continue;
        };
        if let Some(f) = gate.handle(event) {
            sink.forward(&f).unwrap();
            forwarded.push(f);
        }
    }

    (forwarded, String::from_utf8(sink.into_inner()).unwrap())
}

#[test]
fn gateway_forwards_one_pulse_per_meaningful_transition() {
    let (forwarded, _) = run_gateway();
    let summary: Vec<(StationId, u16)> = forwarded.iter().map(|f| (f.station, f.actuator_index)).collect();

    assert_eq!(
        summary,
        vec![(StationId::Sta1, 0), (StationId::Sta1, 1), (StationId::Sta2, 2)]
    );
}

#[test]
fn bridge_pulses_coils_from_gateway_output() {
    let (_, published) = run_gateway();
    let mut mapper = CoilMapper::new(GateConfig::new()).unwrap();
    let mut bridge = PulseBridge::new(PulseLog::default(), &BridgeConfig { pulse_ms: 0 });

    for line in published.lines() {
        let relayed = decode_forwarded_payload(line.as_bytes()).unwrap();
        if let Some(coil) = mapper.map(&relayed.event) {
            bridge.pulse(coil).unwrap();
        }
    }

    assert_eq!(
        bridge.writer().0,
        vec![(0, true), (0, false), (1, true), (1, false), (2, true), (2, false)]
    );
}

#[test]
fn monitor_follows_stage_coils() {
    let config = MonitorConfig::default();
    let mut source = CoilSignalSource::new(MemoryCoilBank::new(8), &config);
    let mut monitor = PathwayMonitor::new(config.compliance_threshold().unwrap());
    let mut events = Vec::new();

    let steps: &[(u16, bool)] = &[(4, true), (5, true), (4, false), (6, true)];
    for (coil, value) in steps {
        source.reader_mut().write_coil(*coil, *value).unwrap();
        let sample = source.sample().unwrap();
        events.extend(monitor.tick(&sample));
    }

    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], StageEvent::RegistrationReached { .. }));
    assert!(matches!(events[1], StageEvent::TriageReached { .. }));
    assert!(matches!(events[2], StageEvent::EvaluationReached { compliant: true, .. }));
}

#[test]
fn reference_scenario_ninety_minutes_is_compliant() {
    let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
    let mut monitor = PathwayMonitor::new(Duration::minutes(120));

    let samples = [
        StageSample::readable(t0 - Duration::seconds(1), false, false, false),
        StageSample::readable(t0, true, false, false),
        StageSample::readable(t0 + Duration::minutes(5), true, true, false),
        StageSample::readable(t0 + Duration::minutes(90), true, true, true),
    ];
    let last = samples.iter().filter_map(|s| monitor.tick(s)).last().unwrap();

    match last {
        StageEvent::EvaluationReached { total, compliant, .. } => {
            assert_eq!(total, Duration::minutes(90));
            assert!(compliant);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[derive(Default)]
struct PulseLog(Vec<(u16, bool)>);

impl CoilWriter for PulseLog {
    fn write_coil(&mut self, address: u16, value: bool) -> flowgate_core::Result<()> {
        self.0.push((address, value));
        Ok(())
    }
}
