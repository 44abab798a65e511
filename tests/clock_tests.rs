//! Clock, command queue, dispatcher and query surface tests

use std::time::{Duration, Instant};

use signal_sim::simulation::{
    aggregate, Command, CongestionLevel, Direction, EmergencyDispatcher, EmergencyVehicleType, EngineConfig,
    EngineError, FlowSample, FlowSource, GeoPoint, LightState, NoopObserver, SignalId,
    SignalPriority, SimClock, SimEmergencyVehicle, SimEngine, SimRng, SimSignal, SystemStatus,
    VehicleId,
};

fn test_config() -> EngineConfig {
    EngineConfig {
        flow_refresh_ticks: 0,
        ..EngineConfig::default()
    }
}

fn signal(id: &str, state: LightState, time_remaining: f32) -> SimSignal {
    SimSignal::new(id, format!("Intersection {}", id), GeoPoint::new(40.0, -74.0), state, time_remaining)
        .with_density(40.0)
}

fn vehicle(id: &str, eta: f32, route: &[&str]) -> SimEmergencyVehicle {
    SimEmergencyVehicle::new(
        id,
        EmergencyVehicleType::Fire,
        GeoPoint::new(40.0, -74.0),
        GeoPoint::new(40.01, -74.0),
        1,
        eta,
    )
    .with_affected_signals(route.iter().copied())
}

fn test_engine(config: EngineConfig) -> SimEngine {
    let mut engine = SimEngine::new(config, SimRng::seeded(7)).unwrap();
    engine.add_signal(signal("s1", LightState::Red, 500.0)).unwrap();
    engine.add_signal(signal("s2", LightState::Green, 500.0)).unwrap();
    engine.add_signal(signal("s3", LightState::Yellow, 500.0)).unwrap();
    engine.add_vehicle(vehicle("v1", 5.0, &["s1", "s2"])).unwrap();
    engine.add_vehicle(vehicle("v2", 5.0, &["s2", "s3"])).unwrap();
    engine.add_vehicle(vehicle("v3", 0.0, &["s3"])).unwrap();
    engine
}

fn find_signal<'a>(signals: &'a [SimSignal], id: &str) -> &'a SimSignal {
    signals.iter().find(|s| s.id.0 == id).unwrap()
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = EngineConfig {
        min_phase_secs: 70.0,
        max_phase_secs: 10.0,
        ..EngineConfig::default()
    };
    assert!(matches!(
        SimEngine::new(config, SimRng::seeded(1)),
        Err(EngineError::InvalidConfig(_))
    ));

    let config = EngineConfig {
        tick_interval: Duration::ZERO,
        ..EngineConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_commands_wait_for_next_tick() {
    let mut clock = SimClock::new(test_engine(test_config()));
    let handle = clock.handle();

    handle.set_manual_state("s1", "green").unwrap();
    assert_eq!(handle.pending_commands(), 1);
    assert_eq!(find_signal(&handle.signals(), "s1").current_state, LightState::Red);

    let report = clock.tick(1.0);
    assert_eq!(report.commands_applied, 1);
    assert_eq!(handle.pending_commands(), 0);
    assert_eq!(find_signal(&handle.signals(), "s1").current_state, LightState::Green);
}

#[test]
fn test_commands_apply_in_arrival_order() {
    let mut clock = SimClock::new(test_engine(test_config()));
    let handle = clock.handle();

    handle.set_manual_state("s2", "yellow").unwrap();
    handle.set_manual_state("s2", "red").unwrap();
    clock.tick(1.0);

    assert_eq!(find_signal(&handle.signals(), "s2").current_state, LightState::Red);
}

/// Queued commands land before the scheduled transition of the same tick
#[test]
fn test_commands_apply_before_signal_advance() {
    let mut engine = SimEngine::new(test_config(), SimRng::seeded(3)).unwrap();
    engine
        .add_signal(signal("s1", LightState::Red, 0.5).with_next_state(LightState::Green))
        .unwrap();
    let mut clock = SimClock::new(engine);
    let handle = clock.handle();

    handle.set_manual_state("s1", "yellow").unwrap();
    let report = clock.tick(1.0);
    assert_eq!(report.transitions, 1);

    let s = find_signal(&handle.signals(), "s1").clone();
    assert_eq!(s.current_state, LightState::Green);
    assert_eq!(s.next_state, LightState::Yellow);
}

/// An unknown id is refused up front and nothing changes
#[test]
fn test_unknown_id_leaves_snapshot_unchanged() {
    let clock = SimClock::new(test_engine(test_config()));
    let handle = clock.handle();
    let before = handle.snapshot();

    let err = handle.set_manual_state("s404", "green").unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    assert!(matches!(
        handle.set_emergency_override("s404", true),
        Err(EngineError::NotFound { .. })
    ));
    assert!(matches!(
        handle.set_vehicle_active("v404", false),
        Err(EngineError::NotFound { .. })
    ));

    assert_eq!(handle.pending_commands(), 0);
    assert_eq!(*handle.snapshot(), *before);
}

#[test]
fn test_engine_apply_unknown_id_leaves_engine_unchanged() {
    let mut engine = test_engine(test_config());
    let before = engine.snapshot();
    let err = engine
        .apply(&Command::SetManualState {
            signal: SignalId::new("s404"),
            state: LightState::Green,
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    assert_eq!(engine.snapshot(), before);
}

#[test]
fn test_invalid_state_is_rejected() {
    let clock = SimClock::new(test_engine(test_config()));
    let handle = clock.handle();

    let err = handle.set_manual_state("s1", "blue").unwrap_err();
    assert_eq!(err, EngineError::InvalidState("blue".to_string()));
    assert_eq!(handle.pending_commands(), 0);
}

#[test]
fn test_command_text_parsing() {
    assert_eq!(
        "manual s1 yellow".parse::<Command>().unwrap(),
        Command::SetManualState {
            signal: SignalId::new("s1"),
            state: LightState::Yellow,
        }
    );
    assert_eq!(
        "override s2 off".parse::<Command>().unwrap(),
        Command::SetEmergencyOverride {
            signal: SignalId::new("s2"),
            enabled: false,
        }
    );
    assert_eq!(
        "vehicle v1 on".parse::<Command>().unwrap(),
        Command::SetVehicleActive {
            vehicle: VehicleId::new("v1"),
            active: true,
        }
    );
    assert_eq!(
        "dispatch v1 40.5 -73.9".parse::<Command>().unwrap(),
        Command::Dispatch {
            vehicle: VehicleId::new("v1"),
            destination: GeoPoint::new(40.5, -73.9),
        }
    );

    assert!(matches!("manual s1 purple".parse::<Command>(), Err(EngineError::InvalidState(_))));
    assert!(matches!("manual s1".parse::<Command>(), Err(EngineError::InvalidCommand(_))));
    assert!(matches!("override s1 maybe".parse::<Command>(), Err(EngineError::InvalidCommand(_))));
    assert!(matches!("dispatch v1 abc 1".parse::<Command>(), Err(EngineError::InvalidCommand(_))));
    assert!(matches!("dispatch v1 95 1".parse::<Command>(), Err(EngineError::InvalidCommand(_))));
    assert!(matches!("reboot everything".parse::<Command>(), Err(EngineError::InvalidCommand(_))));
    assert!(matches!("".parse::<Command>(), Err(EngineError::InvalidCommand(_))));
}

#[test]
fn test_command_display_round_trips_through_parser() {
    let command = Command::SetEmergencyOverride {
        signal: SignalId::new("s3"),
        enabled: true,
    };
    assert_eq!(command.to_string().parse::<Command>().unwrap(), command);
}

#[test]
fn test_submit_text_queues_parsed_command() {
    let mut clock = SimClock::new(test_engine(test_config()));
    let handle = clock.handle();

    handle.submit_text("vehicle v1 off").unwrap();
    assert!(matches!(handle.submit_text("vehicle v9 off"), Err(EngineError::NotFound { .. })));
    clock.tick(1.0);

    let v1 = handle
        .emergency_vehicles()
        .into_iter()
        .find(|v| v.id.0 == "v1")
        .unwrap();
    assert!(!v1.active);
    assert_eq!(v1.eta, 0.0);
}

#[test]
fn test_tick_advances_signals_and_vehicles() {
    let config = EngineConfig {
        eta_decay_per_sec: 0.5,
        ..test_config()
    };
    let mut clock = SimClock::new(test_engine(config));
    let handle = clock.handle();

    clock.tick(2.0);
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.tick, 1);
    assert_eq!(snapshot.time, 2.0);
    assert_eq!(find_signal(&snapshot.signals, "s1").time_remaining, 498.0);
    assert_eq!(find_signal(&snapshot.signals, "s1").last_updated, 2.0);
    let v1 = snapshot.emergency_vehicles.iter().find(|v| v.id.0 == "v1").unwrap();
    assert_eq!(v1.eta, 4.0);
}

/// A late wake produces one enlarged tick, not several stale ones
#[test]
fn test_late_wake_is_a_single_catch_up_tick() {
    let mut clock = SimClock::new(test_engine(test_config()));
    let start = Instant::now();

    let first = clock.tick_at(start);
    assert_eq!(first.tick, 1);
    assert_eq!(first.delta_secs, 1.0);

    let late = clock.tick_at(start + Duration::from_secs(5));
    assert_eq!(late.tick, 2);
    assert_eq!(late.delta_secs, 5.0);
    assert_eq!(clock.handle().snapshot().time, 6.0);
}

#[test]
fn test_run_stops_at_tick_limit() {
    let config = EngineConfig {
        tick_interval: Duration::from_millis(250),
        ..test_config()
    };
    let mut clock = SimClock::new(test_engine(config));
    assert_eq!(clock.interval(), Duration::from_millis(250));

    let ticks = clock.run(Some(5), false, &mut NoopObserver);
    assert_eq!(ticks, 5);
    let snapshot = clock.handle().snapshot();
    assert_eq!(snapshot.tick, 5);
    assert_eq!(snapshot.time, 1.25);
}

/// A typed dispatch with a bad destination is refused before it is queued
#[test]
fn test_dispatch_with_invalid_destination_is_rejected() {
    let mut clock = SimClock::new(test_engine(test_config()));
    let handle = clock.handle();
    let before = handle.emergency_vehicles();

    for destination in [
        GeoPoint::new(f64::NAN, 500.0),
        GeoPoint::new(40.0, f64::INFINITY),
        GeoPoint::new(91.0, 0.0),
        GeoPoint::new(0.0, -180.5),
    ] {
        assert!(matches!(
            handle.dispatch("v1", destination),
            Err(EngineError::InvalidCommand(_))
        ));
    }
    assert!(matches!(
        handle.dispatch("v404", GeoPoint::new(f64::NAN, 0.0)),
        Err(EngineError::NotFound { .. })
    ));
    assert_eq!(handle.pending_commands(), 0);

    clock.tick(0.0);
    assert_eq!(handle.emergency_vehicles(), before);

    handle.dispatch("v1", GeoPoint::new(40.05, -74.0)).unwrap();
    assert_eq!(handle.pending_commands(), 1);
}

/// Applying a bad dispatch directly also leaves the fleet unchanged
#[test]
fn test_engine_apply_rejects_invalid_destination() {
    let mut engine = test_engine(test_config());
    let before = engine.fleet().list().to_vec();
    let command = Command::Dispatch {
        vehicle: VehicleId::new("v1"),
        destination: GeoPoint::new(f64::NAN, 0.0),
    };
    assert!(matches!(command.validate(), Err(EngineError::InvalidCommand(_))));
    assert!(matches!(engine.apply(&command), Err(EngineError::InvalidCommand(_))));
    assert_eq!(engine.fleet().list(), before.as_slice());
}

#[test]
fn test_flow_history_must_hold_one_refresh() {
    let config = EngineConfig {
        flow_history: 8,
        ..test_config()
    };
    let mut engine = SimEngine::new(config, SimRng::seeded(1)).unwrap();
    engine.add_signal(signal("s1", LightState::Red, 10.0)).unwrap();
    engine.add_signal(signal("s2", LightState::Red, 10.0)).unwrap();
    assert!(matches!(
        engine.add_signal(signal("s3", LightState::Red, 10.0)),
        Err(EngineError::InvalidConfig(_))
    ));
    assert_eq!(engine.signals().len(), 2);

    engine.refresh_flow();
    let summary = aggregate(&engine.snapshot().flow);
    assert_eq!(summary.totals.sample_count, 8);
}

#[test]
fn test_stopped_clock_schedules_nothing() {
    let mut clock = SimClock::new(test_engine(test_config()));
    let handle = clock.handle();
    handle.stop();
    assert!(handle.is_stopped());
    assert_eq!(clock.run(None, false, &mut NoopObserver), 0);
    assert_eq!(handle.snapshot().tick, 0);
}

#[test]
fn test_flow_refresh_feeds_summary() {
    let config = EngineConfig {
        flow_refresh_ticks: 1,
        ..EngineConfig::default()
    };
    let mut clock = SimClock::new(test_engine(config));
    let handle = clock.handle();
    assert_eq!(handle.flow_summary().totals.sample_count, 0);

    clock.tick(1.0);
    clock.tick(1.0);
    // Two refreshes, but only the newest sample per pair is aggregated
    assert_eq!(handle.snapshot().flow.len(), 24);
    let summary = handle.flow_summary();
    assert_eq!(summary.totals.sample_count, 12);
    for direction in Direction::ALL {
        assert_eq!(summary.direction(direction).unwrap().sample_count, 3);
    }
}

#[test]
fn test_system_status() {
    let mut clock = SimClock::new(test_engine(test_config()));
    let handle = clock.handle();

    let status = handle.system_status();
    assert_eq!(status.signals_online, 3);
    assert_eq!(status.emergency_signals, 0);
    assert_eq!(status.active_vehicles, 2);
    assert!((status.average_density - 40.0).abs() < 1e-4);

    handle.set_emergency_override("s1", true).unwrap();
    clock.tick(1.0);
    assert_eq!(handle.system_status().emergency_signals, 1);

    assert_eq!(SystemStatus::from_parts(&[], &[]).average_density, 0.0);
}

#[test]
fn test_dispatcher_raises_and_releases_route_overrides() {
    let mut clock = SimClock::new(test_engine(test_config()));
    let handle = clock.handle();
    let mut dispatcher = EmergencyDispatcher::new(handle.clone());
    let states_before: Vec<LightState> = handle.signals().iter().map(|s| s.current_state).collect();

    let issued = dispatcher.observe(&handle.snapshot());
    let raised: Vec<&str> = issued
        .iter()
        .map(|c| match c {
            Command::SetEmergencyOverride { signal, enabled: true } => signal.0.as_str(),
            other => panic!("unexpected command {:?}", other),
        })
        .collect();
    assert_eq!(raised, vec!["s1", "s2", "s3"]);

    clock.tick(1.0);
    let signals = handle.signals();
    assert!(signals.iter().all(|s| s.priority == SignalPriority::Emergency));
    let states_after: Vec<LightState> = signals.iter().map(|s| s.current_state).collect();
    assert_eq!(states_before, states_after);

    // Nothing changed, nothing issued
    assert!(dispatcher.observe(&handle.snapshot()).is_empty());

    handle.set_vehicle_active("v1", false).unwrap();
    clock.tick(1.0);
    let issued = dispatcher.observe(&handle.snapshot());
    assert_eq!(
        issued,
        vec![Command::SetEmergencyOverride {
            signal: SignalId::new("s1"),
            enabled: false,
        }]
    );

    clock.tick(1.0);
    let signals = handle.signals();
    assert_eq!(find_signal(&signals, "s1").priority, SignalPriority::Normal);
    assert_eq!(find_signal(&signals, "s2").priority, SignalPriority::Emergency);
    assert_eq!(find_signal(&signals, "s3").priority, SignalPriority::Emergency);
}

#[test]
fn test_dispatcher_runs_as_tick_observer() {
    let mut clock = SimClock::new(test_engine(test_config()));
    let handle = clock.handle();
    let mut dispatcher = EmergencyDispatcher::new(handle.clone());

    clock.run(Some(2), false, &mut dispatcher);
    assert_eq!(handle.system_status().emergency_signals, 3);
}

#[test]
fn test_seeded_demo_engines_are_identical() {
    let run = |seed: u64| {
        let engine = SimEngine::create_demo_engine(EngineConfig::default(), SimRng::seeded(seed)).unwrap();
        let mut clock = SimClock::new(engine);
        clock.run(Some(50), false, &mut NoopObserver);
        clock.handle().snapshot()
    };
    assert_eq!(*run(2024), *run(2024));
}

#[test]
fn test_demo_engine_population() {
    let engine = SimEngine::create_demo_engine(EngineConfig::default(), SimRng::seeded(1)).unwrap();
    assert_eq!(engine.signals().len(), 4);
    assert_eq!(engine.fleet().len(), 3);
    assert!(engine.fleet().list().iter().all(|v| v.active));
    assert_eq!(engine.snapshot().flow.len(), 16);
    for vehicle in engine.fleet().list() {
        for signal in &vehicle.affected_signals {
            assert!(engine.signals().contains(signal));
        }
    }
}

/// Reports every signal as jammed from the north only
struct NorthJamSource;

impl FlowSource for NorthJamSource {
    fn sample(&mut self, signals: &[SimSignal], now: f64, _rng: &mut SimRng) -> Vec<FlowSample> {
        signals
            .iter()
            .map(|s| FlowSample::new(s.id.0.clone(), Direction::North, 20, 3.0, CongestionLevel::High, now))
            .collect()
    }
}

#[test]
fn test_pluggable_flow_source() {
    let config = EngineConfig {
        flow_refresh_ticks: 2,
        ..EngineConfig::default()
    };
    let mut engine = test_engine(config).with_flow_source(NorthJamSource);
    engine.add_flow_samples([FlowSample::new("s1", Direction::East, 4, 30.0, CongestionLevel::Low, 0.0)]);
    let mut clock = SimClock::new(engine);
    let handle = clock.handle();

    assert!(!clock.tick(1.0).flow_refreshed);
    assert!(clock.tick(1.0).flow_refreshed);

    let summary = handle.flow_summary();
    let north = summary.direction(Direction::North).unwrap();
    assert_eq!(north.total_vehicles, 60);
    assert_eq!(north.congestion_level, CongestionLevel::High);
    assert_eq!(summary.direction(Direction::East).unwrap().total_vehicles, 4);
    assert_eq!(summary.totals.high_congestion_samples, 3);
    assert_eq!(clock.engine().tick_count(), 2);
    assert_eq!(clock.engine().time(), 2.0);
}

/// Session time keeps sub-second resolution deep into a long session
#[test]
fn test_session_time_keeps_precision() {
    let mut clock = SimClock::new(test_engine(test_config()));
    clock.tick(16_777_216.0);
    clock.tick(0.5);
    clock.tick(1.0);

    let snapshot = clock.handle().snapshot();
    assert_eq!(snapshot.time, 16_777_217.5);
    assert_eq!(find_signal(&snapshot.signals, "s1").last_updated, 16_777_217.5);
}
