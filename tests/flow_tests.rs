//! Flow aggregation and sample generation tests

use signal_sim::simulation::{
    aggregate, classify_congestion, congestion_for_density, latest_per_pair, CongestionLevel,
    Direction, FlowLog, FlowSample, FlowSource, GeoPoint, LightState, RandomFlowSource, SimRng,
    SimSignal,
};

fn sample(signal: &str, direction: Direction, count: u32, speed: f32, level: CongestionLevel) -> FlowSample {
    FlowSample::new(signal, direction, count, speed, level, 0.0)
}

fn mixed_samples() -> Vec<FlowSample> {
    use CongestionLevel::*;
    use Direction::*;
    vec![
        sample("s1", North, 10, 20.0, High),
        sample("s2", North, 12, 10.0, High),
        sample("s3", North, 8, 30.0, Low),
        sample("s1", South, 5, 40.0, Low),
        sample("s1", East, 3, 25.0, High),
        sample("s2", East, 7, 35.0, Medium),
        sample("s3", East, 9, 15.0, Low),
        sample("s4", East, 1, 45.0, Low),
    ]
}

/// Majority rule across four directions, one of them empty
#[test]
fn test_direction_congestion_classification() {
    let summary = aggregate(&mixed_samples());

    let north = summary.direction(Direction::North).unwrap();
    assert_eq!(north.congestion_level, CongestionLevel::High);
    assert_eq!(north.total_vehicles, 30);
    assert!((north.average_speed - 20.0).abs() < 1e-4);

    let south = summary.direction(Direction::South).unwrap();
    assert_eq!(south.congestion_level, CongestionLevel::Low);

    let east = summary.direction(Direction::East).unwrap();
    assert_eq!(east.congestion_level, CongestionLevel::Medium);
    assert_eq!(east.sample_count, 4);

    let west = summary.direction(Direction::West).unwrap();
    assert_eq!(west.congestion_level, CongestionLevel::Low);
    assert_eq!(west.sample_count, 0);
    assert_eq!(west.total_vehicles, 0);
    assert_eq!(west.average_speed, 0.0);
}

#[test]
fn test_directions_are_reported_in_fixed_order() {
    let summary = aggregate(&[]);
    let order: Vec<Direction> = summary.per_direction.iter().map(|d| d.direction).collect();
    assert_eq!(order, Direction::ALL.to_vec());
}

#[test]
fn test_global_totals() {
    let summary = aggregate(&mixed_samples());
    assert_eq!(summary.totals.sample_count, 8);
    assert_eq!(summary.totals.total_vehicles, 55);
    assert_eq!(summary.totals.high_congestion_samples, 3);
    // (20 + 10 + 30 + 40 + 25 + 35 + 15 + 45) / 8
    assert!((summary.totals.average_speed - 27.5).abs() < 1e-4);
}

#[test]
fn test_empty_samples_do_not_divide_by_zero() {
    let summary = aggregate(&[]);
    assert_eq!(summary.totals.average_speed, 0.0);
    assert_eq!(summary.totals.total_vehicles, 0);
    assert!(summary
        .per_direction
        .iter()
        .all(|d| d.average_speed == 0.0 && d.congestion_level == CongestionLevel::Low));
}

#[test]
fn test_aggregation_is_idempotent() {
    let samples = mixed_samples();
    assert_eq!(aggregate(&samples), aggregate(&samples));
}

#[test]
fn test_vehicle_counts_are_conserved() {
    let mut rng = SimRng::seeded(11);
    let signals: Vec<SimSignal> = (0..6)
        .map(|i| {
            SimSignal::new(format!("s{}", i), "x", GeoPoint::default(), LightState::Red, 10.0)
                .with_density(i as f32 * 15.0)
        })
        .collect();
    let samples = RandomFlowSource::default().sample(&signals, 0.0, &mut rng);

    let summary = aggregate(&samples);
    let by_direction: u64 = summary.per_direction.iter().map(|d| d.total_vehicles).sum();
    let by_sample: u64 = samples.iter().map(|s| u64::from(s.vehicle_count)).sum();
    assert_eq!(by_direction, by_sample);
    assert_eq!(summary.totals.total_vehicles, by_sample);
}

#[test]
fn test_majority_rule_boundaries() {
    assert_eq!(classify_congestion(0, 0), CongestionLevel::Low);
    assert_eq!(classify_congestion(1, 2), CongestionLevel::Medium);
    assert_eq!(classify_congestion(2, 3), CongestionLevel::High);
    assert_eq!(classify_congestion(2, 4), CongestionLevel::Medium);
    assert_eq!(classify_congestion(3, 4), CongestionLevel::High);
}

#[test]
fn test_latest_per_pair_keeps_newest_sample() {
    let mut old = sample("s1", Direction::North, 10, 20.0, CongestionLevel::Low);
    old.timestamp = 1.0;
    let mut new = sample("s1", Direction::North, 99, 5.0, CongestionLevel::High);
    new.timestamp = 2.0;
    let mut other = sample("s1", Direction::South, 4, 30.0, CongestionLevel::Low);
    other.timestamp = 0.5;

    let latest = latest_per_pair(&[new.clone(), old, other.clone()]);
    assert_eq!(latest, vec![new, other]);
}

#[test]
fn test_latest_per_pair_prefers_later_entry_on_tie() {
    let first = sample("s1", Direction::West, 1, 10.0, CongestionLevel::Low);
    let second = sample("s1", Direction::West, 2, 10.0, CongestionLevel::Low);
    let latest = latest_per_pair(&[first, second.clone()]);
    assert_eq!(latest, vec![second]);
}

#[test]
fn test_flow_log_evicts_oldest() {
    let mut log = FlowLog::new(3);
    for count in 0..5 {
        log.push(sample("s1", Direction::North, count, 10.0, CongestionLevel::Low));
    }
    assert_eq!(log.len(), 3);
    let counts: Vec<u32> = log.to_vec().iter().map(|s| s.vehicle_count).collect();
    assert_eq!(counts, vec![2, 3, 4]);
}

#[test]
fn test_random_source_covers_every_direction_and_reflects_density() {
    let signals = vec![
        SimSignal::new("busy", "Busy", GeoPoint::default(), LightState::Red, 10.0).with_density(85.0),
        SimSignal::new("quiet", "Quiet", GeoPoint::default(), LightState::Red, 10.0).with_density(10.0),
    ];
    let mut source = RandomFlowSource::default();
    let samples = source.sample(&signals, 7.0, &mut SimRng::seeded(5));

    assert_eq!(samples.len(), 8);
    for s in &samples {
        assert!(s.vehicle_count < source.max_vehicles);
        assert!(s.average_speed >= source.min_speed && s.average_speed < source.max_speed);
        assert_eq!(s.timestamp, 7.0);
        let expected = if s.signal_id.0 == "busy" {
            CongestionLevel::High
        } else {
            CongestionLevel::Low
        };
        assert_eq!(s.congestion_level, expected);
    }
    assert_eq!(congestion_for_density(55.0), CongestionLevel::Medium);
}

#[test]
fn test_random_source_is_reproducible_with_seed() {
    let signals = vec![SimSignal::new("s1", "S1", GeoPoint::default(), LightState::Green, 10.0)];
    let a = RandomFlowSource::default().sample(&signals, 0.0, &mut SimRng::seeded(42));
    let b = RandomFlowSource::default().sample(&signals, 0.0, &mut SimRng::seeded(42));
    assert_eq!(a, b);
}
