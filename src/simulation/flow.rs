//! Traffic flow samples and per-direction aggregation
//!
//! Samples are produced by a [`FlowSource`] once per signal per direction and
//! held in a bounded [`FlowLog`]. [`aggregate`] is a pure read-side rollup.

use std::collections::{BTreeMap, VecDeque};

use super::rng::SimRng;
use super::signal::SimSignal;
use super::types::{CongestionLevel, Direction, SignalId};

/// Densities at or above this produce high-congestion samples
pub const HIGH_DENSITY_THRESHOLD: f32 = 70.0;
/// Densities at or above this produce medium-congestion samples
pub const MEDIUM_DENSITY_THRESHOLD: f32 = 40.0;

/// One observation of traffic approaching a signal
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSample {
    pub signal_id: SignalId,
    pub direction: Direction,
    pub vehicle_count: u32,
    /// Mean speed of observed vehicles, never negative
    pub average_speed: f32,
    pub congestion_level: CongestionLevel,
    /// Simulation time (seconds) the sample was taken
    pub timestamp: f64,
}

impl FlowSample {
    pub fn new(
        signal_id: impl Into<String>,
        direction: Direction,
        vehicle_count: u32,
        average_speed: f32,
        congestion_level: CongestionLevel,
        timestamp: f64,
    ) -> Self {
        Self {
            signal_id: SignalId(signal_id.into()),
            direction,
            vehicle_count,
            average_speed: average_speed.max(0.0),
            congestion_level,
            timestamp,
        }
    }
}

/// Map a signal's traffic density onto a congestion level
pub fn congestion_for_density(density: f32) -> CongestionLevel {
    if density >= HIGH_DENSITY_THRESHOLD {
        CongestionLevel::High
    } else if density >= MEDIUM_DENSITY_THRESHOLD {
        CongestionLevel::Medium
    } else {
        CongestionLevel::Low
    }
}

/// Something that can observe traffic at the registered signals
pub trait FlowSource: Send {
    /// Produce one sample per signal per direction
    fn sample(&mut self, signals: &[SimSignal], now: f64, rng: &mut SimRng) -> Vec<FlowSample>;
}

/// Generates plausible flow samples from the engine's random source
#[derive(Debug, Clone)]
pub struct RandomFlowSource {
    pub max_vehicles: u32,
    pub min_speed: f32,
    pub max_speed: f32,
}

impl Default for RandomFlowSource {
    fn default() -> Self {
        Self {
            max_vehicles: 50,
            min_speed: 5.0,
            max_speed: 45.0,
        }
    }
}

impl FlowSource for RandomFlowSource {
    fn sample(&mut self, signals: &[SimSignal], now: f64, rng: &mut SimRng) -> Vec<FlowSample> {
        let mut samples = Vec::with_capacity(signals.len() * Direction::ALL.len());
        for signal in signals {
            let congestion_level = congestion_for_density(signal.traffic_density);
            for direction in Direction::ALL {
                samples.push(FlowSample {
                    signal_id: signal.id.clone(),
                    direction,
                    vehicle_count: rng.random_count(0..self.max_vehicles),
                    average_speed: rng.random_range(self.min_speed..self.max_speed),
                    congestion_level,
                    timestamp: now,
                });
            }
        }
        samples
    }
}

/// Bounded, append-only log of flow samples. The oldest samples fall off first.
#[derive(Debug, Clone)]
pub struct FlowLog {
    samples: VecDeque<FlowSample>,
    capacity: usize,
}

impl FlowLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: FlowSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = FlowSample>) {
        for sample in samples {
            self.push(sample);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn to_vec(&self) -> Vec<FlowSample> {
        self.samples.iter().cloned().collect()
    }
}

/// The newest sample for each (signal, direction) pair.
///
/// Later entries win timestamp ties. The result is ordered by signal id, then
/// direction.
pub fn latest_per_pair(samples: &[FlowSample]) -> Vec<FlowSample> {
    let mut latest: BTreeMap<(&SignalId, Direction), &FlowSample> = BTreeMap::new();
    for sample in samples {
        let key = (&sample.signal_id, sample.direction);
        let newer = latest
            .get(&key)
            .map_or(true, |existing| sample.timestamp >= existing.timestamp);
        if newer {
            latest.insert(key, sample);
        }
    }
    latest.into_values().cloned().collect()
}

/// Rollup of every sample for one direction
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionFlow {
    pub direction: Direction,
    pub sample_count: usize,
    pub total_vehicles: u64,
    /// Mean of sample speeds, 0 when the direction has no samples
    pub average_speed: f32,
    pub congestion_level: CongestionLevel,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlowTotals {
    pub sample_count: usize,
    pub total_vehicles: u64,
    /// Mean of all sample speeds, 0 when there are no samples
    pub average_speed: f32,
    pub high_congestion_samples: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowSummary {
    /// One entry per direction in north, south, east, west order
    pub per_direction: Vec<DirectionFlow>,
    pub totals: FlowTotals,
}

impl FlowSummary {
    pub fn direction(&self, direction: Direction) -> Option<&DirectionFlow> {
        self.per_direction.iter().find(|d| d.direction == direction)
    }
}

/// Majority rule: high if more than half the samples are high, medium if any
/// are, low otherwise (including no samples at all).
pub fn classify_congestion(high_samples: usize, sample_count: usize) -> CongestionLevel {
    if high_samples * 2 > sample_count {
        CongestionLevel::High
    } else if high_samples > 0 {
        CongestionLevel::Medium
    } else {
        CongestionLevel::Low
    }
}

fn mean_speed(speed_sum: f64, count: usize) -> f32 {
    if count == 0 {
        0.0
    } else {
        (speed_sum / count as f64) as f32
    }
}

/// Aggregate samples per direction plus global totals
pub fn aggregate(samples: &[FlowSample]) -> FlowSummary {
    let mut per_direction = Vec::with_capacity(Direction::ALL.len());
    let mut totals = FlowTotals::default();
    let mut total_speed = 0.0_f64;

    for direction in Direction::ALL {
        let mut sample_count = 0;
        let mut total_vehicles = 0_u64;
        let mut speed_sum = 0.0_f64;
        let mut high_samples = 0;

        for sample in samples.iter().filter(|s| s.direction == direction) {
            sample_count += 1;
            total_vehicles += u64::from(sample.vehicle_count);
            speed_sum += f64::from(sample.average_speed);
            if sample.congestion_level == CongestionLevel::High {
                high_samples += 1;
            }
        }

        totals.sample_count += sample_count;
        totals.total_vehicles += total_vehicles;
        totals.high_congestion_samples += high_samples;
        total_speed += speed_sum;

        per_direction.push(DirectionFlow {
            direction,
            sample_count,
            total_vehicles,
            average_speed: mean_speed(speed_sum, sample_count),
            congestion_level: classify_congestion(high_samples, sample_count),
        });
    }

    totals.average_speed = mean_speed(total_speed, totals.sample_count);

    FlowSummary {
        per_direction,
        totals,
    }
}
