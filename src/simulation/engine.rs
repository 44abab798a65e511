//! The simulation engine
//!
//! Owns every entity collection for a session: the signal registry, the
//! emergency fleet and the rolling flow log. It is constructed once and handed
//! to a [`SimClock`](super::clock::SimClock), which is the only thing that
//! mutates it afterwards.

use log::{debug, info};

use super::command::Command;
use super::config::EngineConfig;
use super::emergency::{EmergencyFleet, SimEmergencyVehicle};
use super::error::{EngineError, EngineResult};
use super::flow::{FlowLog, FlowSample, FlowSource, RandomFlowSource};
use super::rng::SimRng;
use super::signal::{SignalRegistry, SimSignal};
use super::status::SystemStatus;
use super::transition::TransitionPolicy;
use super::types::{Direction, EmergencyVehicleType, GeoPoint, LightState, VehicleId};

/// Immutable view of the engine published after every tick
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineSnapshot {
    pub tick: u64,
    /// Simulated seconds since the session started
    pub time: f64,
    pub signals: Vec<SimSignal>,
    pub emergency_vehicles: Vec<SimEmergencyVehicle>,
    pub flow: Vec<FlowSample>,
}

impl EngineSnapshot {
    pub fn active_vehicles(&self) -> impl Iterator<Item = &SimEmergencyVehicle> {
        self.emergency_vehicles.iter().filter(|v| v.active)
    }
}

/// What happened during one engine step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub delta_secs: f32,
    pub commands_applied: usize,
    pub commands_rejected: usize,
    /// Number of signals whose countdown elapsed
    pub transitions: usize,
    pub arrivals: Vec<VehicleId>,
    pub flow_refreshed: bool,
}

pub struct SimEngine {
    pub config: EngineConfig,
    policy: TransitionPolicy,
    signals: SignalRegistry,
    fleet: EmergencyFleet,
    flow: FlowLog,
    flow_source: Box<dyn FlowSource>,
    rng: SimRng,
    tick: u64,
    time: f64,
}

impl SimEngine {
    /// Create an empty engine.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidConfig` if `config` fails validation.
    pub fn new(config: EngineConfig, rng: SimRng) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            policy: config.transition_policy(),
            signals: SignalRegistry::new(),
            fleet: EmergencyFleet::new(config.eta_decay_per_sec, config.response_speed_km_per_min),
            flow: FlowLog::new(config.flow_history),
            flow_source: Box::new(RandomFlowSource::default()),
            rng,
            tick: 0,
            time: 0.0,
            config,
        })
    }

    /// Replace the flow sample generator
    pub fn with_flow_source(mut self, source: impl FlowSource + 'static) -> Self {
        self.flow_source = Box::new(source);
        self
    }

    /// Register a signal.
    ///
    /// The flow log must hold a full refresh (one sample per direction for
    /// every signal), otherwise a refresh would evict part of its own batch.
    pub fn add_signal(&mut self, signal: SimSignal) -> EngineResult<()> {
        let batch = (self.signals.len() + 1) * Direction::ALL.len();
        if batch > self.config.flow_history {
            return Err(EngineError::InvalidConfig(format!(
                "flow_history {} cannot hold one refresh of {} samples",
                self.config.flow_history, batch
            )));
        }
        self.signals.add_signal(signal)
    }

    pub fn add_vehicle(&mut self, vehicle: SimEmergencyVehicle) -> EngineResult<()> {
        self.fleet.add_vehicle(vehicle)
    }

    pub fn add_flow_samples(&mut self, samples: impl IntoIterator<Item = FlowSample>) {
        self.flow.extend(samples);
    }

    pub fn signals(&self) -> &SignalRegistry {
        &self.signals
    }

    pub fn fleet(&self) -> &EmergencyFleet {
        &self.fleet
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Apply one command immediately. Failures leave the engine unchanged.
    pub fn apply(&mut self, command: &Command) -> EngineResult<()> {
        match command {
            Command::SetManualState { signal, state } => {
                self.signals.set_manual_state(signal, *state, self.time)
            }
            Command::SetEmergencyOverride { signal, enabled } => {
                self.signals.set_emergency_override(signal, *enabled, self.time)
            }
            Command::SetVehicleActive { vehicle, active } => self.fleet.set_active(vehicle, *active),
            Command::Dispatch {
                vehicle,
                destination,
            } => self.fleet.dispatch(vehicle, *destination).map(|_| ()),
        }
    }

    /// Advance signals then vehicles by `delta_secs`, refreshing flow samples
    /// on the configured cadence.
    pub fn step(&mut self, delta_secs: f32) -> TickReport {
        let delta_secs = if delta_secs.is_finite() { delta_secs.max(0.0) } else { 0.0 };
        self.tick += 1;
        self.time += f64::from(delta_secs);

        let transitions = self
            .signals
            .advance_tick(delta_secs, self.time, &self.policy, &mut self.rng);
        let arrivals = self.fleet.advance_tick(delta_secs);

        let refresh_every = self.config.flow_refresh_ticks;
        let flow_refreshed = refresh_every > 0 && self.tick % refresh_every == 0;
        if flow_refreshed {
            self.refresh_flow();
        }

        debug!(
            "Tick {} (+{:.2}s): {} transitions, {} arrivals",
            self.tick,
            delta_secs,
            transitions,
            arrivals.len()
        );

        TickReport {
            tick: self.tick,
            delta_secs,
            transitions,
            arrivals,
            flow_refreshed,
            ..TickReport::default()
        }
    }

    /// Draw one flow sample per signal per direction into the rolling log
    pub fn refresh_flow(&mut self) {
        let samples = self
            .flow_source
            .sample(self.signals.list(), self.time, &mut self.rng);
        self.flow.extend(samples);
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            tick: self.tick,
            time: self.time,
            signals: self.signals.list().to_vec(),
            emergency_vehicles: self.fleet.list().to_vec(),
            flow: self.flow.to_vec(),
        }
    }

    /// Create an engine populated with a small downtown grid of signals and a
    /// fleet of three emergency vehicles
    pub fn create_demo_engine(config: EngineConfig, rng: SimRng) -> EngineResult<Self> {
        let mut engine = SimEngine::new(config, rng)?;

        let signal_data = [
            ("sig-1", "Main St & 1st Ave", GeoPoint::new(40.7128, -74.0060)),
            ("sig-2", "Broadway & 5th St", GeoPoint::new(40.7142, -74.0032)),
            ("sig-3", "Oak Ave & Pine St", GeoPoint::new(40.7105, -74.0091)),
            ("sig-4", "Harbor Blvd & Market St", GeoPoint::new(40.7161, -74.0075)),
        ];

        for (id, name, location) in signal_data {
            let state = *engine.rng.choose(&LightState::ALL).unwrap_or(&LightState::Red);
            let time_remaining = engine
                .rng
                .random_range(engine.policy.min_phase_secs..engine.policy.max_phase_secs);
            let density = engine.rng.random_range(20.0..90.0);
            engine.add_signal(
                SimSignal::new(id, name, location, state, time_remaining).with_density(density),
            )?;
        }

        let signal_ids: Vec<&str> = signal_data.iter().map(|(id, _, _)| *id).collect();
        let vehicle_data = [
            ("amb-1", EmergencyVehicleType::Ambulance, GeoPoint::new(40.7200, -74.0100), 1),
            ("fire-1", EmergencyVehicleType::Fire, GeoPoint::new(40.7050, -73.9990), 1),
            ("pol-1", EmergencyVehicleType::Police, GeoPoint::new(40.7180, -74.0020), 2),
        ];

        for (id, vehicle_type, location, priority) in vehicle_data {
            let destination = GeoPoint::new(
                40.7128 + f64::from(engine.rng.random_range(-0.01..0.01)),
                -74.0060 + f64::from(engine.rng.random_range(-0.01..0.01)),
            );
            let eta = engine.rng.random_range(1.0..8.0);
            let mut route = Vec::new();
            for _ in 0..2 {
                if let Some(signal) = engine.rng.choose(&signal_ids) {
                    route.push(signal.to_string());
                }
            }
            engine.add_vehicle(
                SimEmergencyVehicle::new(id, vehicle_type, location, destination, priority, eta)
                    .with_affected_signals(route),
            )?;
        }

        engine.refresh_flow();
        Ok(engine)
    }

    /// Log a summary of the engine state
    pub fn print_summary(&self) {
        let status = SystemStatus::from_parts(self.signals.list(), self.fleet.list());
        info!("=== Signal Simulation Summary ===");
        info!("Tick: {}, Time: {:.1}s", self.tick, self.time);
        info!("Signals online: {}", status.signals_online);
        info!("Emergency signals: {}", status.emergency_signals);
        info!("Active vehicles: {}", status.active_vehicles);
        info!("Average density: {:.1}%", status.average_density);

        for signal in self.signals.list() {
            info!(
                "  Signal {} [{}]: {} (next {} in {:.1}s), priority={}, density={:.0}%",
                signal.id,
                signal.name,
                signal.current_state,
                signal.next_state,
                signal.time_remaining,
                signal.priority,
                signal.traffic_density
            );
        }

        for vehicle in self.fleet.list() {
            info!(
                "  Vehicle {} ({}): eta={:.2}min, {}",
                vehicle.id,
                vehicle.vehicle_type,
                vehicle.eta,
                if vehicle.active { "active" } else { "idle" }
            );
        }
    }
}
