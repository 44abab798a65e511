//! Signal simulation engine
//!
//! This module contains the simulation core: signal cycling, traffic density
//! drift, emergency vehicle ETA decay and per-direction flow aggregation. It
//! runs headless and exposes a command/query surface for a polling console.

mod clock;
mod command;
mod config;
mod dispatcher;
mod emergency;
mod engine;
mod error;
mod flow;
mod rng;
mod signal;
mod status;
mod transition;
mod types;

pub use clock::{EngineHandle, NoopObserver, SimClock, TickObserver, CATCH_UP_FACTOR};
pub use command::{check_destination, Command, CommandQueue};
pub use config::{
    EngineConfig, DEFAULT_ETA_DECAY_PER_SEC, DEFAULT_FLOW_HISTORY, DEFAULT_FLOW_REFRESH_TICKS,
    DEFAULT_RESPONSE_SPEED_KM_PER_MIN, DEFAULT_TICK_INTERVAL,
};
pub use dispatcher::EmergencyDispatcher;
pub use emergency::{next_arrival, EmergencyFleet, SimEmergencyVehicle, MIN_DISPATCH_ETA};
pub use engine::{EngineSnapshot, SimEngine, TickReport};
pub use error::{EngineError, EngineResult, EntityKind};
pub use flow::{
    aggregate, classify_congestion, congestion_for_density, latest_per_pair, DirectionFlow,
    FlowLog, FlowSample, FlowSource, FlowSummary, FlowTotals, RandomFlowSource,
    HIGH_DENSITY_THRESHOLD, MEDIUM_DENSITY_THRESHOLD,
};
pub use rng::SimRng;
pub use signal::{SignalRegistry, SimSignal};
pub use status::SystemStatus;
pub use transition::{clamp_density, successor, PhaseChange, TransitionPolicy};
pub use types::{
    CongestionLevel, Direction, EmergencyVehicleType, GeoPoint, LightState, SignalId,
    SignalPriority, VehicleId, DEFAULT_CYCLE_TIME, DENSITY_DRIFT, MAX_DENSITY, MAX_PHASE_SECS,
    MIN_PHASE_SECS,
};
