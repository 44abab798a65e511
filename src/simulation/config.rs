//! Engine configuration
//!
//! All tunables for a session live here with their defaults. The headless
//! runner overrides a subset from the command line.

use std::time::Duration;

use super::error::{EngineError, EngineResult};
use super::transition::TransitionPolicy;
use super::types::{DENSITY_DRIFT, MAX_PHASE_SECS, MIN_PHASE_SECS};

/// Default nominal tick interval
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Default ETA decay: one minute of ETA per sixty simulated seconds
pub const DEFAULT_ETA_DECAY_PER_SEC: f32 = 1.0 / 60.0;

/// Default response speed used to estimate dispatch ETAs (km per minute)
pub const DEFAULT_RESPONSE_SPEED_KM_PER_MIN: f64 = 1.0;

/// Default number of ticks between flow sample refreshes
pub const DEFAULT_FLOW_REFRESH_TICKS: u64 = 5;

/// Default capacity of the rolling flow sample log
pub const DEFAULT_FLOW_HISTORY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Nominal wall-clock interval between ticks
    pub tick_interval: Duration,
    pub min_phase_secs: f32,
    pub max_phase_secs: f32,
    pub density_drift: f32,
    /// ETA minutes removed per simulated second
    pub eta_decay_per_sec: f32,
    pub response_speed_km_per_min: f64,
    /// Refresh flow samples every N ticks (0 disables the refresh)
    pub flow_refresh_ticks: u64,
    pub flow_history: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            min_phase_secs: MIN_PHASE_SECS,
            max_phase_secs: MAX_PHASE_SECS,
            density_drift: DENSITY_DRIFT,
            eta_decay_per_sec: DEFAULT_ETA_DECAY_PER_SEC,
            response_speed_km_per_min: DEFAULT_RESPONSE_SPEED_KM_PER_MIN,
            flow_refresh_ticks: DEFAULT_FLOW_REFRESH_TICKS,
            flow_history: DEFAULT_FLOW_HISTORY,
        }
    }
}

impl EngineConfig {
    /// Reject configurations the engine cannot honour.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] describing the first offending field.
    pub fn validate(&self) -> EngineResult<()> {
        if self.tick_interval.is_zero() {
            return Err(EngineError::InvalidConfig(
                "tick_interval must be positive".to_string(),
            ));
        }
        if !(self.min_phase_secs >= 0.0 && self.min_phase_secs < self.max_phase_secs) {
            return Err(EngineError::InvalidConfig(format!(
                "phase range [{}, {}) is empty",
                self.min_phase_secs, self.max_phase_secs
            )));
        }
        if !(self.density_drift >= 0.0) {
            return Err(EngineError::InvalidConfig(
                "density_drift must be non-negative".to_string(),
            ));
        }
        if !(self.eta_decay_per_sec >= 0.0) {
            return Err(EngineError::InvalidConfig(
                "eta_decay_per_sec must be non-negative".to_string(),
            ));
        }
        if !(self.response_speed_km_per_min > 0.0) {
            return Err(EngineError::InvalidConfig(
                "response_speed_km_per_min must be positive".to_string(),
            ));
        }
        if self.flow_history == 0 {
            return Err(EngineError::InvalidConfig(
                "flow_history must hold at least one sample".to_string(),
            ));
        }
        Ok(())
    }

    pub fn transition_policy(&self) -> TransitionPolicy {
        TransitionPolicy {
            min_phase_secs: self.min_phase_secs,
            max_phase_secs: self.max_phase_secs,
            density_drift: self.density_drift,
        }
    }

    /// Nominal tick interval expressed in simulated seconds
    pub fn nominal_delta(&self) -> f32 {
        self.tick_interval.as_secs_f32()
    }
}
