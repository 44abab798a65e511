//! Signal fixtures and the registry that owns them
//!
//! The registry is the only owner of [`SimSignal`] values. It is mutated by
//! the clock's tick and by explicit commands, never destroyed mid-session.

use std::collections::HashMap;

use log::{debug, info};

use super::error::{EngineError, EngineResult};
use super::rng::SimRng;
use super::transition::{clamp_density, successor, TransitionPolicy};
use super::types::{GeoPoint, LightState, SignalId, SignalPriority, DEFAULT_CYCLE_TIME};

/// A signal fixture at an intersection
#[derive(Debug, Clone, PartialEq)]
pub struct SimSignal {
    pub id: SignalId,
    /// Display name of the intersection
    pub name: String,
    pub location: GeoPoint,
    pub current_state: LightState,
    /// State that becomes current when the countdown elapses
    pub next_state: LightState,
    /// Seconds until the next scheduled transition, never negative
    pub time_remaining: f32,
    /// Nominal full-cycle duration, informational only
    pub cycle_time: f32,
    pub priority: SignalPriority,
    /// Traffic density in `[0, 100]`
    pub traffic_density: f32,
    /// Simulation time (seconds) of the last mutation
    pub last_updated: f64,
}

impl SimSignal {
    /// Create a signal whose queued next state follows the canonical cycle
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        location: GeoPoint,
        current_state: LightState,
        time_remaining: f32,
    ) -> Self {
        Self {
            id: SignalId(id.into()),
            name: name.into(),
            location,
            current_state,
            next_state: successor(current_state),
            time_remaining: time_remaining.max(0.0),
            cycle_time: DEFAULT_CYCLE_TIME,
            priority: SignalPriority::Normal,
            traffic_density: 0.0,
            last_updated: 0.0,
        }
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.traffic_density = clamp_density(density);
        self
    }

    pub fn with_next_state(mut self, next_state: LightState) -> Self {
        self.next_state = next_state;
        self
    }

    pub fn with_cycle_time(mut self, cycle_time: f32) -> Self {
        self.cycle_time = cycle_time.max(0.0);
        self
    }

    pub fn with_priority(mut self, priority: SignalPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Advance this signal by one tick
    ///
    /// Returns true if the countdown elapsed and the phase changed.
    pub fn update(
        &mut self,
        delta_secs: f32,
        now: f64,
        policy: &TransitionPolicy,
        rng: &mut SimRng,
    ) -> bool {
        self.time_remaining = (self.time_remaining - delta_secs).max(0.0);

        let mut changed = false;
        if self.time_remaining <= 0.0 {
            let change = policy.on_countdown_elapsed(self.next_state, rng);
            debug!(
                "Signal {}: {} -> {} (next {}, {:.1}s)",
                self.id, self.current_state, change.current_state, change.next_state, change.time_remaining
            );
            self.current_state = change.current_state;
            self.next_state = change.next_state;
            self.time_remaining = change.time_remaining;
            changed = true;
        }

        self.traffic_density = policy.drift_density(self.traffic_density, rng);
        self.last_updated = now;
        changed
    }
}

/// Authoritative collection of signal fixtures, in registration order
#[derive(Debug, Clone, Default)]
pub struct SignalRegistry {
    signals: Vec<SimSignal>,
    index: HashMap<SignalId, usize>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an initial population.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if two signals share an id.
    pub fn from_signals(signals: Vec<SimSignal>) -> EngineResult<Self> {
        let mut registry = Self::new();
        for signal in signals {
            registry.add_signal(signal)?;
        }
        Ok(registry)
    }

    /// Register a signal. Only valid while building the session.
    pub fn add_signal(&mut self, mut signal: SimSignal) -> EngineResult<()> {
        if self.index.contains_key(&signal.id) {
            return Err(EngineError::InvalidConfig(format!(
                "duplicate signal id {}",
                signal.id
            )));
        }
        signal.time_remaining = signal.time_remaining.max(0.0);
        signal.traffic_density = clamp_density(signal.traffic_density);
        self.index.insert(signal.id.clone(), self.signals.len());
        self.signals.push(signal);
        Ok(())
    }

    /// Advance every signal by `delta_secs`, returning how many changed phase
    pub fn advance_tick(
        &mut self,
        delta_secs: f32,
        now: f64,
        policy: &TransitionPolicy,
        rng: &mut SimRng,
    ) -> usize {
        let delta_secs = delta_secs.max(0.0);
        self.signals
            .iter_mut()
            .map(|signal| signal.update(delta_secs, now, policy, rng))
            .filter(|changed| *changed)
            .count()
    }

    /// Force the lit state of a signal without touching its schedule
    pub fn set_manual_state(&mut self, id: &SignalId, state: LightState, now: f64) -> EngineResult<()> {
        let signal = self.get_mut(id)?;
        info!("Manual state on {}: {} -> {}", id, signal.current_state, state);
        signal.current_state = state;
        signal.last_updated = now;
        Ok(())
    }

    /// Raise a signal to emergency priority or return it to normal.
    /// The lit state is left alone.
    pub fn set_emergency_override(&mut self, id: &SignalId, enabled: bool, now: f64) -> EngineResult<()> {
        let signal = self.get_mut(id)?;
        signal.priority = if enabled {
            SignalPriority::Emergency
        } else {
            SignalPriority::Normal
        };
        signal.last_updated = now;
        info!("Emergency override on {}: {}", id, if enabled { "on" } else { "off" });
        Ok(())
    }

    pub fn get(&self, id: &SignalId) -> Option<&SimSignal> {
        self.index.get(id).map(|&i| &self.signals[i])
    }

    fn get_mut(&mut self, id: &SignalId) -> EngineResult<&mut SimSignal> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.signals[i]),
            None => Err(EngineError::signal_not_found(id.0.clone())),
        }
    }

    pub fn contains(&self, id: &SignalId) -> bool {
        self.index.contains_key(id)
    }

    pub fn list(&self) -> &[SimSignal] {
        &self.signals
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}
