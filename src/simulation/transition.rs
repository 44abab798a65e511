//! Transition policy for signal fixtures
//!
//! Pure decision logic: what a signal does when its countdown elapses, and how
//! its density drifts. Nothing here touches the registry.

use super::rng::SimRng;
use super::types::{LightState, MAX_DENSITY};

/// Canonical successor in the signal cycle: red -> green -> yellow -> red
pub fn successor(state: LightState) -> LightState {
    match state {
        LightState::Red => LightState::Green,
        LightState::Green => LightState::Yellow,
        LightState::Yellow => LightState::Red,
    }
}

/// Phase timing parameters drawn from on every countdown expiry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionPolicy {
    /// Inclusive lower bound of a new phase duration (seconds)
    pub min_phase_secs: f32,
    /// Exclusive upper bound of a new phase duration (seconds)
    pub max_phase_secs: f32,
    /// Maximum density perturbation per tick, applied symmetrically
    pub density_drift: f32,
}

/// The outcome of an elapsed countdown
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseChange {
    pub current_state: LightState,
    pub next_state: LightState,
    pub time_remaining: f32,
}

impl TransitionPolicy {
    /// Decide the next phase once a countdown reaches zero.
    ///
    /// The queued `next_state` becomes current, the one after it is computed
    /// from the canonical cycle, and a fresh duration is drawn.
    pub fn on_countdown_elapsed(&self, queued_next: LightState, rng: &mut SimRng) -> PhaseChange {
        PhaseChange {
            current_state: queued_next,
            next_state: successor(queued_next),
            time_remaining: rng.random_range(self.min_phase_secs..self.max_phase_secs),
        }
    }

    /// Apply one tick of random drift to a density value, clamped to `[0, 100]`
    pub fn drift_density(&self, density: f32, rng: &mut SimRng) -> f32 {
        clamp_density(density + rng.symmetric(self.density_drift))
    }
}

/// Clamp a density into `[0, 100]`. Non-finite values collapse to 0.
pub fn clamp_density(density: f32) -> f32 {
    if density.is_finite() {
        density.clamp(0.0, MAX_DENSITY)
    } else {
        0.0
    }
}
