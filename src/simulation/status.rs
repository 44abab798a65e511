//! System health rollup shown on the console's status panel

use super::emergency::SimEmergencyVehicle;
use super::engine::EngineSnapshot;
use super::signal::SimSignal;
use super::types::SignalPriority;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemStatus {
    pub signals_online: usize,
    /// Signals currently at emergency priority
    pub emergency_signals: usize,
    pub active_vehicles: usize,
    /// Mean traffic density across signals, 0 with no signals
    pub average_density: f32,
}

impl SystemStatus {
    pub fn from_snapshot(snapshot: &EngineSnapshot) -> Self {
        Self::from_parts(&snapshot.signals, &snapshot.emergency_vehicles)
    }

    pub fn from_parts(signals: &[SimSignal], vehicles: &[SimEmergencyVehicle]) -> Self {
        let average_density = if signals.is_empty() {
            0.0
        } else {
            signals.iter().map(|s| s.traffic_density).sum::<f32>() / signals.len() as f32
        };

        Self {
            signals_online: signals.len(),
            emergency_signals: signals
                .iter()
                .filter(|s| s.priority == SignalPriority::Emergency)
                .count(),
            active_vehicles: vehicles.iter().filter(|v| v.active).count(),
            average_density,
        }
    }
}
