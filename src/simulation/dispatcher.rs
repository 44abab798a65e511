//! Emergency dispatcher
//!
//! Watches published snapshots for changes in fleet activity and issues
//! emergency overrides for the signals on each active vehicle's route. It only
//! sets priority. Light states are never forced from here.

use std::collections::{BTreeSet, HashSet};

use log::{info, warn};

use super::clock::{EngineHandle, TickObserver};
use super::command::Command;
use super::engine::{EngineSnapshot, TickReport};
use super::types::{SignalId, VehicleId};

pub struct EmergencyDispatcher {
    handle: EngineHandle,
    previously_active: HashSet<VehicleId>,
}

impl EmergencyDispatcher {
    pub fn new(handle: EngineHandle) -> Self {
        Self {
            handle,
            previously_active: HashSet::new(),
        }
    }

    /// Work out the override commands implied by the change in active
    /// vehicles since the last observed snapshot.
    ///
    /// Newly active vehicles raise their route signals. Newly inactive
    /// vehicles release route signals that no still-active vehicle covers.
    pub fn plan(&mut self, snapshot: &EngineSnapshot) -> Vec<Command> {
        let active: HashSet<VehicleId> = snapshot.active_vehicles().map(|v| v.id.clone()).collect();

        let covered: HashSet<&SignalId> = snapshot
            .active_vehicles()
            .flat_map(|v| v.affected_signals.iter())
            .collect();

        let mut raise: BTreeSet<SignalId> = BTreeSet::new();
        let mut release: BTreeSet<SignalId> = BTreeSet::new();

        for vehicle in &snapshot.emergency_vehicles {
            let was_active = self.previously_active.contains(&vehicle.id);
            if vehicle.active && !was_active {
                raise.extend(vehicle.affected_signals.iter().cloned());
            } else if !vehicle.active && was_active {
                release.extend(
                    vehicle
                        .affected_signals
                        .iter()
                        .filter(|s| !covered.contains(s))
                        .cloned(),
                );
            }
        }

        self.previously_active = active;

        raise
            .into_iter()
            .map(|signal| Command::SetEmergencyOverride {
                signal,
                enabled: true,
            })
            .chain(release.into_iter().map(|signal| Command::SetEmergencyOverride {
                signal,
                enabled: false,
            }))
            .collect()
    }

    /// Plan against `snapshot` and submit the result, returning what was accepted
    pub fn observe(&mut self, snapshot: &EngineSnapshot) -> Vec<Command> {
        let mut submitted = Vec::new();
        for command in self.plan(snapshot) {
            match self.handle.submit(command.clone()) {
                Ok(()) => {
                    info!("Dispatcher issued {}", command);
                    submitted.push(command);
                }
                Err(e) => warn!("Dispatcher could not issue {}: {}", command, e),
            }
        }
        submitted
    }
}

impl TickObserver for EmergencyDispatcher {
    fn on_tick(&mut self, snapshot: &EngineSnapshot, _report: &TickReport) {
        self.observe(snapshot);
    }
}
