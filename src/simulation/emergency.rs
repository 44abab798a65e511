//! Emergency vehicles and the fleet that owns them
//!
//! ETAs decay every tick until they reach exactly zero and hold there. A
//! vehicle is active while its ETA is positive. The fleet never touches
//! signal priority; see the dispatcher for that coordination.

use std::collections::HashMap;

use log::info;
use ordered_float::OrderedFloat;

use super::command::check_destination;
use super::config::{DEFAULT_ETA_DECAY_PER_SEC, DEFAULT_RESPONSE_SPEED_KM_PER_MIN};
use super::error::{EngineError, EngineResult};
use super::types::{EmergencyVehicleType, GeoPoint, SignalId, VehicleId};

/// Smallest ETA (minutes) a dispatch can produce
pub const MIN_DISPATCH_ETA: f32 = 0.1;

/// An emergency vehicle en route (or idle)
#[derive(Debug, Clone, PartialEq)]
pub struct SimEmergencyVehicle {
    pub id: VehicleId,
    pub vehicle_type: EmergencyVehicleType,
    pub location: GeoPoint,
    pub destination: GeoPoint,
    /// Caller-defined urgency ordinal
    pub priority: u8,
    /// Minutes until arrival, never negative
    pub eta: f32,
    /// ETA assigned by the most recent dispatch, used to re-arm the vehicle
    pub dispatch_eta: f32,
    /// Signals along the route. Lookup only, the fleet never mutates them.
    pub affected_signals: Vec<SignalId>,
    /// Always equal to `eta > 0`
    pub active: bool,
}

impl SimEmergencyVehicle {
    pub fn new(
        id: impl Into<String>,
        vehicle_type: EmergencyVehicleType,
        location: GeoPoint,
        destination: GeoPoint,
        priority: u8,
        eta: f32,
    ) -> Self {
        let eta = eta.max(0.0);
        Self {
            id: VehicleId(id.into()),
            vehicle_type,
            location,
            destination,
            priority,
            eta,
            dispatch_eta: eta,
            affected_signals: Vec::new(),
            active: eta > 0.0,
        }
    }

    /// Attach route signals, dropping duplicates while keeping first-seen order
    pub fn with_affected_signals<I, S>(mut self, signals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for signal in signals {
            let id = SignalId(signal.into());
            if !self.affected_signals.contains(&id) {
                self.affected_signals.push(id);
            }
        }
        self
    }

    /// Decay the ETA by `step` minutes.
    ///
    /// Returns true exactly on the tick where the ETA first reaches zero.
    pub fn update(&mut self, step: f32) -> bool {
        let was_active = self.active;
        self.eta = (self.eta - step.max(0.0)).max(0.0);
        self.active = self.eta > 0.0;
        was_active && !self.active
    }
}

#[derive(Debug, Clone)]
pub struct EmergencyFleet {
    vehicles: Vec<SimEmergencyVehicle>,
    index: HashMap<VehicleId, usize>,
    /// ETA minutes removed per simulated second
    eta_decay_per_sec: f32,
    response_speed_km_per_min: f64,
}

impl Default for EmergencyFleet {
    fn default() -> Self {
        Self::new(DEFAULT_ETA_DECAY_PER_SEC, DEFAULT_RESPONSE_SPEED_KM_PER_MIN)
    }
}

impl EmergencyFleet {
    pub fn new(eta_decay_per_sec: f32, response_speed_km_per_min: f64) -> Self {
        Self {
            vehicles: Vec::new(),
            index: HashMap::new(),
            eta_decay_per_sec: eta_decay_per_sec.max(0.0),
            response_speed_km_per_min,
        }
    }

    /// Register a vehicle. Only valid while building the session.
    pub fn add_vehicle(&mut self, mut vehicle: SimEmergencyVehicle) -> EngineResult<()> {
        if self.index.contains_key(&vehicle.id) {
            return Err(EngineError::InvalidConfig(format!(
                "duplicate vehicle id {}",
                vehicle.id
            )));
        }
        vehicle.eta = vehicle.eta.max(0.0);
        vehicle.active = vehicle.eta > 0.0;
        self.index.insert(vehicle.id.clone(), self.vehicles.len());
        self.vehicles.push(vehicle);
        Ok(())
    }

    /// Decay every ETA by the fleet rate, returning the vehicles that arrived
    pub fn advance_tick(&mut self, delta_secs: f32) -> Vec<VehicleId> {
        let step = self.eta_decay_per_sec * delta_secs.max(0.0);
        let mut arrived = Vec::new();
        for vehicle in &mut self.vehicles {
            if vehicle.update(step) {
                info!("Vehicle {} ({}) arrived at {}", vehicle.id, vehicle.vehicle_type, vehicle.destination);
                arrived.push(vehicle.id.clone());
            }
        }
        arrived
    }

    /// Activate or retire a vehicle.
    ///
    /// Retiring zeroes the ETA. Activating an idle vehicle re-arms the last
    /// dispatch ETA, so a vehicle that was never dispatched with a positive ETA
    /// stays inactive. Activating an en-route vehicle leaves its ETA alone.
    pub fn set_active(&mut self, id: &VehicleId, active: bool) -> EngineResult<()> {
        let vehicle = self.get_mut(id)?;
        if !active {
            vehicle.eta = 0.0;
        } else if !vehicle.active {
            vehicle.eta = vehicle.dispatch_eta.max(0.0);
        }
        vehicle.active = vehicle.eta > 0.0;
        info!("Vehicle {} set {}", id, if vehicle.active { "active" } else { "inactive" });
        Ok(())
    }

    /// Send a vehicle to a new destination, returning the estimated ETA in minutes
    pub fn dispatch(&mut self, id: &VehicleId, destination: GeoPoint) -> EngineResult<f32> {
        let speed = self.response_speed_km_per_min;
        let vehicle = self.get_mut(id)?;
        check_destination(destination)?;
        let distance_km = vehicle.location.distance_km(&destination);
        let eta = ((distance_km / speed) as f32).max(MIN_DISPATCH_ETA);

        vehicle.destination = destination;
        vehicle.eta = eta;
        vehicle.dispatch_eta = eta;
        vehicle.active = true;
        info!(
            "Dispatched {} ({}) to {}: {:.2} km, eta {:.1} min",
            id, vehicle.vehicle_type, destination, distance_km, eta
        );
        Ok(eta)
    }

    pub fn get(&self, id: &VehicleId) -> Option<&SimEmergencyVehicle> {
        self.index.get(id).map(|&i| &self.vehicles[i])
    }

    fn get_mut(&mut self, id: &VehicleId) -> EngineResult<&mut SimEmergencyVehicle> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.vehicles[i]),
            None => Err(EngineError::vehicle_not_found(id.0.clone())),
        }
    }

    pub fn contains(&self, id: &VehicleId) -> bool {
        self.index.contains_key(id)
    }

    pub fn list(&self) -> &[SimEmergencyVehicle] {
        &self.vehicles
    }

    pub fn list_active(&self) -> Vec<&SimEmergencyVehicle> {
        self.vehicles.iter().filter(|v| v.active).collect()
    }

    /// The active vehicle closest to arrival
    pub fn next_arrival(&self) -> Option<&SimEmergencyVehicle> {
        next_arrival(&self.vehicles)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

/// The active vehicle with the smallest ETA, ties broken by list order
pub fn next_arrival(vehicles: &[SimEmergencyVehicle]) -> Option<&SimEmergencyVehicle> {
    vehicles
        .iter()
        .filter(|v| v.active)
        .min_by_key(|v| OrderedFloat(v.eta))
}
