//! External commands and the queue that serializes them
//!
//! Commands are never applied in place. They are validated on submission,
//! queued, and drained in arrival order at the start of the next tick.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use super::error::{EngineError, EngineResult};
use super::types::{GeoPoint, LightState, SignalId, VehicleId};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetManualState { signal: SignalId, state: LightState },
    SetEmergencyOverride { signal: SignalId, enabled: bool },
    SetVehicleActive { vehicle: VehicleId, active: bool },
    Dispatch { vehicle: VehicleId, destination: GeoPoint },
}

impl Command {
    /// Check the payload without looking up any entity
    pub fn validate(&self) -> EngineResult<()> {
        match self {
            Command::Dispatch { destination, .. } => check_destination(*destination),
            _ => Ok(()),
        }
    }
}

/// A dispatch destination must be a finite point on the globe
pub fn check_destination(destination: GeoPoint) -> EngineResult<()> {
    let GeoPoint { lat, lng } = destination;
    if !lat.is_finite() || !lng.is_finite() {
        return Err(EngineError::InvalidCommand(format!(
            "destination ({}, {}) is not a finite point",
            lat, lng
        )));
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(EngineError::InvalidCommand(format!(
            "destination ({}, {}) out of range",
            lat, lng
        )));
    }
    Ok(())
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on_off = |b: bool| if b { "on" } else { "off" };
        match self {
            Command::SetManualState { signal, state } => write!(f, "manual {} {}", signal, state),
            Command::SetEmergencyOverride { signal, enabled } => {
                write!(f, "override {} {}", signal, on_off(*enabled))
            }
            Command::SetVehicleActive { vehicle, active } => {
                write!(f, "vehicle {} {}", vehicle, on_off(*active))
            }
            Command::Dispatch {
                vehicle,
                destination,
            } => write!(f, "dispatch {} {} {}", vehicle, destination.lat, destination.lng),
        }
    }
}

fn parse_switch(value: &str) -> Result<bool, EngineError> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "enable" | "1" => Ok(true),
        "off" | "false" | "disable" | "0" => Ok(false),
        other => Err(EngineError::InvalidCommand(format!(
            "expected on/off, got {:?}",
            other
        ))),
    }
}

fn parse_coordinate(value: &str, what: &str) -> Result<f64, EngineError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EngineError::InvalidCommand(format!("invalid {}: {:?}", what, value)))
}

/// Parses the text form used by the console and the headless runner:
///
/// ```text
/// manual <signal> <red|yellow|green>
/// override <signal> <on|off>
/// vehicle <vehicle> <on|off>
/// dispatch <vehicle> <lat> <lng>
/// ```
impl FromStr for Command {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            ["manual", signal, state] => Ok(Command::SetManualState {
                signal: SignalId::new(*signal),
                state: state.parse()?,
            }),
            ["override", signal, enabled] => Ok(Command::SetEmergencyOverride {
                signal: SignalId::new(*signal),
                enabled: parse_switch(enabled)?,
            }),
            ["vehicle", vehicle, active] => Ok(Command::SetVehicleActive {
                vehicle: VehicleId::new(*vehicle),
                active: parse_switch(active)?,
            }),
            ["dispatch", vehicle, lat, lng] => {
                let lat = parse_coordinate(lat, "latitude")?;
                let lng = parse_coordinate(lng, "longitude")?;
                let destination = GeoPoint::new(lat, lng);
                check_destination(destination)?;
                Ok(Command::Dispatch {
                    vehicle: VehicleId::new(*vehicle),
                    destination,
                })
            }
            [] => Err(EngineError::InvalidCommand("empty command".to_string())),
            [verb, ..] => Err(EngineError::InvalidCommand(format!(
                "unrecognised command {:?} with {} argument(s)",
                verb,
                parts.len() - 1
            ))),
        }
    }
}

/// FIFO of accepted commands shared between submitters and the clock
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<VecDeque<Command>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: Command) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(command);
    }

    /// Take every queued command in arrival order
    pub fn drain(&self) -> Vec<Command> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
