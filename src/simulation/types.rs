//! Core types for the signal simulation
//!
//! Identifiers, enumerations and geographic points shared by every component.

use std::fmt;
use std::str::FromStr;

use super::error::EngineError;

/// A stable identifier for a signal fixture
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(pub String);

/// A stable identifier for an emergency vehicle
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub String);

impl SignalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SignalId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for VehicleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The lamp currently lit on a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightState {
    Red,
    Yellow,
    Green,
}

impl LightState {
    pub const ALL: [LightState; 3] = [LightState::Red, LightState::Yellow, LightState::Green];

    pub fn as_str(&self) -> &'static str {
        match self {
            LightState::Red => "red",
            LightState::Yellow => "yellow",
            LightState::Green => "green",
        }
    }
}

impl fmt::Display for LightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LightState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(LightState::Red),
            "yellow" => Ok(LightState::Yellow),
            "green" => Ok(LightState::Green),
            _ => Err(EngineError::InvalidState(s.to_string())),
        }
    }
}

/// Scheduling priority of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignalPriority {
    #[default]
    Normal,
    High,
    Emergency,
}

impl fmt::Display for SignalPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignalPriority::Normal => "normal",
            SignalPriority::High => "high",
            SignalPriority::Emergency => "emergency",
        })
    }
}

/// Kind of emergency vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmergencyVehicleType {
    Ambulance,
    Fire,
    Police,
}

impl fmt::Display for EmergencyVehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EmergencyVehicleType::Ambulance => "ambulance",
            EmergencyVehicleType::Fire => "fire",
            EmergencyVehicleType::Police => "police",
        })
    }
}

/// Approach direction of a flow sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        })
    }
}

/// Congestion classification of a flow sample or direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CongestionLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CongestionLevel::Low => "low",
            CongestionLevel::Medium => "medium",
            CongestionLevel::High => "high",
        })
    }
}

/// A geographic point. The engine never interprets it beyond distance estimates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Haversine great-circle distance in kilometres
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6_371.0;

        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng * 0.5).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lng)
    }
}

/// Lower bound of a freshly drawn phase duration in seconds
pub const MIN_PHASE_SECS: f32 = 10.0;

/// Exclusive upper bound of a freshly drawn phase duration in seconds
pub const MAX_PHASE_SECS: f32 = 70.0;

/// Largest per-tick traffic density perturbation in either direction
pub const DENSITY_DRIFT: f32 = 5.0;

/// Upper bound of a signal's traffic density
pub const MAX_DENSITY: f32 = 100.0;

/// Nominal full-cycle duration reported for signals that don't specify one
pub const DEFAULT_CYCLE_TIME: f32 = 120.0;
