//! Core data models for the airspace engine.

use serde::{Deserialize, Serialize};

use crate::graph::NodeId;

/// Fuel percentage below which a flight is escalated to [`Priority::High`].
pub const LOW_FUEL_THRESHOLD: f64 = 10.0;

/// Landing urgency. Lower value = more urgent, so the derived ordering puts
/// `Critical` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Medical emergency, engine failure, hijack
    Critical = 1,
    /// Low fuel
    High = 2,
    /// Commercial passenger flight
    Medium = 3,
    /// Cargo / private
    Low = 4,
}

impl Priority {
    /// Integer code used in persisted records.
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Critical),
            2 => Some(Self::High),
            3 => Some(Self::Medium),
            4 => Some(Self::Low),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AircraftType {
    Commercial = 0,
    Cargo = 1,
    Private = 2,
    Emergency = 3,
}

impl AircraftType {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Commercial),
            1 => Some(Self::Cargo),
            2 => Some(Self::Private),
            3 => Some(Self::Emergency),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Commercial => "Commercial",
            Self::Cargo => "Cargo",
            Self::Private => "Private",
            Self::Emergency => "Emergency",
        }
    }

    /// Priority a newly created flight of this type starts with.
    pub fn default_priority(self) -> Priority {
        match self {
            Self::Commercial => Priority::Medium,
            Self::Cargo | Self::Private => Priority::Low,
            Self::Emergency => Priority::Critical,
        }
    }
}

/// Cell on the radar grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// True when both axes are within `0..size`.
    pub fn in_bounds(&self, size: i32) -> bool {
        (0..size).contains(&self.x) && (0..size).contains(&self.y)
    }
}

/// An aircraft tracked by the system.
///
/// The flight id is fixed at construction. Fuel is clamped to `[0, 100]` on
/// every mutation, and dropping below [`LOW_FUEL_THRESHOLD`] escalates any
/// non-critical priority to [`Priority::High`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aircraft {
    flight_id: String,
    pub model: String,
    pub origin: String,
    pub destination: String,
    fuel: f64,
    priority: Priority,
    pub aircraft_type: AircraftType,
    pub position: GridPosition,
    /// Node currently occupied, `None` when not placed.
    pub node_id: Option<NodeId>,
    pub landed: bool,
    pub crashed: bool,
    /// Logical arrival order, assigned at landing (0 until then).
    pub arrival_timestamp: u64,
}

impl Aircraft {
    pub fn new(
        flight_id: impl Into<String>,
        model: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
        fuel: f64,
        priority: Priority,
        aircraft_type: AircraftType,
    ) -> Self {
        let mut aircraft = Self {
            flight_id: flight_id.into(),
            model: model.into(),
            origin: origin.into(),
            destination: destination.into(),
            fuel: 0.0,
            priority,
            aircraft_type,
            position: GridPosition::default(),
            node_id: None,
            landed: false,
            crashed: false,
            arrival_timestamp: 0,
        };
        aircraft.set_fuel(fuel);
        aircraft
    }

    pub fn flight_id(&self) -> &str {
        &self.flight_id
    }

    pub fn fuel(&self) -> f64 {
        self.fuel
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Set the fuel level, clamping and applying the low-fuel rule.
    pub fn set_fuel(&mut self, fuel: f64) {
        // NaN would poison every comparison below; treat it as empty.
        let fuel = if fuel.is_nan() { 0.0 } else { fuel };
        self.fuel = fuel.clamp(0.0, 100.0);
        if self.fuel < LOW_FUEL_THRESHOLD && self.priority != Priority::Critical {
            self.priority = Priority::High;
        }
    }

    /// Adjust fuel by `delta` (negative to burn).
    pub fn update_fuel(&mut self, delta: f64) {
        self.set_fuel(self.fuel + delta);
    }

    pub fn declare_emergency(&mut self) {
        self.priority = Priority::Critical;
    }

    pub fn needs_emergency_landing(&self) -> bool {
        self.priority == Priority::Critical || self.fuel < LOW_FUEL_THRESHOLD
    }

    pub fn is_placed(&self) -> bool {
        self.node_id.is_some()
    }

    /// Human readable status used in reports.
    pub fn status_label(&self) -> &'static str {
        if self.crashed {
            "CRASHED"
        } else if self.landed {
            "LANDED"
        } else {
            "IN FLIGHT"
        }
    }
}

/// Parameters for creating a new flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightRequest {
    pub flight_id: String,
    pub model: String,
    pub origin: String,
    pub destination: String,
    pub fuel: f64,
    pub aircraft_type: AircraftType,
}

impl FlightRequest {
    /// Build the aircraft, deriving its starting priority from the type.
    pub fn into_aircraft(self) -> Aircraft {
        let priority = self.aircraft_type.default_priority();
        Aircraft::new(
            self.flight_id,
            self.model,
            self.origin,
            self.destination,
            self.fuel,
            priority,
            self.aircraft_type,
        )
    }
}
