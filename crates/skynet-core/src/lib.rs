pub mod controller;
pub mod error;
pub mod graph;
pub mod history;
pub mod models;
pub mod persistence;
pub mod registry;
pub mod rules;
pub mod scheduler;

pub use controller::{seed_default_airspace, LandingReport, LoadSummary, MoveReport, TrafficController};
pub use error::{AirspaceError, AirspaceResult};
pub use graph::{AirspaceGraph, Edge, GraphNode, NodeId, Route};
pub use history::{FlightHistory, HistoryEntry};
pub use models::{Aircraft, AircraftType, FlightRequest, GridPosition, Priority, LOW_FUEL_THRESHOLD};
pub use registry::{FlightRegistry, FnvHasher};
pub use rules::AirspaceLimits;
pub use scheduler::{LandingScheduler, QueueEntry};
