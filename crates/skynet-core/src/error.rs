//! Error type shared by every airspace component.

use crate::graph::NodeId;

/// Failures reported by the airspace engine.
///
/// Every fallible operation validates before it mutates, so an `Err` always
/// leaves the component exactly as it was.
#[derive(Debug, thiserror::Error)]
pub enum AirspaceError {
    #[error("flight {0} not found")]
    FlightNotFound(String),
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),
    #[error("{what} is full (capacity {capacity})")]
    CapacityExceeded { what: &'static str, capacity: usize },
    #[error("node {node} is occupied by {occupant}")]
    OccupiedNode { node: NodeId, occupant: String },
    #[error("no path found")]
    NoPathFound,
    #[error("flight {0} already exists")]
    DuplicateKey(String),
    #[error("flight {0} has already landed")]
    AlreadyLanded(String),
    #[error("flight {0} is not placed in the airspace")]
    NotPlaced(String),
    #[error("grid position ({x}, {y}) is outside the {size}x{size} grid")]
    OutOfBounds { x: i32, y: i32, size: i32 },
    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid record at line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl AirspaceError {
    /// True for the two IO-failure kinds (unreadable/unwritable or malformed file).
    pub fn is_io_failure(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Parse { .. })
    }
}

pub type AirspaceResult<T> = Result<T, AirspaceError>;
