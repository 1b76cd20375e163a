//! Traffic controller: owns every component and keeps them consistent.
//!
//! Each operation validates against all affected components before it
//! mutates any of them, so a failed call leaves the controller unchanged.

use crate::error::{AirspaceError, AirspaceResult};
use crate::graph::{AirspaceGraph, NodeId, Route};
use crate::history::{FlightHistory, HistoryEntry};
use crate::models::{Aircraft, FlightRequest, Priority};
use crate::persistence;
use crate::registry::FlightRegistry;
use crate::rules::AirspaceLimits;
use crate::scheduler::{LandingScheduler, QueueEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Airports seeded into the default airspace.
const DEFAULT_AIRPORTS: [(&str, i32, i32); 5] = [
    ("JFK", 2, 2),
    ("LHR", 17, 17),
    ("DXB", 10, 3),
    ("NRT", 18, 5),
    ("CDG", 5, 15),
];

const DEFAULT_WAYPOINTS: [(&str, i32, i32); 5] = [
    ("WP1", 5, 5),
    ("WP2", 10, 10),
    ("WP3", 15, 8),
    ("WP4", 8, 15),
    ("WP5", 12, 12),
];

const DEFAULT_CORRIDORS: [(&str, &str, f64); 11] = [
    ("JFK", "WP1", 50.0),
    ("WP1", "WP2", 75.0),
    ("WP2", "LHR", 60.0),
    ("JFK", "DXB", 120.0),
    ("DXB", "WP3", 40.0),
    ("WP3", "NRT", 80.0),
    ("CDG", "WP4", 45.0),
    ("WP4", "WP5", 55.0),
    ("WP5", "LHR", 35.0),
    ("WP1", "WP4", 90.0),
    ("WP2", "WP5", 70.0),
];

/// Populate `graph` with the standard five airports, five waypoints and
/// their two-way corridors.
pub fn seed_default_airspace(graph: &mut AirspaceGraph) -> AirspaceResult<()> {
    for (name, x, y) in DEFAULT_AIRPORTS {
        graph.add_node(name, true, x, y)?;
    }
    for (name, x, y) in DEFAULT_WAYPOINTS {
        graph.add_node(name, false, x, y)?;
    }

    let mut corridors = Vec::with_capacity(DEFAULT_CORRIDORS.len());
    for (from, to, weight) in DEFAULT_CORRIDORS {
        let a = graph
            .find_node_by_name(from)
            .ok_or_else(|| missing_default_node(from))?;
        let b = graph
            .find_node_by_name(to)
            .ok_or_else(|| missing_default_node(to))?;
        corridors.push((a, b, weight));
    }
    // Forward corridors first, then the return legs.
    for &(a, b, weight) in &corridors {
        graph.add_edge(a, b, weight);
    }
    for &(a, b, weight) in &corridors {
        graph.add_edge(b, a, weight);
    }
    Ok(())
}

fn missing_default_node(name: &str) -> AirspaceError {
    AirspaceError::InvalidField {
        field: "default airspace node",
        value: name.to_string(),
    }
}

/// Result of landing the most urgent flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingReport {
    pub flight_id: String,
    pub priority: Priority,
    pub timestamp: u64,
    /// Node the aircraft occupied before it landed.
    pub vacated_node: Option<NodeId>,
}

/// Result of a successful move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveReport {
    pub flight_id: String,
    pub from: NodeId,
    pub to: NodeId,
    pub route: Route,
    pub fuel: f64,
    /// Set when the fuel burn pushed the flight to [`Priority::High`].
    pub escalated: bool,
}

/// Counts restored by [`TrafficController::load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub flights: usize,
    pub in_flight: usize,
    pub history: usize,
    pub reconstructed: usize,
}

#[derive(Debug, Clone)]
pub struct TrafficController {
    limits: AirspaceLimits,
    graph: AirspaceGraph,
    scheduler: LandingScheduler,
    registry: FlightRegistry,
    history: FlightHistory,
    next_timestamp: u64,
}

impl Default for TrafficController {
    fn default() -> Self {
        Self::new(AirspaceLimits::default())
    }
}

impl TrafficController {
    /// Controller with an empty airspace.
    pub fn new(limits: AirspaceLimits) -> Self {
        Self {
            graph: AirspaceGraph::from_limits(&limits),
            scheduler: LandingScheduler::new(limits.queue_capacity),
            registry: FlightRegistry::new(limits.registry_buckets),
            history: FlightHistory::new(),
            next_timestamp: 1,
            limits,
        }
    }

    /// Controller over a custom airspace. Any occupancy already recorded
    /// in `graph` is cleared, since no registered flight backs it.
    pub fn with_graph(limits: AirspaceLimits, mut graph: AirspaceGraph) -> Self {
        graph.clear_occupancy();
        let mut controller = Self::new(limits);
        controller.graph = graph;
        controller
    }

    /// Controller seeded with the standard airspace.
    pub fn with_default_airspace(limits: AirspaceLimits) -> AirspaceResult<Self> {
        let mut controller = Self::new(limits);
        seed_default_airspace(&mut controller.graph)?;
        Ok(controller)
    }

    pub fn limits(&self) -> &AirspaceLimits {
        &self.limits
    }

    pub fn graph(&self) -> &AirspaceGraph {
        &self.graph
    }

    pub fn scheduler(&self) -> &LandingScheduler {
        &self.scheduler
    }

    pub fn registry(&self) -> &FlightRegistry {
        &self.registry
    }

    pub fn history(&self) -> &FlightHistory {
        &self.history
    }

    /// Timestamp the next landing will receive.
    pub fn next_timestamp(&self) -> u64 {
        self.next_timestamp
    }

    /// Register a new flight and place it at the first free node.
    pub fn add_flight(&mut self, request: FlightRequest) -> AirspaceResult<NodeId> {
        validate_request(&request)?;
        if self.registry.contains(&request.flight_id) {
            return Err(AirspaceError::DuplicateKey(request.flight_id));
        }
        if self.scheduler.is_full() {
            return Err(AirspaceError::CapacityExceeded {
                what: "landing queue",
                capacity: self.scheduler.capacity(),
            });
        }
        let node = self
            .graph
            .first_free_node()
            .ok_or(AirspaceError::CapacityExceeded {
                what: "airspace",
                capacity: self.graph.node_count(),
            })?;

        let mut aircraft = request.into_aircraft();
        self.graph.place_aircraft(node, &mut aircraft)?;
        let flight_id = aircraft.flight_id().to_string();
        let priority = aircraft.priority();
        self.scheduler.insert(flight_id.clone(), priority)?;
        self.registry.insert(aircraft)?;

        tracing::info!(%flight_id, node, priority = priority.label(), "flight added");
        Ok(node)
    }

    /// Escalate a flight to [`Priority::Critical`].
    pub fn declare_emergency(&mut self, flight_id: &str) -> AirspaceResult<()> {
        let aircraft = self
            .registry
            .search_mut(flight_id)
            .ok_or_else(|| AirspaceError::FlightNotFound(flight_id.to_string()))?;
        if aircraft.landed {
            return Err(AirspaceError::AlreadyLanded(flight_id.to_string()));
        }
        aircraft.declare_emergency();
        if self.scheduler.contains(flight_id) {
            self.scheduler.update_priority(flight_id, Priority::Critical)?;
        }
        tracing::warn!(flight_id, "emergency declared");
        Ok(())
    }

    /// Land the most urgent flight. `Ok(None)` when nothing is waiting.
    pub fn land_next(&mut self) -> AirspaceResult<Option<LandingReport>> {
        let Some(next) = self.scheduler.peek() else {
            return Ok(None);
        };
        let flight_id = next.flight_id.clone();
        if !self.registry.contains(&flight_id) {
            return Err(AirspaceError::FlightNotFound(flight_id));
        }

        let Some(entry) = self.scheduler.extract_min() else {
            return Ok(None);
        };
        let timestamp = self.next_timestamp;
        let Some(aircraft) = self.registry.search_mut(&flight_id) else {
            return Err(AirspaceError::FlightNotFound(flight_id));
        };

        let vacated_node = aircraft.node_id.take();
        if let Some(node) = vacated_node {
            // Only clear the node if it still holds this flight.
            if self.graph.occupant(node) == Some(flight_id.as_str()) {
                self.graph.remove_aircraft(node)?;
            } else {
                tracing::warn!(%flight_id, node, "landing flight was not at its recorded node");
            }
        }
        aircraft.landed = true;
        aircraft.arrival_timestamp = timestamp;
        self.next_timestamp += 1;
        self.history.insert(flight_id.clone(), timestamp);

        tracing::info!(%flight_id, timestamp, priority = entry.priority.label(), "flight landed");
        Ok(Some(LandingReport {
            flight_id,
            priority: entry.priority,
            timestamp,
            vacated_node,
        }))
    }

    pub fn search(&self, flight_id: &str) -> AirspaceResult<&Aircraft> {
        self.registry
            .search(flight_id)
            .ok_or_else(|| AirspaceError::FlightNotFound(flight_id.to_string()))
    }

    /// Landed flights in chronological order, resolved through the registry.
    pub fn flight_log(&self) -> Vec<(&HistoryEntry, &Aircraft)> {
        self.history
            .iter()
            .filter_map(|entry| {
                let aircraft = self.registry.search(&entry.flight_id);
                if aircraft.is_none() {
                    tracing::warn!(flight_id = %entry.flight_id, "history entry without registry record");
                }
                aircraft.map(|aircraft| (entry, aircraft))
            })
            .collect()
    }

    /// Waiting flights with their aircraft, most urgent first.
    pub fn landing_queue(&self) -> Vec<(&QueueEntry, &Aircraft)> {
        let mut queue: Vec<(&QueueEntry, &Aircraft)> = self
            .scheduler
            .entries()
            .iter()
            .filter_map(|entry| self.registry.search(&entry.flight_id).map(|a| (entry, a)))
            .collect();
        queue.sort_by(|(a, _), (b, _)| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.flight_id.cmp(&b.flight_id))
        });
        queue
    }

    /// Shortest route from the flight's node to the nearest airport.
    pub fn find_safe_route(&self, flight_id: &str) -> AirspaceResult<Route> {
        let aircraft = self.search(flight_id)?;
        if aircraft.landed {
            return Err(AirspaceError::AlreadyLanded(flight_id.to_string()));
        }
        let node = aircraft
            .node_id
            .ok_or_else(|| AirspaceError::NotPlaced(flight_id.to_string()))?;
        self.graph
            .find_shortest_path_to_nearest_airport(node)
            .ok_or(AirspaceError::NoPathFound)
    }

    pub fn route_between(&self, from: NodeId, to: NodeId) -> AirspaceResult<Route> {
        for id in [from, to] {
            if !self.graph.node_exists(id) {
                return Err(AirspaceError::NodeNotFound(id));
            }
        }
        self.graph
            .find_shortest_path(from, to)
            .ok_or(AirspaceError::NoPathFound)
    }

    /// Move a flight to `target`, burning fuel for the hop.
    ///
    /// Rejected when the flight has landed or is not placed, when `target`
    /// is occupied, or when no corridor path connects the two nodes.
    pub fn move_aircraft(&mut self, flight_id: &str, target: NodeId) -> AirspaceResult<MoveReport> {
        let aircraft = self.search(flight_id)?;
        if aircraft.landed {
            return Err(AirspaceError::AlreadyLanded(flight_id.to_string()));
        }
        let from = aircraft
            .node_id
            .ok_or_else(|| AirspaceError::NotPlaced(flight_id.to_string()))?;
        if !self.graph.node_exists(target) {
            return Err(AirspaceError::NodeNotFound(target));
        }
        if let Some(occupant) = self.graph.occupant(target) {
            tracing::warn!(flight_id, target, occupant, "collision alert, move rejected");
            return Err(AirspaceError::OccupiedNode {
                node: target,
                occupant: occupant.to_string(),
            });
        }
        let route = self
            .graph
            .find_shortest_path(from, target)
            .ok_or(AirspaceError::NoPathFound)?;

        let Some(aircraft) = self.registry.search_mut(flight_id) else {
            return Err(AirspaceError::FlightNotFound(flight_id.to_string()));
        };
        self.graph.move_aircraft(from, target, aircraft)?;

        let before = aircraft.priority();
        aircraft.update_fuel(-self.limits.fuel_per_move);
        let after = aircraft.priority();
        let fuel = aircraft.fuel();
        let escalated = after != before;
        if escalated && self.scheduler.contains(flight_id) {
            self.scheduler.update_priority(flight_id, after)?;
        }
        if escalated {
            tracing::warn!(flight_id, fuel, "low fuel, priority raised to HIGH");
        }
        tracing::info!(flight_id, from, to = target, distance = route.total_distance, "aircraft moved");

        Ok(MoveReport {
            flight_id: flight_id.to_string(),
            from,
            to: target,
            route,
            fuel,
            escalated,
        })
    }

    /// Write the registry and history files. Both are staged first and only
    /// published once both were written.
    ///
    /// The two renames are not atomic as a pair: if the history rename
    /// fails, the new registry file is already in place next to the old
    /// history file.
    pub fn save(&self, registry_path: &Path, history_path: &Path) -> AirspaceResult<()> {
        let mut records = Vec::with_capacity(self.history.len());
        for entry in &self.history {
            let aircraft = self
                .registry
                .search(&entry.flight_id)
                .ok_or_else(|| AirspaceError::FlightNotFound(entry.flight_id.clone()))?;
            records.push((aircraft, entry.timestamp));
        }

        let registry_stage = persistence::stage_file(registry_path, |out| {
            persistence::write_registry(out, self.registry.iter().collect::<Vec<_>>().into_iter())
        })?;
        let history_stage = match persistence::stage_file(history_path, |out| {
            persistence::write_history(out, &records)
        }) {
            Ok(staged) => staged,
            Err(err) => {
                persistence::discard_staged(&registry_stage);
                return Err(err);
            }
        };

        if let Err(err) = persistence::commit_staged(&registry_stage, registry_path) {
            persistence::discard_staged(&registry_stage);
            persistence::discard_staged(&history_stage);
            return Err(err);
        }
        if let Err(err) = persistence::commit_staged(&history_stage, history_path) {
            persistence::discard_staged(&history_stage);
            tracing::warn!(history = %history_path.display(), "registry saved but history file was not replaced");
            return Err(err);
        }

        tracing::info!(
            flights = self.registry.len(),
            history = records.len(),
            registry = %registry_path.display(),
            "state saved"
        );
        Ok(())
    }

    /// Replace the current flights with the saved state.
    ///
    /// Both files are parsed and validated before anything changes; on
    /// error the controller keeps its previous state. The airspace itself
    /// (nodes and corridors) is not persisted and stays as configured.
    pub fn load(&mut self, registry_path: &Path, history_path: &Path) -> AirspaceResult<LoadSummary> {
        let saved = persistence::read_registry_file(registry_path)?;
        let logged = persistence::read_history_file(history_path)?;
        let summary = self.restore(saved, logged)?;
        tracing::info!(
            flights = summary.flights,
            in_flight = summary.in_flight,
            history = summary.history,
            "state loaded"
        );
        Ok(summary)
    }

    /// Rebuild every component from parsed records, committing only on success.
    pub fn restore(
        &mut self,
        saved: Vec<Aircraft>,
        logged: Vec<(Aircraft, u64)>,
    ) -> AirspaceResult<LoadSummary> {
        let mut graph = self.graph.clone();
        graph.clear_occupancy();
        let mut scheduler = LandingScheduler::new(self.limits.queue_capacity);
        let mut registry = FlightRegistry::new(self.limits.registry_buckets);
        let mut history = FlightHistory::new();
        let mut summary = LoadSummary::default();
        let mut max_timestamp = 0;

        let mut seen = HashSet::new();
        for aircraft in &saved {
            if !seen.insert(aircraft.flight_id()) {
                return Err(AirspaceError::DuplicateKey(aircraft.flight_id().to_string()));
            }
        }

        for mut aircraft in saved {
            max_timestamp = max_timestamp.max(aircraft.arrival_timestamp);
            if aircraft.landed {
                aircraft.node_id = None;
            } else {
                let saved_node = aircraft.node_id.take();
                let node = saved_node
                    .filter(|&id| graph.node_exists(id) && !graph.is_occupied(id))
                    .or_else(|| graph.first_free_node());
                match node {
                    Some(node) => {
                        if saved_node != Some(node) {
                            tracing::warn!(
                                flight_id = aircraft.flight_id(),
                                saved = ?saved_node,
                                node,
                                "saved node unavailable, aircraft re-placed"
                            );
                        }
                        graph.place_aircraft(node, &mut aircraft)?;
                    }
                    None => {
                        tracing::warn!(flight_id = aircraft.flight_id(), "no free node, aircraft left unplaced");
                    }
                }
                scheduler.insert(aircraft.flight_id().to_string(), aircraft.priority())?;
                summary.in_flight += 1;
            }
            registry.insert(aircraft)?;
        }

        for (aircraft, timestamp) in logged {
            max_timestamp = max_timestamp.max(timestamp);
            let flight_id = aircraft.flight_id().to_string();
            if !registry.contains(&flight_id) {
                registry.insert(aircraft)?;
                summary.reconstructed += 1;
            } else if scheduler.contains(&flight_id) {
                return Err(AirspaceError::Parse {
                    line: 0,
                    message: format!("flight {flight_id} is both queued and in the history"),
                });
            }
            history.insert(flight_id, timestamp);
        }

        summary.flights = registry.len();
        summary.history = history.len();

        self.graph = graph;
        self.scheduler = scheduler;
        self.registry = registry;
        self.history = history;
        self.next_timestamp = max_timestamp + 1;
        Ok(summary)
    }
}

fn validate_request(request: &FlightRequest) -> AirspaceResult<()> {
    if request.flight_id.trim().is_empty() {
        return Err(AirspaceError::InvalidField {
            field: "flight id",
            value: request.flight_id.clone(),
        });
    }
    let fields = [
        ("flight id", &request.flight_id),
        ("model", &request.model),
        ("origin", &request.origin),
        ("destination", &request.destination),
    ];
    for (field, value) in fields {
        if !persistence::is_storable(value) {
            return Err(AirspaceError::InvalidField {
                field,
                value: value.clone(),
            });
        }
    }
    if request.fuel.is_nan() {
        return Err(AirspaceError::InvalidField {
            field: "fuel",
            value: request.fuel.to_string(),
        });
    }
    Ok(())
}
