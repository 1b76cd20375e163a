//! Airspace graph: airports and waypoints joined by directed corridors.
//!
//! Each node holds at most one aircraft. Occupants are recorded by flight id;
//! the aircraft itself stays owned by the registry.

use crate::error::{AirspaceError, AirspaceResult};
use crate::models::{Aircraft, GridPosition};
use crate::rules::AirspaceLimits;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Dense node index, assigned from 0 in insertion order.
pub type NodeId = usize;

/// Directed corridor to `to`. The source is the node owning the edge list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub to: NodeId,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub name: String,
    pub is_airport: bool,
    pub position: GridPosition,
    occupant: Option<String>,
    edges: Vec<Edge>,
}

impl GraphNode {
    /// Flight id of the aircraft at this node, if any.
    pub fn occupant(&self) -> Option<&str> {
        self.occupant.as_deref()
    }

    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }

    /// Outgoing corridors in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }
}

/// Result of a shortest-path query: node sequence from start to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub nodes: Vec<NodeId>,
    pub total_distance: f64,
}

impl Route {
    pub fn start(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    pub fn end(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    /// Number of corridors flown.
    pub fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Frontier entry. Ordered by distance, then node id, so the heap always
/// yields the closest node and breaks ties toward the lowest id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Frontier {
    distance: FloatOrd,
    node: NodeId,
}

/// Fixed-capacity airspace graph.
#[derive(Debug, Clone)]
pub struct AirspaceGraph {
    nodes: Vec<GraphNode>,
    capacity: usize,
    grid_size: i32,
}

impl Default for AirspaceGraph {
    fn default() -> Self {
        Self::from_limits(&AirspaceLimits::default())
    }
}

impl AirspaceGraph {
    pub fn new(capacity: usize, grid_size: i32) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            capacity,
            grid_size,
        }
    }

    pub fn from_limits(limits: &AirspaceLimits) -> Self {
        Self::new(limits.node_capacity, limits.grid_size)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn grid_size(&self) -> i32 {
        self.grid_size
    }

    /// Add an airport or waypoint and return its id.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        is_airport: bool,
        x: i32,
        y: i32,
    ) -> AirspaceResult<NodeId> {
        if self.nodes.len() >= self.capacity {
            return Err(AirspaceError::CapacityExceeded {
                what: "airspace graph",
                capacity: self.capacity,
            });
        }
        let position = GridPosition::new(x, y);
        if !position.in_bounds(self.grid_size) {
            return Err(AirspaceError::OutOfBounds {
                x,
                y,
                size: self.grid_size,
            });
        }

        let id = self.nodes.len();
        self.nodes.push(GraphNode {
            id,
            name: name.into(),
            is_airport,
            position,
            occupant: None,
            edges: Vec::new(),
        });
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    pub fn node_exists(&self, id: NodeId) -> bool {
        id < self.nodes.len()
    }

    pub fn find_node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|node| node.name.eq_ignore_ascii_case(name))
            .map(|node| node.id)
    }

    /// Ids of every node flagged as an airport, ascending.
    pub fn airports(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|node| node.is_airport)
            .map(|node| node.id)
    }

    /// Outgoing corridors of `id`; empty for an unknown node.
    pub fn edges(&self, id: NodeId) -> &[Edge] {
        self.nodes.get(id).map(|node| node.edges()).unwrap_or(&[])
    }

    /// Add a directed corridor. Returns false (and changes nothing) when
    /// either endpoint is unknown or the weight is negative or NaN.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, weight: f64) -> bool {
        if !self.node_exists(from) || !self.node_exists(to) {
            return false;
        }
        if weight.is_nan() || weight < 0.0 {
            tracing::warn!(from, to, weight, "rejecting corridor with negative weight");
            return false;
        }
        self.nodes[from].edges.push(Edge { to, weight });
        true
    }

    /// Add corridors in both directions with the same weight.
    pub fn add_bidirectional_edge(&mut self, a: NodeId, b: NodeId, weight: f64) -> bool {
        if !self.add_edge(a, b, weight) {
            return false;
        }
        self.add_edge(b, a, weight)
    }

    /// Remove the most recently added corridor `from -> to`.
    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        let Some(node) = self.nodes.get_mut(from) else {
            return false;
        };
        match node.edges.iter().rposition(|edge| edge.to == to) {
            Some(idx) => {
                node.edges.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn is_occupied(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(GraphNode::is_occupied)
    }

    pub fn occupant(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id).and_then(GraphNode::occupant)
    }

    /// Lowest-id node without an occupant.
    pub fn first_free_node(&self) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|node| !node.is_occupied())
            .map(|node| node.id)
    }

    /// Bind `aircraft` to `id` and snap its position to the node.
    pub fn place_aircraft(&mut self, id: NodeId, aircraft: &mut Aircraft) -> AirspaceResult<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or(AirspaceError::NodeNotFound(id))?;
        if let Some(occupant) = &node.occupant {
            return Err(AirspaceError::OccupiedNode {
                node: id,
                occupant: occupant.clone(),
            });
        }

        node.occupant = Some(aircraft.flight_id().to_string());
        aircraft.node_id = Some(id);
        aircraft.position = node.position;
        tracing::debug!(flight_id = aircraft.flight_id(), node = id, "aircraft placed");
        Ok(())
    }

    /// Clear occupancy of `id`, returning the previous occupant.
    pub fn remove_aircraft(&mut self, id: NodeId) -> AirspaceResult<Option<String>> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or(AirspaceError::NodeNotFound(id))?;
        Ok(node.occupant.take())
    }

    /// Empty every node, keeping nodes and corridors.
    pub fn clear_occupancy(&mut self) {
        for node in &mut self.nodes {
            node.occupant = None;
        }
    }

    /// Relocate `aircraft` from `from` to `to` in a single step.
    ///
    /// Fails without touching either node unless `from` holds this aircraft
    /// and `to` is a free node.
    pub fn move_aircraft(
        &mut self,
        from: NodeId,
        to: NodeId,
        aircraft: &mut Aircraft,
    ) -> AirspaceResult<()> {
        let holds_aircraft = self
            .node(from)
            .ok_or(AirspaceError::NodeNotFound(from))?
            .occupant()
            == Some(aircraft.flight_id());
        if !holds_aircraft {
            return Err(AirspaceError::NotPlaced(aircraft.flight_id().to_string()));
        }
        let target = self.node(to).ok_or(AirspaceError::NodeNotFound(to))?;
        if let Some(occupant) = target.occupant() {
            return Err(AirspaceError::OccupiedNode {
                node: to,
                occupant: occupant.to_string(),
            });
        }

        self.nodes[from].occupant = None;
        self.place_aircraft(to, aircraft)
    }

    /// Dijkstra's shortest path from `start` to `end`.
    ///
    /// Returns `None` when either endpoint is unknown or `end` is unreachable.
    pub fn find_shortest_path(&self, start: NodeId, end: NodeId) -> Option<Route> {
        if !self.node_exists(start) || !self.node_exists(end) {
            return None;
        }

        let count = self.nodes.len();
        let mut distances = vec![f64::INFINITY; count];
        let mut previous: Vec<Option<NodeId>> = vec![None; count];
        let mut visited = vec![false; count];
        let mut frontier = BinaryHeap::new();

        distances[start] = 0.0;
        frontier.push(Reverse(Frontier {
            distance: FloatOrd(0.0),
            node: start,
        }));

        while let Some(Reverse(current)) = frontier.pop() {
            let u = current.node;
            if visited[u] || current.distance.0 > distances[u] {
                continue;
            }
            if u == end {
                break;
            }
            visited[u] = true;

            for edge in &self.nodes[u].edges {
                let v = edge.to;
                if visited[v] {
                    continue;
                }
                let candidate = distances[u] + edge.weight;
                if candidate < distances[v] {
                    distances[v] = candidate;
                    previous[v] = Some(u);
                    frontier.push(Reverse(Frontier {
                        distance: FloatOrd(candidate),
                        node: v,
                    }));
                }
            }
        }

        if distances[end].is_infinite() {
            return None;
        }

        let mut nodes = vec![end];
        let mut current = end;
        while let Some(prev) = previous[current] {
            nodes.push(prev);
            current = prev;
        }
        nodes.reverse();

        Some(Route {
            nodes,
            total_distance: distances[end],
        })
    }

    /// Shortest route from `start` to the closest reachable airport.
    ///
    /// Airports are tried in id order; on equal distance the lower id wins.
    pub fn find_shortest_path_to_nearest_airport(&self, start: NodeId) -> Option<Route> {
        if !self.node_exists(start) {
            return None;
        }

        let mut best: Option<Route> = None;
        for airport in self.airports() {
            let Some(route) = self.find_shortest_path(start, airport) else {
                continue;
            };
            let better = best
                .as_ref()
                .map(|current| route.total_distance < current.total_distance)
                .unwrap_or(true);
            if better {
                best = Some(route);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AircraftType, Priority};

    fn aircraft(id: &str) -> Aircraft {
        Aircraft::new(id, "A320", "JFK", "LHR", 80.0, Priority::Medium, AircraftType::Commercial)
    }

    fn triangle() -> (AirspaceGraph, NodeId, NodeId, NodeId) {
        let mut graph = AirspaceGraph::default();
        let a = graph.add_node("A", true, 0, 0).unwrap();
        let b = graph.add_node("B", false, 5, 5).unwrap();
        let c = graph.add_node("C", false, 10, 10).unwrap();
        graph.add_edge(a, b, 5.0);
        graph.add_edge(b, c, 5.0);
        graph.add_edge(a, c, 20.0);
        (graph, a, b, c)
    }

    /// Minimum over every simple path, by exhaustive search.
    fn brute_force(graph: &AirspaceGraph, start: NodeId, end: NodeId) -> Option<f64> {
        fn walk(
            graph: &AirspaceGraph,
            node: NodeId,
            end: NodeId,
            seen: &mut Vec<bool>,
            cost: f64,
            best: &mut Option<f64>,
        ) {
            if node == end {
                if best.map(|b| cost < b).unwrap_or(true) {
                    *best = Some(cost);
                }
                return;
            }
            seen[node] = true;
            for edge in graph.edges(node) {
                if !seen[edge.to] {
                    walk(graph, edge.to, end, seen, cost + edge.weight, best);
                }
            }
            seen[node] = false;
        }

        let mut best = None;
        let mut seen = vec![false; graph.node_count()];
        walk(graph, start, end, &mut seen, 0.0, &mut best);
        best
    }

    #[test]
    fn test_ids_are_dense_and_capacity_is_enforced() {
        let mut graph = AirspaceGraph::new(2, 20);
        assert_eq!(graph.add_node("A", true, 1, 1).unwrap(), 0);
        assert_eq!(graph.add_node("B", false, 2, 2).unwrap(), 1);
        let err = graph.add_node("C", false, 3, 3).unwrap_err();
        assert!(matches!(err, AirspaceError::CapacityExceeded { capacity: 2, .. }));
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_out_of_bounds_node_is_rejected() {
        let mut graph = AirspaceGraph::default();
        assert!(matches!(
            graph.add_node("X", false, 20, 0),
            Err(AirspaceError::OutOfBounds { x: 20, y: 0, size: 20 })
        ));
        assert!(graph.add_node("Y", false, 19, 19).is_ok());
        assert_eq!(graph.node(0).map(|n| n.name.as_str()), Some("Y"));
    }

    #[test]
    fn test_edges_to_unknown_nodes_are_ignored() {
        let (mut graph, a, _, _) = triangle();
        assert!(!graph.add_edge(a, 99, 1.0));
        assert!(!graph.add_edge(99, a, 1.0));
        assert!(!graph.add_edge(a, a, -1.0));
        assert_eq!(graph.edges(a).len(), 2);
        assert!(!graph.remove_edge(99, a));
    }

    #[test]
    fn test_remove_edge_drops_latest_matching_corridor() {
        let (mut graph, a, b, _) = triangle();
        graph.add_edge(a, b, 1.0);
        assert!(graph.remove_edge(a, b));
        assert_eq!(graph.edges(a).iter().filter(|e| e.to == b).count(), 1);
        assert_eq!(graph.edges(a)[0].weight, 5.0);
        assert!(graph.remove_edge(a, b));
        assert!(!graph.remove_edge(a, b));
    }

    #[test]
    fn test_shortest_path_prefers_cheaper_detour() {
        let (graph, a, b, c) = triangle();
        let route = graph.find_shortest_path(a, c).unwrap();
        assert_eq!(route.nodes, vec![a, b, c]);
        assert_eq!(route.total_distance, 10.0);
        assert_eq!(route.hops(), 2);
    }

    #[test]
    fn test_path_to_self_is_single_node() {
        let (graph, a, _, _) = triangle();
        let route = graph.find_shortest_path(a, a).unwrap();
        assert_eq!(route.nodes, vec![a]);
        assert_eq!(route.total_distance, 0.0);
    }

    #[test]
    fn test_unreachable_or_invalid_returns_none() {
        let (graph, a, _, c) = triangle();
        // Edges are directed: nothing leads back to A.
        assert!(graph.find_shortest_path(c, a).is_none());
        assert!(graph.find_shortest_path(a, 42).is_none());
        assert!(graph.find_shortest_path(42, a).is_none());
    }

    #[test]
    fn test_equal_cost_paths_resolve_through_lowest_id() {
        let mut graph = AirspaceGraph::default();
        let s = graph.add_node("S", false, 0, 0).unwrap();
        let x = graph.add_node("X", false, 1, 0).unwrap();
        let y = graph.add_node("Y", false, 0, 1).unwrap();
        let t = graph.add_node("T", true, 1, 1).unwrap();
        graph.add_edge(s, y, 1.0);
        graph.add_edge(s, x, 1.0);
        graph.add_edge(y, t, 1.0);
        graph.add_edge(x, t, 1.0);

        let route = graph.find_shortest_path(s, t).unwrap();
        assert_eq!(route.nodes, vec![s, x, t]);
    }

    #[test]
    fn test_dijkstra_matches_brute_force() {
        let mut graph = AirspaceGraph::default();
        for i in 0..7 {
            graph.add_node(format!("N{i}"), i % 3 == 0, i, i).unwrap();
        }
        let corridors = [
            (0, 1, 7.0),
            (0, 2, 9.0),
            (0, 5, 14.0),
            (1, 2, 10.0),
            (1, 3, 15.0),
            (2, 3, 11.0),
            (2, 5, 2.0),
            (3, 4, 6.0),
            (5, 4, 9.0),
            (4, 6, 1.0),
            (6, 0, 3.0),
            (5, 2, 0.0),
        ];
        for (from, to, weight) in corridors {
            graph.add_edge(from, to, weight);
        }

        for start in 0..graph.node_count() {
            for end in 0..graph.node_count() {
                let expected = brute_force(&graph, start, end);
                let actual = graph.find_shortest_path(start, end);
                match (expected, actual) {
                    (None, None) => {}
                    (Some(cost), Some(route)) => {
                        assert!((cost - route.total_distance).abs() < 1e-9, "{start}->{end}");
                        let summed: f64 = route
                            .nodes
                            .windows(2)
                            .map(|pair| {
                                graph
                                    .edges(pair[0])
                                    .iter()
                                    .filter(|e| e.to == pair[1])
                                    .map(|e| e.weight)
                                    .fold(f64::INFINITY, f64::min)
                            })
                            .sum();
                        assert!((summed - route.total_distance).abs() < 1e-9);
                    }
                    (expected, actual) => {
                        panic!("{start}->{end}: expected {expected:?}, got {actual:?}")
                    }
                }
            }
        }
    }

    #[test]
    fn test_nearest_airport_picks_minimum_distance() {
        let mut graph = AirspaceGraph::default();
        let far = graph.add_node("FAR", true, 0, 0).unwrap();
        let wp = graph.add_node("WP", false, 5, 5).unwrap();
        let near = graph.add_node("NEAR", true, 9, 9).unwrap();
        graph.add_edge(wp, far, 30.0);
        graph.add_edge(wp, near, 12.0);

        let route = graph.find_shortest_path_to_nearest_airport(wp).unwrap();
        assert_eq!(route.nodes, vec![wp, near]);
        assert_eq!(route.total_distance, 12.0);
    }

    #[test]
    fn test_nearest_airport_none_without_reachable_airport() {
        let mut graph = AirspaceGraph::default();
        let wp = graph.add_node("WP", false, 5, 5).unwrap();
        assert!(graph.find_shortest_path_to_nearest_airport(wp).is_none());

        let apt = graph.add_node("APT", true, 1, 1).unwrap();
        graph.add_edge(apt, wp, 1.0);
        assert!(graph.find_shortest_path_to_nearest_airport(wp).is_none());
        assert!(graph.find_shortest_path_to_nearest_airport(17).is_none());
    }

    #[test]
    fn test_placement_is_exclusive() {
        let (mut graph, _, b, _) = triangle();
        let mut first = aircraft("PK-1");
        let mut second = aircraft("PK-2");

        graph.place_aircraft(b, &mut first).unwrap();
        assert_eq!(first.node_id, Some(b));
        assert_eq!(first.position, GridPosition::new(5, 5));

        let err = graph.place_aircraft(b, &mut second).unwrap_err();
        assert!(matches!(err, AirspaceError::OccupiedNode { node, ref occupant } if node == b && occupant == "PK-1"));
        assert_eq!(graph.occupant(b), Some("PK-1"));
        assert_eq!(second.node_id, None);

        assert_eq!(graph.remove_aircraft(b).unwrap().as_deref(), Some("PK-1"));
        graph.place_aircraft(b, &mut second).unwrap();
        assert_eq!(graph.occupant(b), Some("PK-2"));
    }

    #[test]
    fn test_remove_aircraft_fails_only_for_unknown_node() {
        let (mut graph, a, _, _) = triangle();
        assert_eq!(graph.remove_aircraft(a).unwrap(), None);
        assert!(matches!(graph.remove_aircraft(9), Err(AirspaceError::NodeNotFound(9))));
        assert!(matches!(
            graph.place_aircraft(9, &mut aircraft("PK-1")),
            Err(AirspaceError::NodeNotFound(9))
        ));
    }

    #[test]
    fn test_move_is_all_or_nothing() {
        let (mut graph, a, b, c) = triangle();
        let mut mover = aircraft("PK-1");
        let mut blocker = aircraft("PK-2");
        graph.place_aircraft(a, &mut mover).unwrap();
        graph.place_aircraft(c, &mut blocker).unwrap();

        assert!(matches!(
            graph.move_aircraft(a, c, &mut mover),
            Err(AirspaceError::OccupiedNode { .. })
        ));
        assert_eq!(graph.occupant(a), Some("PK-1"));
        assert_eq!(mover.node_id, Some(a));

        assert!(matches!(
            graph.move_aircraft(b, c, &mut mover),
            Err(AirspaceError::NotPlaced(_))
        ));

        graph.move_aircraft(a, b, &mut mover).unwrap();
        assert_eq!(graph.occupant(a), None);
        assert_eq!(graph.occupant(b), Some("PK-1"));
        assert_eq!(mover.node_id, Some(b));
        assert_eq!(graph.first_free_node(), Some(a));
    }
}
