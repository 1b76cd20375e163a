//! Text and JSON renderings of controller state.

use serde_json::{json, Value};
use skynet_core::{Aircraft, AirspaceGraph, LandingReport, MoveReport, NodeId, Route, TrafficController};
use std::fmt::Write;

fn node_name(graph: &AirspaceGraph, id: NodeId) -> String {
    graph
        .node(id)
        .map(|node| node.name.clone())
        .unwrap_or_else(|| format!("#{id}"))
}

fn location(graph: &AirspaceGraph, aircraft: &Aircraft) -> String {
    match aircraft.node_id {
        Some(id) => node_name(graph, id),
        None => "-".to_string(),
    }
}

/// `JFK -> WP1 -> WP2 (125.0)`
pub fn route_line(graph: &AirspaceGraph, route: &Route) -> String {
    let names: Vec<String> = route.nodes.iter().map(|&id| node_name(graph, id)).collect();
    format!("{} ({:.1})", names.join(" -> "), route.total_distance)
}

pub fn route_json(graph: &AirspaceGraph, route: &Route) -> Value {
    let names: Vec<String> = route.nodes.iter().map(|&id| node_name(graph, id)).collect();
    json!({
        "nodes": route.nodes,
        "names": names,
        "total_distance": route.total_distance,
    })
}

pub fn aircraft_details(graph: &AirspaceGraph, aircraft: &Aircraft) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Flight:      {}", aircraft.flight_id());
    let _ = writeln!(out, "Model:       {}", aircraft.model);
    let _ = writeln!(out, "Route:       {} -> {}", aircraft.origin, aircraft.destination);
    let _ = writeln!(out, "Type:        {}", aircraft.aircraft_type.label());
    let _ = writeln!(out, "Priority:    {}", aircraft.priority().label());
    let _ = writeln!(out, "Fuel:        {:.1}%", aircraft.fuel());
    let _ = writeln!(out, "Location:    {}", location(graph, aircraft));
    let _ = writeln!(out, "Grid:        ({}, {})", aircraft.position.x, aircraft.position.y);
    let _ = write!(out, "Status:      {}", aircraft.status_label());
    if aircraft.landed {
        let _ = write!(out, " (arrival #{})", aircraft.arrival_timestamp);
    }
    out
}

pub fn aircraft_json(graph: &AirspaceGraph, aircraft: &Aircraft) -> Value {
    let mut value = serde_json::to_value(aircraft).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("location".to_string(), json!(location(graph, aircraft)));
        map.insert("status".to_string(), json!(aircraft.status_label()));
    }
    value
}

pub fn landing_line(graph: &AirspaceGraph, report: &LandingReport) -> String {
    let from = report
        .vacated_node
        .map(|id| node_name(graph, id))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "Landed {} [{}] from {} at t={}",
        report.flight_id,
        report.priority.label(),
        from,
        report.timestamp
    )
}

pub fn move_line(graph: &AirspaceGraph, report: &MoveReport) -> String {
    let mut line = format!(
        "{} moved via {}, fuel {:.1}%",
        report.flight_id,
        route_line(graph, &report.route),
        report.fuel
    );
    if report.escalated {
        line.push_str(" - LOW FUEL, priority raised to HIGH");
    }
    line
}

pub fn queue_table(atc: &TrafficController) -> String {
    let queue = atc.landing_queue();
    if queue.is_empty() {
        return "Landing queue is empty".to_string();
    }
    let mut out = format!("{:<4} {:<12} {:<9} {:>6}  {}\n", "#", "FLIGHT", "PRIORITY", "FUEL", "AT");
    for (rank, (entry, aircraft)) in queue.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:<4} {:<12} {:<9} {:>5.1}%  {}",
            rank + 1,
            entry.flight_id,
            entry.priority.label(),
            aircraft.fuel(),
            location(atc.graph(), aircraft)
        );
    }
    out.trim_end().to_string()
}

pub fn queue_json(atc: &TrafficController) -> Value {
    let entries: Vec<Value> = atc
        .landing_queue()
        .into_iter()
        .map(|(entry, aircraft)| {
            json!({
                "flight_id": entry.flight_id,
                "priority": entry.priority,
                "fuel": aircraft.fuel(),
                "location": location(atc.graph(), aircraft),
            })
        })
        .collect();
    Value::Array(entries)
}

pub fn log_table(atc: &TrafficController) -> String {
    let log = atc.flight_log();
    if log.is_empty() {
        return "No flights have landed yet".to_string();
    }
    let mut out = format!("{:<6} {:<12} {:<10} {:<14} {}\n", "T", "FLIGHT", "MODEL", "ROUTE", "STATUS");
    for (entry, aircraft) in log {
        let route = format!("{}->{}", aircraft.origin, aircraft.destination);
        let _ = writeln!(
            out,
            "{:<6} {:<12} {:<10} {:<14} {}",
            entry.timestamp,
            entry.flight_id,
            aircraft.model,
            route,
            aircraft.status_label()
        );
    }
    out.trim_end().to_string()
}

pub fn log_json(atc: &TrafficController) -> Value {
    let entries: Vec<Value> = atc
        .flight_log()
        .into_iter()
        .map(|(entry, aircraft)| {
            json!({
                "timestamp": entry.timestamp,
                "flight": aircraft_json(atc.graph(), aircraft),
            })
        })
        .collect();
    Value::Array(entries)
}

pub fn registry_table(atc: &TrafficController) -> String {
    let mut flights: Vec<&Aircraft> = atc.registry().iter().collect();
    if flights.is_empty() {
        return "No flights registered".to_string();
    }
    flights.sort_by(|a, b| a.flight_id().cmp(b.flight_id()));

    let mut out = format!(
        "{:<12} {:<10} {:<11} {:<9} {:>6}  {:<6} {}\n",
        "FLIGHT", "MODEL", "TYPE", "PRIORITY", "FUEL", "AT", "STATUS"
    );
    for aircraft in flights {
        let _ = writeln!(
            out,
            "{:<12} {:<10} {:<11} {:<9} {:>5.1}%  {:<6} {}",
            aircraft.flight_id(),
            aircraft.model,
            aircraft.aircraft_type.label(),
            aircraft.priority().label(),
            aircraft.fuel(),
            location(atc.graph(), aircraft),
            aircraft.status_label()
        );
    }
    let _ = write!(
        out,
        "{} flights, {} buckets, longest chain {}",
        atc.registry().len(),
        atc.registry().bucket_count(),
        atc.registry().max_chain_len()
    );
    out
}

pub fn registry_json(atc: &TrafficController) -> Value {
    let mut flights: Vec<&Aircraft> = atc.registry().iter().collect();
    flights.sort_by(|a, b| a.flight_id().cmp(b.flight_id()));
    Value::Array(
        flights
            .into_iter()
            .map(|aircraft| aircraft_json(atc.graph(), aircraft))
            .collect(),
    )
}

/// Radar grid plus the node and corridor listing.
///
/// Grid legend: `A` free airport, `W` free waypoint, `*` occupied node,
/// `.` empty cell. Row 0 is printed at the top.
pub fn airspace_map(graph: &AirspaceGraph) -> String {
    let size = graph.grid_size().max(0) as usize;
    let mut grid = vec![vec!['.'; size]; size];
    for node in graph.nodes() {
        let (x, y) = (node.position.x as usize, node.position.y as usize);
        if let Some(cell) = grid.get_mut(y).and_then(|row| row.get_mut(x)) {
            *cell = match (node.is_occupied(), node.is_airport) {
                (true, _) => '*',
                (false, true) => 'A',
                (false, false) => 'W',
            };
        }
    }

    let mut out = String::new();
    for row in &grid {
        let line: Vec<String> = row.iter().map(char::to_string).collect();
        let _ = writeln!(out, "{}", line.join(" "));
    }
    out.push('\n');

    for node in graph.nodes() {
        let kind = if node.is_airport { "airport" } else { "waypoint" };
        let corridors: Vec<String> = node
            .edges()
            .iter()
            .map(|edge| format!("{}({})", node_name(graph, edge.to), edge.weight))
            .collect();
        let _ = writeln!(
            out,
            "[{}] {:<4} {:<8} ({:>2},{:>2}) {:<8} -> {}",
            node.id,
            node.name,
            kind,
            node.position.x,
            node.position.y,
            node.occupant().unwrap_or("-"),
            corridors.join(", ")
        );
    }
    out.trim_end().to_string()
}

pub fn airspace_json(graph: &AirspaceGraph) -> Value {
    Value::Array(
        graph
            .nodes()
            .map(|node| serde_json::to_value(node).unwrap_or(Value::Null))
            .collect(),
    )
}
