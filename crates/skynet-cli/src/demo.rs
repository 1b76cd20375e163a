//! Random traffic generator for exercising the controller.

use rand::Rng;
use skynet_core::{AircraftType, AirspaceError, FlightRequest, MoveReport, TrafficController};

const MODELS: [&str; 6] = ["A320", "B738", "B77W", "A359", "C172", "B744F"];
const AIRLINES: [&str; 5] = ["PK", "EK", "BA", "AF", "JL"];
const ROUTINE_TYPES: [AircraftType; 3] = [
    AircraftType::Commercial,
    AircraftType::Cargo,
    AircraftType::Private,
];

/// What a demo run did.
#[derive(Debug, Default)]
pub struct DemoSummary {
    pub added: Vec<String>,
    pub moves: Vec<MoveReport>,
    pub collisions: usize,
    pub rejected: usize,
}

fn random_request<R: Rng>(rng: &mut R, airports: &[String]) -> FlightRequest {
    let airline = AIRLINES[rng.random_range(0..AIRLINES.len())];
    let origin = airports[rng.random_range(0..airports.len())].clone();
    let mut destination = airports[rng.random_range(0..airports.len())].clone();
    if destination == origin && airports.len() > 1 {
        destination = airports
            .iter()
            .find(|name| **name != origin)
            .cloned()
            .unwrap_or(destination);
    }
    // Emergencies are rare.
    let aircraft_type = if rng.random_bool(0.1) {
        AircraftType::Emergency
    } else {
        ROUTINE_TYPES[rng.random_range(0..ROUTINE_TYPES.len())]
    };

    FlightRequest {
        flight_id: format!("{airline}-{}", rng.random_range(100..1000u32)),
        model: MODELS[rng.random_range(0..MODELS.len())].to_string(),
        origin,
        destination,
        fuel: f64::from(rng.random_range(5..=100u32)),
        aircraft_type,
    }
}

/// Add up to `flights` random flights, then attempt `moves` random moves.
pub fn run_demo<R: Rng>(
    atc: &mut TrafficController,
    rng: &mut R,
    flights: usize,
    moves: usize,
) -> DemoSummary {
    let mut summary = DemoSummary::default();
    let airports: Vec<String> = atc
        .graph()
        .airports()
        .filter_map(|id| atc.graph().node(id).map(|node| node.name.clone()))
        .collect();
    if airports.is_empty() || atc.graph().node_count() == 0 {
        tracing::warn!("airspace has no airports, demo skipped");
        return summary;
    }

    for _ in 0..flights {
        let request = random_request(rng, &airports);
        let flight_id = request.flight_id.clone();
        match atc.add_flight(request) {
            Ok(node) => {
                tracing::debug!(%flight_id, node, "demo flight added");
                summary.added.push(flight_id);
            }
            Err(AirspaceError::DuplicateKey(_)) => summary.rejected += 1,
            Err(err) => {
                tracing::warn!(error = %err, "demo stopped adding flights");
                break;
            }
        }
    }

    let node_count = atc.graph().node_count();
    for _ in 0..moves {
        let airborne: Vec<String> = atc
            .registry()
            .iter()
            .filter(|aircraft| !aircraft.landed && aircraft.is_placed())
            .map(|aircraft| aircraft.flight_id().to_string())
            .collect();
        if airborne.is_empty() {
            break;
        }
        let flight_id = &airborne[rng.random_range(0..airborne.len())];
        let target = rng.random_range(0..node_count);

        match atc.move_aircraft(flight_id, target) {
            Ok(report) => summary.moves.push(report),
            Err(AirspaceError::OccupiedNode { .. }) => summary.collisions += 1,
            Err(err) => {
                tracing::debug!(%flight_id, target, error = %err, "demo move rejected");
                summary.rejected += 1;
            }
        }
    }
    summary
}
