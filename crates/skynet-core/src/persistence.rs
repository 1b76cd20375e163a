//! Pipe-delimited text records for saving and restoring state.
//!
//! Registry file:
//! ```text
//! REGISTRY
//! <count>
//! flightId|model|origin|destination|fuel|priority|type|gridX|gridY|nodeId|landed|timestamp
//! LOGS
//! ```
//!
//! History file:
//! ```text
//! <count>
//! flightId|model|origin|destination|fuel|priority|type|timestamp|landed|crashed
//! ```
//!
//! `nodeId` is `-1` for an aircraft that is not placed; flags are `0`/`1`.

use crate::error::{AirspaceError, AirspaceResult};
use crate::models::{Aircraft, AircraftType, GridPosition, Priority};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const REGISTRY_HEADER: &str = "REGISTRY";
const REGISTRY_TRAILER: &str = "LOGS";
const REGISTRY_FIELDS: usize = 12;
const HISTORY_FIELDS: usize = 10;

/// True when `value` can be stored in a record field.
pub fn is_storable(value: &str) -> bool {
    !value.contains(['|', '\n', '\r'])
}

pub fn format_registry_record(aircraft: &Aircraft) -> String {
    let node_id = aircraft
        .node_id
        .map(|id| id as i64)
        .unwrap_or(-1);
    format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        aircraft.flight_id(),
        aircraft.model,
        aircraft.origin,
        aircraft.destination,
        aircraft.fuel(),
        aircraft.priority().code(),
        aircraft.aircraft_type.code(),
        aircraft.position.x,
        aircraft.position.y,
        node_id,
        u8::from(aircraft.landed),
        aircraft.arrival_timestamp,
    )
}

pub fn format_history_record(aircraft: &Aircraft, timestamp: u64) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        aircraft.flight_id(),
        aircraft.model,
        aircraft.origin,
        aircraft.destination,
        aircraft.fuel(),
        aircraft.priority().code(),
        aircraft.aircraft_type.code(),
        timestamp,
        u8::from(aircraft.landed),
        u8::from(aircraft.crashed),
    )
}

/// Splits a record and parses typed fields, tagging errors with the line.
struct Fields<'a> {
    parts: Vec<&'a str>,
    line: usize,
}

impl<'a> Fields<'a> {
    fn split(record: &'a str, expected: usize, line: usize) -> AirspaceResult<Self> {
        let parts: Vec<&str> = record.split('|').collect();
        if parts.len() != expected {
            return Err(AirspaceError::Parse {
                line,
                message: format!("expected {expected} fields, found {}", parts.len()),
            });
        }
        if parts[0].is_empty() {
            return Err(AirspaceError::Parse {
                line,
                message: "empty flight id".to_string(),
            });
        }
        Ok(Self { parts, line })
    }

    fn text(&self, idx: usize) -> &'a str {
        self.parts[idx]
    }

    fn number<T: std::str::FromStr>(&self, idx: usize, name: &str) -> AirspaceResult<T> {
        self.parts[idx].trim().parse().map_err(|_| AirspaceError::Parse {
            line: self.line,
            message: format!("invalid {name} '{}'", self.parts[idx]),
        })
    }

    fn flag(&self, idx: usize, name: &str) -> AirspaceResult<bool> {
        match self.number::<i32>(idx, name)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(AirspaceError::Parse {
                line: self.line,
                message: format!("invalid {name} flag {other}"),
            }),
        }
    }

    fn priority(&self, idx: usize) -> AirspaceResult<Priority> {
        let code = self.number::<i32>(idx, "priority")?;
        Priority::from_code(code).ok_or_else(|| AirspaceError::Parse {
            line: self.line,
            message: format!("unknown priority code {code}"),
        })
    }

    fn aircraft_type(&self, idx: usize) -> AirspaceResult<AircraftType> {
        let code = self.number::<i32>(idx, "aircraft type")?;
        AircraftType::from_code(code).ok_or_else(|| AirspaceError::Parse {
            line: self.line,
            message: format!("unknown aircraft type code {code}"),
        })
    }

    /// Identity, fuel, priority and type: the first seven fields of both layouts.
    fn aircraft(&self) -> AirspaceResult<Aircraft> {
        Ok(Aircraft::new(
            self.text(0),
            self.text(1),
            self.text(2),
            self.text(3),
            self.number(4, "fuel")?,
            self.priority(5)?,
            self.aircraft_type(6)?,
        ))
    }
}

pub fn parse_registry_record(record: &str, line: usize) -> AirspaceResult<Aircraft> {
    let fields = Fields::split(record, REGISTRY_FIELDS, line)?;
    let mut aircraft = fields.aircraft()?;
    aircraft.position = GridPosition::new(fields.number(7, "grid x")?, fields.number(8, "grid y")?);
    let node_id: i64 = fields.number(9, "node id")?;
    aircraft.node_id = usize::try_from(node_id).ok();
    aircraft.landed = fields.flag(10, "landed")?;
    aircraft.arrival_timestamp = fields.number(11, "timestamp")?;
    Ok(aircraft)
}

/// Parse a history record into the reconstructed aircraft and its timestamp.
pub fn parse_history_record(record: &str, line: usize) -> AirspaceResult<(Aircraft, u64)> {
    let fields = Fields::split(record, HISTORY_FIELDS, line)?;
    let mut aircraft = fields.aircraft()?;
    let timestamp: u64 = fields.number(7, "timestamp")?;
    aircraft.arrival_timestamp = timestamp;
    aircraft.landed = fields.flag(8, "landed")?;
    aircraft.crashed = fields.flag(9, "crashed")?;
    Ok((aircraft, timestamp))
}

pub fn write_registry<'a, W, I>(mut out: W, aircraft: I) -> AirspaceResult<()>
where
    W: Write,
    I: ExactSizeIterator<Item = &'a Aircraft>,
{
    writeln!(out, "{REGISTRY_HEADER}")?;
    writeln!(out, "{}", aircraft.len())?;
    for entry in aircraft {
        writeln!(out, "{}", format_registry_record(entry))?;
    }
    writeln!(out, "{REGISTRY_TRAILER}")?;
    out.flush()?;
    Ok(())
}

/// Write history records, already in chronological order.
pub fn write_history<W: Write>(mut out: W, records: &[(&Aircraft, u64)]) -> AirspaceResult<()> {
    writeln!(out, "{}", records.len())?;
    for (aircraft, timestamp) in records {
        writeln!(out, "{}", format_history_record(aircraft, *timestamp))?;
    }
    out.flush()?;
    Ok(())
}

/// Non-blank lines paired with their 1-based line numbers.
fn numbered_lines<R: BufRead>(input: R) -> AirspaceResult<Vec<(usize, String)>> {
    let mut lines = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim_end_matches('\r');
        if trimmed.trim().is_empty() {
            continue;
        }
        lines.push((idx + 1, trimmed.to_string()));
    }
    Ok(lines)
}

fn parse_count(line: Option<&(usize, String)>) -> AirspaceResult<usize> {
    let Some((number, text)) = line else {
        return Err(AirspaceError::Parse {
            line: 0,
            message: "missing record count".to_string(),
        });
    };
    text.trim().parse().map_err(|_| AirspaceError::Parse {
        line: *number,
        message: format!("invalid record count '{text}'"),
    })
}

fn missing_record(expected: usize, found: usize) -> AirspaceError {
    AirspaceError::Parse {
        line: 0,
        message: format!("expected {expected} records, found {found}"),
    }
}

pub fn read_registry<R: BufRead>(input: R) -> AirspaceResult<Vec<Aircraft>> {
    let lines = numbered_lines(input)?;
    let mut iter = lines.iter();

    match iter.next() {
        Some((_, header)) if header.trim() == REGISTRY_HEADER => {}
        Some((number, header)) => {
            return Err(AirspaceError::Parse {
                line: *number,
                message: format!("expected {REGISTRY_HEADER} header, found '{header}'"),
            });
        }
        None => return Err(missing_record(0, 0)),
    }

    let count = parse_count(iter.next())?;
    let mut aircraft = Vec::with_capacity(count);
    for found in 0..count {
        let (number, record) = iter.next().ok_or_else(|| missing_record(count, found))?;
        aircraft.push(parse_registry_record(record, *number)?);
    }

    if let Some((_, trailer)) = iter.clone().next() {
        if trailer.trim() == REGISTRY_TRAILER {
            iter.next();
        }
    }
    if let Some((number, extra)) = iter.next() {
        return Err(AirspaceError::Parse {
            line: *number,
            message: format!("unexpected content '{extra}'"),
        });
    }
    Ok(aircraft)
}

pub fn read_history<R: BufRead>(input: R) -> AirspaceResult<Vec<(Aircraft, u64)>> {
    let lines = numbered_lines(input)?;
    if lines.is_empty() {
        return Ok(Vec::new());
    }
    let mut iter = lines.iter();

    let count = parse_count(iter.next())?;
    let mut records = Vec::with_capacity(count);
    for found in 0..count {
        let (number, record) = iter.next().ok_or_else(|| missing_record(count, found))?;
        records.push(parse_history_record(record, *number)?);
    }
    if let Some((number, extra)) = iter.next() {
        return Err(AirspaceError::Parse {
            line: *number,
            message: format!("unexpected content '{extra}'"),
        });
    }
    Ok(records)
}

pub fn read_registry_file(path: &Path) -> AirspaceResult<Vec<Aircraft>> {
    read_registry(BufReader::new(File::open(path)?))
}

/// A missing history file reads as an empty history.
pub fn read_history_file(path: &Path) -> AirspaceResult<Vec<(Aircraft, u64)>> {
    match File::open(path) {
        Ok(file) => read_history(BufReader::new(file)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "history file not found, starting with empty history");
            Ok(Vec::new())
        }
        Err(err) => Err(err.into()),
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    PathBuf::from(staged)
}

/// Stage `contents` next to `path`; call [`commit_staged`] to publish it.
pub(crate) fn stage_file<F>(path: &Path, contents: F) -> AirspaceResult<PathBuf>
where
    F: FnOnce(&mut BufWriter<File>) -> AirspaceResult<()>,
{
    let staged = staging_path(path);
    let mut writer = BufWriter::new(File::create(&staged)?);
    if let Err(err) = contents(&mut writer) {
        drop(writer);
        let _ = fs::remove_file(&staged);
        return Err(err);
    }
    writer.into_inner().map_err(|err| err.into_error())?.sync_all()?;
    Ok(staged)
}

pub(crate) fn commit_staged(staged: &Path, path: &Path) -> AirspaceResult<()> {
    fs::rename(staged, path)?;
    Ok(())
}

pub(crate) fn discard_staged(staged: &Path) {
    let _ = fs::remove_file(staged);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Aircraft {
        let mut aircraft = Aircraft::new(
            "PK-786",
            "A320",
            "JFK",
            "LHR",
            72.5,
            Priority::Medium,
            AircraftType::Commercial,
        );
        aircraft.position = GridPosition::new(5, 5);
        aircraft.node_id = Some(5);
        aircraft
    }

    #[test]
    fn test_registry_record_layout() {
        assert_eq!(
            format_registry_record(&sample()),
            "PK-786|A320|JFK|LHR|72.5|3|0|5|5|5|0|0"
        );

        let mut unplaced = sample();
        unplaced.node_id = None;
        unplaced.landed = true;
        unplaced.arrival_timestamp = 4;
        assert_eq!(
            format_registry_record(&unplaced),
            "PK-786|A320|JFK|LHR|72.5|3|0|5|5|-1|1|4"
        );
    }

    #[test]
    fn test_history_record_layout() {
        let mut aircraft = sample();
        aircraft.landed = true;
        aircraft.crashed = true;
        assert_eq!(
            format_history_record(&aircraft, 9),
            "PK-786|A320|JFK|LHR|72.5|3|0|9|1|1"
        );
    }

    #[test]
    fn test_parses_legacy_registry_line() {
        let aircraft = parse_registry_record("EK-202|B777|DXB|JFK|8|2|1|10|3|2|0|0", 3).unwrap();
        assert_eq!(aircraft.flight_id(), "EK-202");
        assert_eq!(aircraft.fuel(), 8.0);
        assert_eq!(aircraft.priority(), Priority::High);
        assert_eq!(aircraft.aircraft_type, AircraftType::Cargo);
        assert_eq!(aircraft.position, GridPosition::new(10, 3));
        assert_eq!(aircraft.node_id, Some(2));
        assert!(!aircraft.landed);
    }

    #[test]
    fn test_saved_priority_is_kept() {
        let aircraft = parse_registry_record("X|M|O|D|50|1|2|0|0|-1|0|0", 1).unwrap();
        assert_eq!(aircraft.priority(), Priority::Critical);
        assert_eq!(aircraft.node_id, None);
    }

    #[test]
    fn test_malformed_records_report_line() {
        let err = parse_registry_record("A|B|C", 7).unwrap_err();
        assert!(matches!(err, AirspaceError::Parse { line: 7, .. }));

        let err = parse_history_record("A|M|O|D|abc|3|0|1|1|0", 2).unwrap_err();
        assert!(matches!(err, AirspaceError::Parse { line: 2, ref message } if message.contains("fuel")));

        let err = parse_history_record("A|M|O|D|50|9|0|1|1|0", 2).unwrap_err();
        assert!(matches!(err, AirspaceError::Parse { ref message, .. } if message.contains("priority")));
    }

    #[test]
    fn test_registry_file_round_trip() {
        let mut landed = sample();
        landed.node_id = None;
        landed.landed = true;
        landed.arrival_timestamp = 3;
        let other = Aircraft::new("CG-1", "B744F", "NRT", "CDG", 9.0, Priority::Low, AircraftType::Cargo);
        let fleet = [landed, other];

        let mut buffer = Vec::new();
        write_registry(&mut buffer, fleet.iter()).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with("REGISTRY\n2\n"));
        assert!(text.ends_with("LOGS\n"));

        let restored = read_registry(buffer.as_slice()).unwrap();
        assert_eq!(restored, fleet.to_vec());
    }

    #[test]
    fn test_history_file_round_trip() {
        let mut first = sample();
        first.landed = true;
        let second = Aircraft::new("PV-7", "C172", "CDG", "LHR", 40.0, Priority::Low, AircraftType::Private);

        let mut buffer = Vec::new();
        write_history(&mut buffer, &[(&first, 1), (&second, 2)]).unwrap();
        let restored = read_history(buffer.as_slice()).unwrap();

        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0].0.flight_id(), "PK-786");
        assert_eq!(restored[0].1, 1);
        assert!(restored[0].0.landed);
        assert_eq!(restored[1].0.flight_id(), "PV-7");
        assert_eq!(restored[1].0.arrival_timestamp, 2);
    }

    #[test]
    fn test_truncated_files_are_rejected() {
        let err = read_registry("REGISTRY\n2\nA|M|O|D|50|3|0|0|0|-1|0|0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AirspaceError::Parse { .. }));

        let err = read_registry("LOGS\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AirspaceError::Parse { line: 1, .. }));

        assert!(read_history("".as_bytes()).unwrap().is_empty());
        assert!(read_history("3\n".as_bytes()).is_err());
    }

    #[test]
    fn test_content_after_trailer_is_rejected() {
        let text = "REGISTRY\n0\nLOGS\nA|M|O|D|50|3|0|0|0|-1|0|0\n";
        let err = read_registry(text.as_bytes()).unwrap_err();
        assert!(matches!(err, AirspaceError::Parse { line: 4, .. }));

        let text = "REGISTRY\n0\nLOGS\nLOGS\n";
        assert!(read_registry(text.as_bytes()).is_err());
        assert!(read_registry("REGISTRY\n0\nLOGS\n\n".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_stored_priority_cannot_mask_low_fuel() {
        let aircraft = parse_registry_record("LF|M|O|D|5|4|2|0|0|-1|0|0", 1).unwrap();
        assert_eq!(aircraft.priority(), Priority::High);
        let (aircraft, _) = parse_history_record("LF|M|O|D|5|1|3|2|1|0", 1).unwrap();
        assert_eq!(aircraft.priority(), Priority::Critical);
    }

    #[test]
    fn test_storable_rejects_delimiters() {
        assert!(is_storable("PK-786"));
        assert!(!is_storable("PK|786"));
        assert!(!is_storable("PK\n786"));
    }
}
