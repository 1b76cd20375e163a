//! Flight registry: separate-chaining hash table keyed by flight id.
//!
//! The registry owns every [`Aircraft`]. Other components refer to flights
//! by id and resolve them here, so removal from the registry is the only
//! point where an aircraft is dropped.

use crate::error::{AirspaceError, AirspaceResult};
use crate::models::Aircraft;
use std::hash::Hasher;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a.
#[derive(Debug, Clone, Copy)]
pub struct FnvHasher(u64);

impl Default for FnvHasher {
    fn default() -> Self {
        Self(FNV_OFFSET_BASIS)
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u64::from(*byte);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlightRegistry {
    buckets: Vec<Vec<Aircraft>>,
    count: usize,
}

impl Default for FlightRegistry {
    fn default() -> Self {
        Self::new(101)
    }
}

impl FlightRegistry {
    /// Create a registry with `bucket_count` chains (at least one).
    pub fn new(bucket_count: usize) -> Self {
        let bucket_count = bucket_count.max(1);
        Self {
            buckets: vec![Vec::new(); bucket_count],
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_index(&self, flight_id: &str) -> usize {
        let mut hasher = FnvHasher::default();
        hasher.write(flight_id.as_bytes());
        (hasher.finish() % self.buckets.len() as u64) as usize
    }

    fn position(&self, flight_id: &str) -> (usize, Option<usize>) {
        let bucket = self.bucket_index(flight_id);
        let slot = self.buckets[bucket]
            .iter()
            .position(|aircraft| aircraft.flight_id() == flight_id);
        (bucket, slot)
    }

    /// Take ownership of `aircraft`, keyed by its flight id.
    ///
    /// An id that is already registered is rejected and the stored entry is
    /// left untouched.
    pub fn insert(&mut self, aircraft: Aircraft) -> AirspaceResult<()> {
        let (bucket, slot) = self.position(aircraft.flight_id());
        if slot.is_some() {
            return Err(AirspaceError::DuplicateKey(aircraft.flight_id().to_string()));
        }
        // Newest entry heads its chain.
        self.buckets[bucket].insert(0, aircraft);
        self.count += 1;
        Ok(())
    }

    pub fn search(&self, flight_id: &str) -> Option<&Aircraft> {
        let (bucket, slot) = self.position(flight_id);
        slot.map(|slot| &self.buckets[bucket][slot])
    }

    pub fn search_mut(&mut self, flight_id: &str) -> Option<&mut Aircraft> {
        let (bucket, slot) = self.position(flight_id);
        match slot {
            Some(slot) => Some(&mut self.buckets[bucket][slot]),
            None => None,
        }
    }

    pub fn contains(&self, flight_id: &str) -> bool {
        self.position(flight_id).1.is_some()
    }

    /// Remove a flight and hand back ownership of it.
    pub fn remove(&mut self, flight_id: &str) -> AirspaceResult<Aircraft> {
        let (bucket, slot) = self.position(flight_id);
        let slot = slot.ok_or_else(|| AirspaceError::FlightNotFound(flight_id.to_string()))?;
        self.count -= 1;
        Ok(self.buckets[bucket].remove(slot))
    }

    /// Replace the stored aircraft that has the same flight id, returning
    /// the previous value. Unknown ids are rejected.
    pub fn update(&mut self, aircraft: Aircraft) -> AirspaceResult<Aircraft> {
        let stored = self
            .search_mut(aircraft.flight_id())
            .ok_or_else(|| AirspaceError::FlightNotFound(aircraft.flight_id().to_string()))?;
        Ok(std::mem::replace(stored, aircraft))
    }

    /// Every registered aircraft, in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = &Aircraft> {
        self.buckets.iter().flatten()
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.count = 0;
    }

    /// Length of the longest chain.
    pub fn max_chain_len(&self) -> usize {
        self.buckets.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AircraftType, Priority};

    fn aircraft(id: &str, fuel: f64) -> Aircraft {
        Aircraft::new(id, "B738", "CDG", "NRT", fuel, Priority::Medium, AircraftType::Commercial)
    }

    #[test]
    fn test_fnv_matches_reference_vectors() {
        let hash = |input: &str| {
            let mut hasher = FnvHasher::default();
            hasher.write(input.as_bytes());
            hasher.finish()
        };
        assert_eq!(hash(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(hash("a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(hash("foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn test_duplicate_insert_keeps_original() {
        let mut registry = FlightRegistry::default();
        registry.insert(aircraft("PK-786", 70.0)).unwrap();
        let err = registry.insert(aircraft("PK-786", 20.0)).unwrap_err();
        assert!(matches!(err, AirspaceError::DuplicateKey(ref id) if id == "PK-786"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.search("PK-786").unwrap().fuel(), 70.0);
    }

    #[test]
    fn test_search_remove_and_update() {
        let mut registry = FlightRegistry::default();
        registry.insert(aircraft("A1", 50.0)).unwrap();
        registry.insert(aircraft("B2", 60.0)).unwrap();

        assert!(registry.search("C3").is_none());
        assert!(matches!(registry.update(aircraft("C3", 1.0)), Err(AirspaceError::FlightNotFound(_))));

        let previous = registry.update(aircraft("A1", 55.0)).unwrap();
        assert_eq!(previous.fuel(), 50.0);
        assert_eq!(registry.search("A1").unwrap().fuel(), 55.0);

        let removed = registry.remove("B2").unwrap();
        assert_eq!(removed.flight_id(), "B2");
        assert!(matches!(registry.remove("B2"), Err(AirspaceError::FlightNotFound(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_colliding_ids_share_a_chain() {
        let mut registry = FlightRegistry::new(1);
        for id in ["X1", "X2", "X3"] {
            registry.insert(aircraft(id, 40.0)).unwrap();
        }
        assert_eq!(registry.max_chain_len(), 3);
        assert!(registry.contains("X2"));
        registry.remove("X2").unwrap();
        assert!(registry.contains("X1"));
        assert!(registry.contains("X3"));
        assert_eq!(registry.iter().count(), 2);
    }

    #[test]
    fn test_iter_visits_every_flight() {
        let mut registry = FlightRegistry::default();
        for n in 0..50 {
            registry.insert(aircraft(&format!("FL{n:03}"), 90.0)).unwrap();
        }
        let mut ids: Vec<&str> = registry.iter().map(Aircraft::flight_id).collect();
        ids.sort_unstable();
        assert_eq!(ids.len(), 50);
        assert_eq!(ids[0], "FL000");
        assert_eq!(ids[49], "FL049");

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.bucket_count(), 101);
    }

    #[test]
    fn test_search_mut_edits_in_place() {
        let mut registry = FlightRegistry::default();
        registry.insert(aircraft("EK-1", 30.0)).unwrap();
        registry.search_mut("EK-1").unwrap().update_fuel(-25.0);
        let stored = registry.search("EK-1").unwrap();
        assert_eq!(stored.fuel(), 5.0);
        assert_eq!(stored.priority(), Priority::High);
    }
}
