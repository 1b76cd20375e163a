//! Landing queue: bounded binary min-heap ordered by priority.
//!
//! Each slot carries the flight id plus the priority it is ordered by. A
//! side index maps flight id to slot so priority changes re-heapify in
//! O(log n); every swap updates both slots in the index.

use crate::error::{AirspaceError, AirspaceResult};
use crate::models::Priority;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A flight waiting to land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub flight_id: String,
    pub priority: Priority,
}

#[derive(Debug, Clone)]
pub struct LandingScheduler {
    heap: Vec<QueueEntry>,
    slots: HashMap<String, usize>,
    capacity: usize,
}

impl LandingScheduler {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            slots: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    pub fn contains(&self, flight_id: &str) -> bool {
        self.slots.contains_key(flight_id)
    }

    /// Entries in heap array order (root first).
    pub fn entries(&self) -> &[QueueEntry] {
        &self.heap
    }

    /// Queue a flight. Fails when full or when the flight is already queued.
    pub fn insert(&mut self, flight_id: impl Into<String>, priority: Priority) -> AirspaceResult<()> {
        let flight_id = flight_id.into();
        if self.is_full() {
            return Err(AirspaceError::CapacityExceeded {
                what: "landing queue",
                capacity: self.capacity,
            });
        }
        if self.slots.contains_key(&flight_id) {
            return Err(AirspaceError::DuplicateKey(flight_id));
        }

        let index = self.heap.len();
        self.slots.insert(flight_id.clone(), index);
        self.heap.push(QueueEntry {
            flight_id,
            priority,
        });
        self.sift_up(index);
        Ok(())
    }

    /// Most urgent flight without removing it.
    pub fn peek(&self) -> Option<&QueueEntry> {
        self.heap.first()
    }

    /// Remove and return the most urgent flight.
    pub fn extract_min(&mut self) -> Option<QueueEntry> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.swap(0, last);
        let min = self.heap.pop()?;
        self.slots.remove(&min.flight_id);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        tracing::debug!(flight_id = %min.flight_id, priority = ?min.priority, "extracted from landing queue");
        Some(min)
    }

    /// Set a new priority and restore heap order in whichever direction
    /// the change requires.
    pub fn update_priority(&mut self, flight_id: &str, priority: Priority) -> AirspaceResult<()> {
        let index = self.index_of(flight_id)?;
        let old = self.heap[index].priority;
        self.heap[index].priority = priority;
        if priority < old {
            self.sift_up(index);
        } else {
            self.sift_down(index);
        }
        Ok(())
    }

    /// Make a flight more urgent. Returns `Ok(false)` when `priority` is not
    /// strictly more urgent than the current one.
    pub fn decrease_key(&mut self, flight_id: &str, priority: Priority) -> AirspaceResult<bool> {
        let index = self.index_of(flight_id)?;
        if priority >= self.heap[index].priority {
            return Ok(false);
        }
        self.heap[index].priority = priority;
        self.sift_up(index);
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.slots.clear();
    }

    fn index_of(&self, flight_id: &str) -> AirspaceResult<usize> {
        self.slots
            .get(flight_id)
            .copied()
            .ok_or_else(|| AirspaceError::FlightNotFound(flight_id.to_string()))
    }

    fn swap(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        self.heap.swap(i, j);
        self.slots.insert(self.heap[i].flight_id.clone(), i);
        self.slots.insert(self.heap[j].flight_id.clone(), j);
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.heap[index].priority < self.heap[parent].priority {
                self.swap(index, parent);
                index = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;

            if left < len && self.heap[left].priority < self.heap[smallest].priority {
                smallest = left;
            }
            if right < len && self.heap[right].priority < self.heap[smallest].priority {
                smallest = right;
            }
            if smallest == index {
                break;
            }
            self.swap(index, smallest);
            index = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_heap(scheduler: &LandingScheduler) {
        let entries = scheduler.entries();
        for (i, entry) in entries.iter().enumerate() {
            for child in [2 * i + 1, 2 * i + 2] {
                if let Some(child) = entries.get(child) {
                    assert!(entry.priority <= child.priority, "heap order broken at slot {i}");
                }
            }
            assert_eq!(scheduler.slots.get(&entry.flight_id), Some(&i));
        }
        assert_eq!(scheduler.slots.len(), entries.len());
    }

    #[test]
    fn test_extracts_in_priority_order() {
        let mut scheduler = LandingScheduler::new(10);
        scheduler.insert("MED", Priority::Medium).unwrap();
        scheduler.insert("LOW", Priority::Low).unwrap();
        scheduler.insert("CRIT", Priority::Critical).unwrap();

        assert_eq!(scheduler.peek().map(|e| e.flight_id.as_str()), Some("CRIT"));
        let order: Vec<Priority> = std::iter::from_fn(|| scheduler.extract_min())
            .map(|entry| entry.priority)
            .collect();
        assert_eq!(order, vec![Priority::Critical, Priority::Medium, Priority::Low]);
        assert!(scheduler.extract_min().is_none());
        assert!(scheduler.peek().is_none());
    }

    #[test]
    fn test_capacity_and_duplicates_are_rejected() {
        let mut scheduler = LandingScheduler::new(2);
        scheduler.insert("A", Priority::Low).unwrap();
        assert!(matches!(
            scheduler.insert("A", Priority::High),
            Err(AirspaceError::DuplicateKey(_))
        ));
        scheduler.insert("B", Priority::Low).unwrap();
        assert!(matches!(
            scheduler.insert("C", Priority::Critical),
            Err(AirspaceError::CapacityExceeded { capacity: 2, .. })
        ));
        assert_eq!(scheduler.len(), 2);
        assert!(!scheduler.contains("C"));
    }

    #[test]
    fn test_update_priority_moves_both_directions() {
        let mut scheduler = LandingScheduler::new(10);
        for (id, priority) in [
            ("A", Priority::Low),
            ("B", Priority::Medium),
            ("C", Priority::Low),
            ("D", Priority::High),
        ] {
            scheduler.insert(id, priority).unwrap();
        }

        scheduler.update_priority("C", Priority::Critical).unwrap();
        assert_heap(&scheduler);
        assert_eq!(scheduler.peek().unwrap().flight_id, "C");

        scheduler.update_priority("C", Priority::Low).unwrap();
        assert_heap(&scheduler);
        assert_eq!(scheduler.peek().unwrap().flight_id, "D");

        assert!(matches!(
            scheduler.update_priority("ZZ", Priority::High),
            Err(AirspaceError::FlightNotFound(_))
        ));
    }

    #[test]
    fn test_decrease_key_only_accepts_more_urgent() {
        let mut scheduler = LandingScheduler::new(4);
        scheduler.insert("A", Priority::Medium).unwrap();
        scheduler.insert("B", Priority::Low).unwrap();

        assert!(!scheduler.decrease_key("B", Priority::Low).unwrap());
        assert!(!scheduler.decrease_key("A", Priority::Low).unwrap());
        assert!(scheduler.decrease_key("B", Priority::High).unwrap());
        assert_eq!(scheduler.peek().unwrap().flight_id, "B");
        assert_heap(&scheduler);
    }

    #[test]
    fn test_heap_property_survives_mixed_operations() {
        let priorities = [Priority::Critical, Priority::High, Priority::Medium, Priority::Low];
        let mut scheduler = LandingScheduler::new(64);
        // Deterministic pseudo-random sequence.
        let mut state: u32 = 0x2545_f491;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };

        for round in 0..400 {
            match next() % 4 {
                0 | 1 if !scheduler.is_full() => {
                    let priority = priorities[(next() % 4) as usize];
                    scheduler.insert(format!("F{round}"), priority).unwrap();
                }
                2 => {
                    let before = scheduler.peek().map(|e| e.priority);
                    let extracted = scheduler.extract_min().map(|e| e.priority);
                    assert_eq!(before, extracted);
                }
                _ => {
                    if let Some(entry) = scheduler.entries().get(next() as usize % scheduler.len().max(1)) {
                        let id = entry.flight_id.clone();
                        let priority = priorities[(next() % 4) as usize];
                        scheduler.update_priority(&id, priority).unwrap();
                    }
                }
            }
            assert_heap(&scheduler);
        }
    }

    #[test]
    fn test_clear_empties_queue_and_index() {
        let mut scheduler = LandingScheduler::new(4);
        scheduler.insert("A", Priority::Low).unwrap();
        scheduler.clear();
        assert!(scheduler.is_empty());
        assert!(!scheduler.contains("A"));
        scheduler.insert("A", Priority::Low).unwrap();
    }
}
