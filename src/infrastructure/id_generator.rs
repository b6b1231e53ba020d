// ID Generator - Snowflake-like 64-bit ids, time ordered
// Layout: [timestamp:42][node_id:10][sequence:12]

use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::{current_time_millis, EntityId};

/// Custom epoch (2024-01-01T00:00:00Z) keeps ids well inside the positive i64 range.
const EPOCH_MILLIS: u64 = 1_704_067_200_000;
const SEQUENCE_BITS: u64 = 12;
const NODE_BITS: u64 = 10;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const TIMESTAMP_MASK: u64 = (1 << 42) - 1;

/// Ids from one generator are strictly increasing, so ordering by id is a
/// valid tie-break for rows created in the same millisecond.
#[derive(Debug)]
pub struct IdGenerator {
    node_id: u16,
    /// Packed `(timestamp << 12) | sequence` of the last id handed out
    state: AtomicU64,
}

impl IdGenerator {
    pub fn new(node_id: u16) -> Self {
        assert!(u64::from(node_id) < (1 << NODE_BITS), "Node ID must be less than 1024");

        Self {
            node_id,
            state: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> EntityId {
        loop {
            let now = (current_time_millis() as u64).saturating_sub(EPOCH_MILLIS);
            let prev = self.state.load(Ordering::Acquire);
            let prev_ts = prev >> SEQUENCE_BITS;
            let prev_seq = prev & SEQUENCE_MASK;

            // Never step backwards; borrow the next millisecond on sequence overflow
            let next = if now > prev_ts {
                now << SEQUENCE_BITS
            } else if prev_seq < SEQUENCE_MASK {
                prev + 1
            } else {
                (prev_ts + 1) << SEQUENCE_BITS
            };

            if self
                .state
                .compare_exchange(prev, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let timestamp = (next >> SEQUENCE_BITS) & TIMESTAMP_MASK;
                let sequence = next & SEQUENCE_MASK;
                let id = (timestamp << (NODE_BITS + SEQUENCE_BITS))
                    | ((self.node_id as u64) << SEQUENCE_BITS)
                    | sequence;
                return EntityId(id as i64);
            }
        }
    }

}

#[cfg(test)]
impl IdGenerator {
    fn extract_node_id(id: EntityId) -> u16 {
        ((id.0 as u64) >> SEQUENCE_BITS & ((1 << NODE_BITS) - 1)) as u16
    }

    fn extract_timestamp(id: EntityId) -> u64 {
        ((id.0 as u64) >> (NODE_BITS + SEQUENCE_BITS)) + EPOCH_MILLIS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let generator = IdGenerator::new(3);
        let ids: Vec<EntityId> = (0..10_000).map(|_| generator.next_id()).collect();

        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(ids.iter().all(|id| id.0 > 0));
        assert!(ids.iter().all(|id| IdGenerator::extract_node_id(*id) == 3));
    }

    #[test]
    fn test_timestamp_extraction() {
        let generator = IdGenerator::new(0);
        let before = current_time_millis() as u64;
        let id = generator.next_id();
        let after = current_time_millis() as u64;

        let ts = IdGenerator::extract_timestamp(id);
        assert!(ts >= before && ts <= after + 1);
    }

    #[test]
    fn test_concurrent_generation() {
        let generator = Arc::new(IdGenerator::new(1));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || (0..2_000).map(|_| generator.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 8_000);
    }
}
