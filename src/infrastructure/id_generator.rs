// Comment ID generator - time-ordered 64-bit ids
// 64-bit layout: [timestamp_ms:42][node_id:10][sequence:12]

use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::current_time_millis;

const SEQUENCE_BITS: u64 = 12;
const NODE_BITS: u64 = 10;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const NODE_MASK: u64 = (1 << NODE_BITS) - 1;
const TIMESTAMP_MASK: u64 = (1 << 42) - 1;

/// Ids from one generator are strictly increasing, so sorting comments by
/// `(created, id)` is total even within a millisecond. When the wall clock
/// stalls or steps back, the generator keeps counting on its last timestamp.
#[derive(Debug)]
pub struct IdGenerator {
    node_id: u16,
    /// Packed `[timestamp:52][sequence:12]` of the last issued id.
    state: AtomicU64,
}

impl IdGenerator {
    /// Create new ID generator for given node
    pub fn new(node_id: u16) -> Self {
        assert!((node_id as u64) <= NODE_MASK, "Node ID must be less than 1024");

        Self {
            node_id,
            state: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> i64 {
        loop {
            let now = current_time_millis().max(0) as u64;
            let prev = self.state.load(Ordering::Acquire);
            let prev_ts = prev >> SEQUENCE_BITS;
            let prev_seq = prev & SEQUENCE_MASK;

            let (ts, seq) = if now > prev_ts {
                (now, 0)
            } else if prev_seq < SEQUENCE_MASK {
                (prev_ts, prev_seq + 1)
            } else {
                // Sequence exhausted for this millisecond, borrow the next one
                (prev_ts + 1, 0)
            };

            let next = (ts << SEQUENCE_BITS) | seq;
            if self
                .state
                .compare_exchange(prev, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let id = ((ts & TIMESTAMP_MASK) << (NODE_BITS + SEQUENCE_BITS))
                    | ((self.node_id as u64) << SEQUENCE_BITS)
                    | seq;
                return id as i64;
            }
        }
    }

    /// Milliseconds since the Unix epoch at which the id was issued.
    pub fn extract_timestamp(id: i64) -> i64 {
        ((id as u64) >> (NODE_BITS + SEQUENCE_BITS)) as i64
    }
}
