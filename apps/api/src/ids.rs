//! Snowflake-style id allocation.
//!
//! Layout (most significant first): 41 bits of milliseconds since [`EPOCH_MS`],
//! 10 bits of node id, 12 bits of per-millisecond sequence. Resume ids are
//! allocated before any external work starts, so clients can hold on to them
//! while the asynchronous flow is still running.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// 2010-11-04T01:42:54.657Z, the conventional snowflake epoch.
pub const EPOCH_MS: i64 = 1_288_834_974_657;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_NODE: u16 = (1 << NODE_BITS) - 1;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug)]
struct State {
    last_ms: i64,
    sequence: i64,
}

/// Process-local id allocator. Construct one per process and share it by `Arc`.
#[derive(Debug)]
pub struct IdAllocator {
    node: i64,
    state: Mutex<State>,
}

impl IdAllocator {
    /// Node ids above 1023 are masked into range.
    pub fn new(node: u16) -> Self {
        Self {
            node: i64::from(node & MAX_NODE),
            state: Mutex::new(State {
                last_ms: 0,
                sequence: 0,
            }),
        }
    }

    pub fn next_id(&self) -> i64 {
        loop {
            if let Some(id) = self.try_next() {
                return id;
            }
            std::thread::yield_now();
        }
    }

    /// Allocates from the current millisecond, or returns `None` when its
    /// sequence is used up. The lock is never held while waiting.
    fn try_next(&self) -> Option<i64> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        // A clock that steps backwards keeps issuing from the last seen millisecond.
        let now = current_ms().max(state.last_ms);
        if now == state.last_ms {
            if state.sequence == SEQUENCE_MASK {
                return None;
            }
            state.sequence += 1;
        } else {
            state.sequence = 0;
        }
        state.last_ms = now;

        Some(
            ((now - EPOCH_MS) << (NODE_BITS + SEQUENCE_BITS))
                | (self.node << SEQUENCE_BITS)
                | state.sequence,
        )
    }
}

fn current_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(EPOCH_MS)
}
