//! # Sentry Idgen
//!
//! Collision-free 64-bit identifier generation.
//!
//! Identifiers pack a millisecond timestamp, a node id, and a per-millisecond
//! sequence counter into a single `u64`:
//!
//! ```text
//! | 1 bit unused | 41 bits timestamp | 10 bits node id | 12 bits sequence |
//! ```
//!
//! The timestamp is relative to the service epoch (2019-10-01T00:00:00Z).
//! For a fixed node id, emitted identifiers are strictly increasing; no two
//! concurrent calls on the same generator ever return the same value. If the
//! system clock steps backwards the generator refuses to emit rather than
//! risk a duplicate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;

pub use error::IdError;

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Service epoch: 2019-10-01T00:00:00Z in Unix milliseconds.
const SERVICE_EPOCH_MS: u64 = 1_569_888_000_000;

/// Bit widths of the id fields.
const TIMESTAMP_BITS: u8 = 41;
const NODE_BITS: u8 = 10;
const SEQUENCE_BITS: u8 = 12;

/// Largest node id that fits the node field.
pub const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;

/// Largest per-millisecond sequence value.
const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

/// Mutable generator state, guarded by a single mutex.
///
/// The atomicity unit is exactly one `next_id` call; no caller can observe
/// a partially updated (timestamp, sequence) pair.
struct Inner {
    last_ms: u64,
    sequence: u16,
}

/// Generator of unique, monotonically increasing 64-bit identifiers.
///
/// One instance is created at process start with the node id fixed for the
/// process lifetime, then shared (e.g. behind an `Arc`) by every component
/// that needs ids.
pub struct IdGenerator {
    node_id: u16,
    inner: Mutex<Inner>,
}

impl IdGenerator {
    /// Creates a generator for the given node id.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::NodeOutOfRange`] if `node_id` exceeds
    /// [`MAX_NODE_ID`].
    pub fn new(node_id: u16) -> Result<Self, IdError> {
        if node_id > MAX_NODE_ID {
            return Err(IdError::NodeOutOfRange(node_id));
        }

        Ok(Self {
            node_id,
            inner: Mutex::new(Inner {
                last_ms: 0,
                sequence: 0,
            }),
        })
    }

    /// Returns the node id this generator was created with.
    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    /// Returns the next unique identifier.
    ///
    /// Callable concurrently from many threads or tasks. The only blocking
    /// is a bounded spin when the 4096-id sequence space of the current
    /// millisecond is exhausted, which lasts until the clock ticks over.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::ClockRegression`] if the system clock is behind
    /// the timestamp of the previously emitted id. The caller must treat
    /// this as a process-level fault and halt issuance; the generator
    /// recovers on its own once the clock passes the recorded timestamp.
    pub fn next_id(&self) -> Result<u64, IdError> {
        let mut inner = self.inner.lock().expect("id generator lock poisoned");

        let mut now_ms = Self::now_ms();

        if now_ms < inner.last_ms {
            return Err(IdError::ClockRegression {
                last_ms: inner.last_ms,
                now_ms,
            });
        }

        if now_ms == inner.last_ms {
            if inner.sequence == MAX_SEQUENCE {
                // Sequence space for this tick is spent; wait out the
                // remainder of the millisecond.
                while now_ms <= inner.last_ms {
                    std::hint::spin_loop();
                    now_ms = Self::now_ms();
                }
                inner.last_ms = now_ms;
                inner.sequence = 0;
            } else {
                inner.sequence += 1;
            }
        } else {
            inner.last_ms = now_ms;
            inner.sequence = 0;
        }

        Ok(Self::compose(
            inner.last_ms - SERVICE_EPOCH_MS,
            self.node_id,
            inner.sequence,
        ))
    }

    /// Packs the three fields into a single identifier.
    fn compose(elapsed_ms: u64, node_id: u16, sequence: u16) -> u64 {
        debug_assert!(elapsed_ms < (1 << TIMESTAMP_BITS));
        (elapsed_ms << (NODE_BITS + SEQUENCE_BITS))
            | ((node_id as u64) << SEQUENCE_BITS)
            | sequence as u64
    }

    /// Current Unix time in milliseconds.
    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX epoch")
            .as_millis() as u64
    }

    /// Forces the recorded timestamp forward, simulating a clock that has
    /// since stepped backwards.
    #[cfg(test)]
    fn pin_last_ms(&self, last_ms: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.last_ms = last_ms;
        inner.sequence = 0;
    }
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator")
            .field("node_id", &self.node_id)
            .finish()
    }
}

/// Extracts the (elapsed_ms, node_id, sequence) fields of an identifier.
///
/// Mostly useful for diagnostics and tests; the id is otherwise opaque.
pub fn decompose(id: u64) -> (u64, u16, u16) {
    let elapsed_ms = id >> (NODE_BITS + SEQUENCE_BITS);
    let node_id = ((id >> SEQUENCE_BITS) & MAX_NODE_ID as u64) as u16;
    let sequence = (id & MAX_SEQUENCE as u64) as u16;
    (elapsed_ms, node_id, sequence)
}
