//! Identifier generation error types.

use thiserror::Error;

/// Errors that can occur while generating identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The system clock moved behind the last observed timestamp.
    ///
    /// Emitting an id in this state could duplicate one already handed out,
    /// so the call refuses instead. Issuance must halt until the clock
    /// catches up.
    #[error("clock moved backwards: last observed {last_ms} ms, now {now_ms} ms")]
    ClockRegression {
        /// Millisecond timestamp recorded by the previous call.
        last_ms: u64,
        /// Millisecond timestamp observed by this call.
        now_ms: u64,
    },

    /// Node id does not fit the 10-bit field.
    #[error("node id {0} out of range (max {max})", max = crate::MAX_NODE_ID)]
    NodeOutOfRange(u16),
}
