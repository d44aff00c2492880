//! Errors reported by the `try_*` buffer entry points.
//!
//! The sticky `successful` flag stays the primary failure channel; these
//! values only describe, per call, why a call did nothing.

use thiserror::Error;

/// Why a buffer operation did not take effect.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum BufferError {
    /// An earlier operation already failed and the buffer ignores mutations
    /// until it is cleared.
    #[error("buffer is poisoned by an earlier failure")]
    Poisoned,

    /// The buffer was made immutable.
    #[error("buffer is immutable")]
    Immutable,

    /// Growing the buffer would exceed the ceiling computed on `enter`.
    #[error("requested capacity {requested} exceeds the limit of {max_len}")]
    CapacityExceeded {
        /// Requested number of items.
        requested: usize,
        /// Current ceiling.
        max_len: usize,
    },

    /// The allocator refused to grow the storage, or the byte size
    /// overflowed.
    #[error("allocation failed")]
    AllocationFailed,

    /// The operation budget computed on `enter` ran out.
    #[error("operation limit exceeded")]
    OperationLimitExceeded,

    /// Arguments do not describe a valid range of the input, or there is
    /// no item for the call to act on.
    #[error("invalid range")]
    InvalidRange,

    /// The call needs output mode, started by `clear_output`.
    #[error("buffer has no output in progress")]
    OutputInactive,
}
