use std::{error, fmt};

use crate::seeder::BufferLinkState;

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by granulate.
///
/// All errors are local and recoverable: the operation that reported one is a
/// no-op and leaves the engine in a consistent state.
#[derive(Debug)]
pub enum Error {
    /// The free list of an [`IndexPool`](crate::IndexPool) is empty.
    PoolExhausted,
    /// The used list of an [`IndexPool`](crate::IndexPool) is empty.
    PoolEmpty,
    /// An index is outside the valid range of a pool or registry.
    IndexOutOfRange { index: usize, max: usize },
    /// An index was not found in the searched list.
    IndexNotFound(usize),
    /// A seeder's source buffer is not ready for playback.
    BufferNotReady { seeder: usize, state: BufferLinkState },
    /// A buffer operation failed (unknown name, dropped buffer, load failure).
    BufferError(String),
    /// A control parameter is invalid.
    ParameterError(String),
    /// A cross-thread message could not be delivered.
    SendError(String),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolExhausted => write!(f, "Index pool is exhausted"),
            Self::PoolEmpty => write!(f, "Index pool is empty"),
            Self::IndexOutOfRange { index, max } => {
                write!(
                    f,
                    "Index {index} is out of range (max is {})",
                    max.saturating_sub(1)
                )
            }
            Self::IndexNotFound(index) => write!(f, "Index {index} not found"),
            Self::BufferNotReady { seeder, state } => {
                write!(f, "Source buffer for seeder {seeder} is not ready: {state}")
            }
            Self::BufferError(str) => write!(f, "Buffer error: {str}"),
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
            Self::SendError(str) => write!(f, "Failed to send channel message: {str}"),
        }
    }
}
