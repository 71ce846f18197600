// channel error types.
//
// channels are never closed, so the only way a channel operation can fail is by not completing
// in time when the caller asked for no or limited blocking.

use thiserror::Error;


/// Error for attempting to use a channel with no or limited blocking, and the operation not
/// completing immediately or by the specified deadline
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Error)]
#[error("channel operation would block")]
pub struct WouldBlockError;

/// Error for trying to put into a channel with no or limited blocking
///
/// Gives back the value that could not be put.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Error)]
#[error("channel put would block")]
pub struct TryPutError<T> {
    /// The value that could not be put
    pub value: T,
    /// The reason the value could not be put
    #[source]
    pub cause: WouldBlockError,
}

impl<T> TryPutError<T> {
    pub(crate) fn new(value: T) -> Self {
        TryPutError { value, cause: WouldBlockError }
    }

    /// Take back the value that could not be put
    pub fn into_inner(self) -> T {
        self.value
    }
}
