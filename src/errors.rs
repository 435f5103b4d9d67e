//! [`Error`][core::error::Error] implementations used across the crate

#[cfg(feature = "reqwest")]
pub mod reqwest;
#[cfg(feature = "reqwest")]
pub use self::reqwest::{CantCloneError, Error};

/// Failure while turning a byte stream into events.
///
/// Malformed lines are never an error, the only thing that can go wrong is the stream underneath.
#[derive(Debug, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum EventStreamError<E> {
    /// Something went wrong with the underlying stream
    #[error(transparent)]
    Transport(E),
}

impl<E> EventStreamError<E> {
    /// The error from the underlying stream
    pub fn into_inner(self) -> E {
        match self {
            EventStreamError::Transport(e) => e,
        }
    }
}
