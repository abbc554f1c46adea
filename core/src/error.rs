//! Out-of-band errors.
//!
//! Most failures in the engine are values that ride in the stream (see
//! [`crate::types::TypeContext::wrap_error`]). The variants here are the
//! ones that stop a query: cancellation, I/O, malformed input handed to the
//! core, and invariant violations surfaced from worker threads.

use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A record type listed the same field name twice.
    #[error("duplicate field: \"{0}\"")]
    DuplicateField(String),

    /// The query was cancelled while an operator was blocked.
    #[error("query cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Bytes that should hold a canonical encoding could not be decoded.
    #[error("malformed encoding: {0}")]
    Codec(String),

    /// The DAG (or an operator's parameters) failed validation.
    #[error("{0}")]
    Compile(String),

    /// A spill frame could not be written or read back.
    #[error("spill: {0}")]
    Spill(#[from] postcard::Error),

    /// An internal invariant was violated in a worker thread.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn compile(msg: impl Into<String>) -> Self {
        Error::Compile(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Error::Codec(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
