//! Error types shared across the postern crates.

use std::io;

use thiserror::Error;

/// Failure reported by a transaction-processor hook.
///
/// Any such failure is internal to the processor; the session is terminated
/// without a reply and the error is logged.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProcessorError(Box<dyn std::error::Error + Send + Sync>);

impl ProcessorError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(err.into())
    }
}

/// Errors that can occur while serving a single connection.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport failed (read, write, or unexpected close).
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),

    /// A per-operation deadline expired.
    #[error("session timed out after {0} seconds")]
    Timeout(u64),

    /// The transaction processor reported an internal failure.
    #[error("transaction processor failure: {0}")]
    Processor(#[from] ProcessorError),

    /// Shutdown signal received.
    #[error("shutdown requested")]
    Shutdown,
}

impl SessionError {
    /// Returns `true` if the error indicates a graceful shutdown.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }

    /// Returns `true` if the error is a client-side issue.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

/// Errors that can occur in a listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to socket address.
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    AcceptFailed(#[from] io::Error),
}
