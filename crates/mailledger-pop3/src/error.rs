//! Error types for POP3 operations.

use std::io;
use std::time::Duration;

/// Result type alias for POP3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// POP3 error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the transport (includes the server closing the connection).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Connecting to the server timed out.
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// Malformed line or unexpected response shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server rejected the credentials or does not support the scheme.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Operation attempted in the wrong session state.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),

    /// Server answered `-ERR` to a retrieval command.
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// Server answered `-ERR` to any other command.
    #[error("Server rejected command: {0}")]
    Rejected(String),
}

impl Error {
    /// Returns true if the error leaves the session unusable.
    ///
    /// Transport failures and protocol violations desynchronize the
    /// request/response stream, so nothing more can be sent on it.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Tls(_)
                | Self::InvalidDnsName(_)
                | Self::Timeout(_)
                | Self::Protocol(_)
        )
    }

    /// Returns true if this is an authentication failure.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}
