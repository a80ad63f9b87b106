//! Error types for the BES client.

use bes_protocol::PptError;
use thiserror::Error;

/// Errors returned by [`BesClient`](crate::BesClient).
#[derive(Error, Debug)]
pub enum ClientError {
    /// The server could not be reached or refused the handshake.
    ///
    /// Usually means the daemon is not running or listens elsewhere; check
    /// the socket path / host and port.
    #[error("Failed to connect to BES server: {0}")]
    Connect(#[source] PptError),

    /// The connection failed after the handshake.
    #[error("Connection error: {0}")]
    Protocol(#[from] PptError),

    /// Nothing to send.
    #[error("Request is empty")]
    EmptyRequest,

    /// The server asked the client to go away.
    #[error("Server ended the session")]
    ServerExited,
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Returns true if the server side is gone (the connection can't be
    /// reused).
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Connect(_) | Self::ServerExited => true,
            Self::Protocol(e) => e.is_transport(),
            Self::EmptyRequest => false,
        }
    }
}
