//! Error types for the PPT protocol layer.
//!
//! Every variant except `MessageTooLarge` is fatal to the connection it
//! occurred on. The two groups are kept apart so callers can log them
//! differently:
//! - transport errors: socket, resolve, connect, read/write, oversized chunks
//! - protocol errors: bad headers, malformed extensions, handshake failures

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by chunk framing, the handshake and client connections.
#[derive(Error, Debug)]
pub enum PptError {
    #[error("length of chunk to send {len} is too big (max: {max})")]
    ChunkTooLarge { len: usize, max: usize },

    #[error("chunk length {0} cannot be encoded in a 7 digit header")]
    LengthOutOfRange(usize),

    #[error("bad hex value specified {field:?}")]
    BadLength { field: String },

    #[error("specified chunk type {0:?} should be 'd' or 'x'")]
    BadChunkType(char),

    #[error("malformed extensions, missing semicolon in {0}")]
    MalformedExtensions(String),

    #[error("socket failure, reading on stream socket: {0}")]
    Read(#[source] io::Error),

    #[error("socket failure, writing on stream socket: {0}")]
    Write(#[source] io::Error),

    #[error("connection closed by peer")]
    Closed,

    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out connecting to {endpoint} after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("connection to {endpoint} refused")]
    Refused {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to close socket: {0}")]
    Close(#[source] io::Error),

    #[error("Could not connect to server, server may be down or busy")]
    ServerUnavailable,

    #[error("Server reported an invalid connection \"{0}\"")]
    UnexpectedToken(String),

    #[error("message exceeds the {limit} byte limit")]
    MessageTooLarge { limit: usize },

    #[error("message is not valid UTF-8")]
    NotUtf8,

    #[error("authentication is not yet implemented")]
    AuthenticationNotImplemented,
}

impl PptError {
    /// Returns true for socket-level failures (as opposed to protocol
    /// violations by the peer).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ChunkTooLarge { .. }
                | Self::LengthOutOfRange(_)
                | Self::Read(_)
                | Self::Write(_)
                | Self::Closed
                | Self::Resolve { .. }
                | Self::Timeout { .. }
                | Self::Refused { .. }
                | Self::Connect { .. }
                | Self::Close(_)
        )
    }

    /// Returns true if the peer went away cleanly (EOF at a chunk boundary).
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_too_large_display() {
        let err = PptError::ChunkTooLarge {
            len: 70_000,
            max: 65_535,
        };
        assert!(err.to_string().contains("70000"));
        assert!(err.is_transport());
    }

    #[test]
    fn test_protocol_errors_are_not_transport() {
        assert!(!PptError::BadChunkType('z').is_transport());
        assert!(!PptError::MalformedExtensions("a=b".to_string()).is_transport());
        assert!(!PptError::AuthenticationNotImplemented.is_transport());
    }
}
