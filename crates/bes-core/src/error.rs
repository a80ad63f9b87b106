//! Dispatch error taxonomy.
//!
//! Everything here is caught at the request boundary and turned into an
//! error response for the client. Two variants are internal: they mean a
//! module registered itself inconsistently, not that the client sent
//! something wrong.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors raised while parsing and executing a client request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No command registered under this name
    #[error("no such command: {0}")]
    UnknownCommand(String),

    /// Request text could not be parsed
    #[error("syntax error: {0}")]
    Syntax(String),

    /// No request handler registered under this name
    #[error("the data handler '{0}' does not exist")]
    UnknownHandler(String),

    /// Handler exists but never registered this method
    #[error("method '{method}' not found in handler '{handler}'")]
    MethodNotFound { handler: String, method: String },

    /// Transmit protocol or its method is missing
    #[error("unable to transmit, no transmitter for method {method} (protocol {protocol})")]
    NoTransmitter { protocol: String, method: String },

    /// A container or definition named by the client does not exist
    #[error("{kind} '{name}' does not exist")]
    NotFound { kind: &'static str, name: String },

    /// A handler method ran and failed
    #[error("{handler} failed to build {method}: {reason}")]
    HandlerFailed {
        handler: String,
        method: String,
        reason: String,
    },

    /// Any other registration or wiring bug
    #[error("{0}")]
    Internal(String),
}

impl DispatchError {
    /// Builds a syntax error.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    /// Returns true for registration bugs, which are logged at `error`.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::MethodNotFound { .. } | Self::NoTransmitter { .. } | Self::Internal(_)
        )
    }

    /// Category reported to the client.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownCommand(_) | Self::Syntax(_) => ErrorKind::Syntax,
            Self::UnknownHandler(_) | Self::NotFound { .. } => ErrorKind::NotFound,
            Self::HandlerFailed { .. } => ErrorKind::Handler,
            Self::MethodNotFound { .. } | Self::NoTransmitter { .. } | Self::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Error category carried by an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Syntax,
    NotFound,
    Handler,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::NotFound => "not found",
            Self::Handler => "handler",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_classification() {
        let missing = DispatchError::MethodNotFound {
            handler: "raw".to_string(),
            method: "show.help".to_string(),
        };
        assert!(missing.is_internal());
        assert!(missing.to_string().contains("not found"));

        let no_tx = DispatchError::NoTransmitter {
            protocol: "basic".to_string(),
            method: "dmr".to_string(),
        };
        assert!(no_tx.is_internal());
        assert!(no_tx
            .to_string()
            .starts_with("unable to transmit, no transmitter for method dmr"));

        assert!(!DispatchError::UnknownCommand("frob".to_string()).is_internal());
        assert!(!DispatchError::UnknownHandler("nc".to_string()).is_internal());
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(DispatchError::syntax("x").kind(), ErrorKind::Syntax);
        assert_eq!(
            DispatchError::NotFound {
                kind: "container",
                name: "c".to_string()
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(ErrorKind::NotFound.to_string(), "not found");
    }
}
