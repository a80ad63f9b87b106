//! Request-level error type.

use bes_core::DispatchError;
use bes_protocol::PptError;
use thiserror::Error;

/// Failure while executing a request.
///
/// `Dispatch` errors are reported to the client and the connection carries
/// on. `Transport` errors end the connection.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("transport failure: {0}")]
    Transport(#[from] PptError),
}
