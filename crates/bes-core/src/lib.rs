//! BES Core - Shared types for the BES data server
//!
//! This crate provides the domain types shared between the daemon (besd)
//! and its modules: the per-request context threaded through dispatch,
//! response objects, containers/definitions and the per-connection session
//! store. It performs no I/O.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod container;
pub mod context;
pub mod error;
pub mod response;
pub mod session;

// Re-exports for convenience
pub use container::{Container, Definition, DEFAULT_CONTAINER_TYPE, DEFAULT_STORE};
pub use context::RequestContext;
pub use error::{DispatchError, DispatchResult, ErrorKind};
pub use response::{
    DataItem, DataResponse, ErrorResponse, InfoEntry, InfoResponse, InfoSection, ModuleVersion,
    ResponseObject, StatusResponse, TextResponse, VersionResponse,
};
pub use session::Session;
