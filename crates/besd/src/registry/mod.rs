//! Command, request handler, transmitter and service registries.
//!
//! The registries are built once at startup, wrapped in a single
//! [`Registries`] value and shared by `Arc` with every connection.
//!
//! # Architecture
//!
//! ```text
//! "get dds for d;"
//!        │
//!        ▼
//! ┌─────────────────┐  command key   ┌──────────────────┐
//! │   Dispatcher    │───────────────▶│ CommandRegistry  │
//! └───────┬─────────┘                └──────────────────┘
//!         │ response key (dds, show.version, ...)
//!         ▼
//! ┌─────────────────┐  fills ResponseObject
//! │ HandlerRegistry │  (one handler per container type / module)
//! └───────┬─────────┘
//!         │ protocol + method key
//!         ▼
//! ┌─────────────────────┐  writes chunks
//! │ TransmitterRegistry │─────────────────▶ client
//! └─────────────────────┘
//! ```
//!
//! `get` also consults the [`ServiceRegistry`] to check that the response
//! type exists and that the chosen protocol can return it.
//!
//! Mutation (add/remove) is expected only at startup and shutdown, but each
//! registry sits behind a `std::sync::RwLock` so a late registration cannot
//! race with dispatch. Lock guards never live across an `.await`: lookups
//! clone an `Arc` out and release the lock.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - A poisoned lock is recovered with `PoisonError::into_inner`; registry
//!   maps are only mutated by single `insert`/`remove` calls, so they are
//!   never left half-updated

mod commands;
mod handlers;
mod services;
mod transmitters;

pub use commands::{Command, CommandHandler, CommandRegistry};
pub use handlers::{HandlerMethod, HandlerRegistry, RequestHandler};
pub use services::{ServiceCommand, ServiceError, ServiceRegistry};
pub use transmitters::{Render, TransmitMethod, Transmitter, TransmitterRegistry};

/// All registries for one daemon.
#[derive(Default)]
pub struct Registries {
    pub commands: CommandRegistry,
    pub handlers: HandlerRegistry,
    pub transmitters: TransmitterRegistry,
    pub services: ServiceRegistry,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }
}
