//! BES Daemon - command dispatch over the PPT protocol
//!
//! This crate provides the daemon side of the data server:
//! - `config` - key/value configuration and the typed server settings
//! - `request` - request text tokenizer and statement parser
//! - `registry` - command, request-handler, transmitter and service registries
//! - `dispatch` - runs a request through the registries
//! - `commands` - built-in `show`/`set`/`define`/`delete`/`get` commands
//! - `modules` - built-in request handlers (`usage`, `raw`)
//! - `transmit` - built-in transmitters (`basic`, `html`, `json`)
//! - `server` - Unix/TCP socket server and per-connection handler
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          besd                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │   BesServer     │────▶│        Dispatcher           │    │
//! │  │ (Unix/TCP)      │     │  parse → command → handlers │    │
//! │  └────────┬────────┘     └──────────────┬──────────────┘    │
//! │           │                             │                   │
//! │           │ connections                 │ response object   │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │ConnectionHandler│◀────│   TransmitterRegistry       │    │
//! │  │  (per client)   │     │   (serialize into sink)     │    │
//! │  └─────────────────┘     └─────────────────────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! Production code in this crate follows a panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Registry locks recover from poisoning instead of panicking

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod modules;
pub mod registry;
pub mod request;
pub mod server;
pub mod status;
pub mod transmit;

use std::sync::Arc;

pub use config::{Config, ConfigError, ServerSettings};
pub use dispatch::{Dispatcher, RequestOutcome};
pub use registry::Registries;
pub use server::{BesServer, ServerError};
pub use status::ServerStatus;

/// Builds the registries a configured daemon runs with: built-in commands,
/// the `dap` service, transmitters and the modules named in `settings`.
///
/// # Errors
/// `ConfigError::UnknownModule` if `settings.modules` names an unknown
/// module, `ConfigError::Service` for an inconsistent service registration,
/// or `ConfigError::InvalidValue` if the default transmitter is not one of
/// the registered protocols.
pub fn build_dispatcher(settings: &ServerSettings) -> Result<Dispatcher, ConfigError> {
    let registries = Registries::new();
    commands::register_builtin(&registries.commands);
    commands::register_dap_service(&registries.services)?;
    transmit::register_builtin(&registries.transmitters);
    transmit::register_formats(&registries)?;
    modules::load(&settings.modules, &registries, settings)?;

    if !registries.transmitters.contains(&settings.default_transmitter) {
        return Err(ConfigError::InvalidValue {
            key: config::keys::DEFAULT_TRANSMITTER.to_string(),
            value: settings.default_transmitter.clone(),
            expected: "a registered transmit protocol",
        });
    }

    Ok(Dispatcher::from_settings(
        Arc::new(registries),
        Arc::new(ServerStatus::new()),
        settings,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_dispatcher_defaults() {
        let dispatcher = build_dispatcher(&ServerSettings::default()).unwrap();
        assert_eq!(dispatcher.default_transmitter(), "basic");
        assert_eq!(
            dispatcher.registries().handlers.handler_names(),
            vec!["usage", "raw"]
        );
        assert!(dispatcher.registries().commands.contains("get"));
        assert!(dispatcher
            .registries()
            .services
            .service_available("dap", Some("dds"), Some("json")));
    }

    #[test]
    fn test_build_dispatcher_rejects_unknown_transmitter() {
        let settings = ServerSettings {
            default_transmitter: "xml".to_string(),
            ..ServerSettings::default()
        };
        assert!(matches!(
            build_dispatcher(&settings),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
