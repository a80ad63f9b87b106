//! Loadable request-handler modules.
//!
//! A module is a [`RequestHandler`](crate::registry::RequestHandler)
//! registered under its name at startup, plus the services it answers for.
//! Which modules load is decided by `BES.modules`.
//!
//! - `usage` - command help and the server's own version line
//! - `raw` - serves the bytes and file metadata behind `raw` containers

pub mod raw;
pub mod usage;

use tracing::{info, warn};

use crate::config::{ConfigError, ServerSettings};
use crate::registry::Registries;

/// Registers the named modules, in order, and the services each handles.
///
/// Returns the names that were actually added. A module that is already
/// registered is skipped with a warning.
///
/// # Errors
/// - `ConfigError::UnknownModule` for a name no module answers to. Nothing
///   after the bad name is loaded.
/// - `ConfigError::Service` if a module claims a service that was never
///   registered
pub fn load(
    modules: &[String],
    registries: &Registries,
    settings: &ServerSettings,
) -> Result<Vec<String>, ConfigError> {
    let mut loaded = Vec::new();
    for name in modules {
        let (handler, services) = match name.as_str() {
            usage::NAME => (usage::handler(), usage::SERVICES),
            raw::NAME => (raw::handler(settings.root_directory.clone()), raw::SERVICES),
            other => return Err(ConfigError::UnknownModule(other.to_string())),
        };

        if !registries.handlers.add(handler) {
            warn!(module = %name, "Module already loaded, skipping");
            continue;
        }
        for service in services {
            registries.services.handles_service(name, service)?;
        }
        info!(module = %name, services = ?services, "Loaded module");
        loaded.push(name.clone());
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registries() -> Registries {
        let registries = Registries::new();
        crate::commands::register_dap_service(&registries.services).unwrap();
        registries
    }

    #[test]
    fn test_load_defaults() {
        let registries = registries();
        let settings = ServerSettings::default();

        let loaded = load(&settings.modules, &registries, &settings).unwrap();
        assert_eq!(loaded, vec!["usage", "raw"]);
        assert_eq!(registries.handlers.handler_names(), vec!["usage", "raw"]);
        assert!(registries.services.does_handle_service("raw", "dap"));
        assert!(registries.services.services_handled("usage").is_empty());

        // Second load adds nothing.
        assert!(load(&settings.modules, &registries, &settings)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_raw_needs_dap_service() {
        let registries = Registries::new();
        let modules = vec!["raw".to_string()];

        let err = load(&modules, &registries, &ServerSettings::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Service(_)));
    }

    #[test]
    fn test_unknown_module() {
        let registries = registries();
        let modules = vec!["usage".to_string(), "netcdf".to_string()];

        let err = load(&modules, &registries, &ServerSettings::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModule(ref m) if m == "netcdf"));
        assert_eq!(registries.handlers.handler_names(), vec!["usage"]);
    }
}
