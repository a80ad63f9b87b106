//! Service registry.
//!
//! A service is a named group of commands a client can ask for with `get`.
//! The `dap` service, for instance, has `das`, `dds`, `dmr` and `data`.
//! Each command carries a description and the transmit protocols
//! ("formats") able to return it. Request handlers declare which services
//! they fill in.
//!
//! `get` validates against this registry before any handler runs, so a
//! request for a command or format nobody registered is a client error and
//! never reaches the transmitter lookup.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use bes_core::InfoResponse;
use thiserror::Error;
use tracing::debug;

/// Registration mistakes. These surface at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("service {0} has already been registered")]
    AlreadyRegistered(String),

    #[error("service {0} has not been registered")]
    UnknownService(String),

    #[error("command {command} already exists in service {service}")]
    CommandExists { service: String, command: String },

    #[error("command {command} is not part of service {service}")]
    UnknownCommand { service: String, command: String },

    #[error("format {format} is already registered for {service} {command}")]
    FormatExists {
        service: String,
        command: String,
        format: String,
    },
}

/// One command of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCommand {
    pub description: String,
    pub formats: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct ServiceTable {
    /// service -> command -> description and formats
    services: BTreeMap<String, BTreeMap<String, ServiceCommand>>,
    /// handler -> services it fills in
    handles: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug, Default)]
pub struct ServiceRegistry {
    table: RwLock<ServiceTable>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service(&self, name: &str) -> Result<(), ServiceError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if table.services.contains_key(name) {
            return Err(ServiceError::AlreadyRegistered(name.to_string()));
        }
        table.services.insert(name.to_string(), BTreeMap::new());
        debug!(service = name, "Registered service");
        Ok(())
    }

    /// Adds a command, with no formats yet, to an existing service.
    pub fn add_to_service(
        &self,
        service: &str,
        command: &str,
        description: &str,
    ) -> Result<(), ServiceError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let commands = table
            .services
            .get_mut(service)
            .ok_or_else(|| ServiceError::UnknownService(service.to_string()))?;
        if commands.contains_key(command) {
            return Err(ServiceError::CommandExists {
                service: service.to_string(),
                command: command.to_string(),
            });
        }
        commands.insert(
            command.to_string(),
            ServiceCommand {
                description: description.to_string(),
                formats: BTreeSet::new(),
            },
        );
        Ok(())
    }

    /// Records that `format` can return `command` of `service`.
    pub fn add_format(&self, service: &str, command: &str, format: &str) -> Result<(), ServiceError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let entry = table
            .services
            .get_mut(service)
            .ok_or_else(|| ServiceError::UnknownService(service.to_string()))?
            .get_mut(command)
            .ok_or_else(|| ServiceError::UnknownCommand {
                service: service.to_string(),
                command: command.to_string(),
            })?;
        if !entry.formats.insert(format.to_string()) {
            return Err(ServiceError::FormatExists {
                service: service.to_string(),
                command: command.to_string(),
                format: format.to_string(),
            });
        }
        Ok(())
    }

    /// Removes a service and every handler's claim to it.
    pub fn remove_service(&self, name: &str) -> bool {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if table.services.remove(name).is_none() {
            return false;
        }
        for services in table.handles.values_mut() {
            services.remove(name);
        }
        true
    }

    /// True if `service` exists and, when given, has `command`, and that
    /// command can be returned as `format`.
    pub fn service_available(&self, service: &str, command: Option<&str>, format: Option<&str>) -> bool {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let Some(commands) = table.services.get(service) else {
            return false;
        };
        let Some(command) = command else {
            return true;
        };
        match (commands.get(command), format) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(entry), Some(format)) => entry.formats.contains(format),
        }
    }

    /// Declares that `handler` fills in the responses of `service`.
    pub fn handles_service(&self, handler: &str, service: &str) -> Result<(), ServiceError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if !table.services.contains_key(service) {
            return Err(ServiceError::UnknownService(service.to_string()));
        }
        table
            .handles
            .entry(handler.to_string())
            .or_default()
            .insert(service.to_string());
        Ok(())
    }

    pub fn does_handle_service(&self, handler: &str, service: &str) -> bool {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .handles
            .get(handler)
            .is_some_and(|services| services.contains(service))
    }

    /// Services declared by `handler`, sorted.
    pub fn services_handled(&self, handler: &str) -> Vec<String> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .handles
            .get(handler)
            .map(|services| services.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Command names of `service`, sorted. Empty for an unknown service.
    pub fn commands(&self, service: &str) -> Vec<String> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .services
            .get(service)
            .map(|commands| commands.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Formats able to return `command` of `service`, sorted.
    pub fn formats(&self, service: &str, command: &str) -> Vec<String> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .services
            .get(service)
            .and_then(|commands| commands.get(command))
            .map(|entry| entry.formats.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Listing for `show services`: one section per service, then a
    /// `handlers` section naming what each handler serves.
    pub fn describe(&self) -> InfoResponse {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let mut info = InfoResponse::new("services");

        for (service, commands) in &table.services {
            info.add_section(service);
            for (name, command) in commands {
                let formats: Vec<&str> = command.formats.iter().map(String::as_str).collect();
                info.add(
                    service,
                    name,
                    format!("{} [{}]", command.description, formats.join(", ")),
                );
            }
        }

        for (handler, services) in &table.handles {
            let services: Vec<&str> = services.iter().map(String::as_str).collect();
            info.add("handlers", handler, services.join(", "));
        }
        info
    }
}
