//! Per-connection session store.
//!
//! Holds the containers, definitions and context values a client has set up
//! with `set`/`define`. Each connection owns exactly one session; nothing in
//! here is shared.

use std::collections::BTreeMap;

use crate::container::{Container, Definition};
use crate::error::{DispatchError, DispatchResult};

#[derive(Debug, Default, Clone)]
pub struct Session {
    containers: BTreeMap<String, Container>,
    definitions: BTreeMap<String, Definition>,
    context: BTreeMap<String, String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a container, replacing any container with the same name.
    ///
    /// Returns the replaced container.
    pub fn set_container(&mut self, container: Container) -> Option<Container> {
        self.containers
            .insert(container.symbolic_name.clone(), container)
    }

    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.get(name)
    }

    /// Removes a container.
    ///
    /// # Errors
    /// - `DispatchError::NotFound` if no container has this name
    pub fn delete_container(&mut self, name: &str) -> DispatchResult<Container> {
        self.containers
            .remove(name)
            .ok_or_else(|| DispatchError::NotFound {
                kind: "container",
                name: name.to_string(),
            })
    }

    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.values()
    }

    /// Adds a definition, replacing any definition with the same name.
    ///
    /// # Errors
    /// - `DispatchError::NotFound` if the definition names a container that
    ///   is not in this session
    pub fn define(&mut self, definition: Definition) -> DispatchResult<Option<Definition>> {
        if let Some(missing) = definition
            .containers
            .iter()
            .find(|name| !self.containers.contains_key(*name))
        {
            return Err(DispatchError::NotFound {
                kind: "container",
                name: missing.clone(),
            });
        }
        Ok(self
            .definitions
            .insert(definition.name.clone(), definition))
    }

    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    /// # Errors
    /// - `DispatchError::NotFound` if no definition has this name
    pub fn delete_definition(&mut self, name: &str) -> DispatchResult<Definition> {
        self.definitions
            .remove(name)
            .ok_or_else(|| DispatchError::NotFound {
                kind: "definition",
                name: name.to_string(),
            })
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.values()
    }

    /// Resolves a definition into copies of its containers, with the
    /// definition's constraints applied.
    ///
    /// Containers deleted after the definition was made are reported as
    /// missing rather than skipped.
    pub fn resolve(&self, definition: &str) -> DispatchResult<Vec<Container>> {
        let def = self
            .definitions
            .get(definition)
            .ok_or_else(|| DispatchError::NotFound {
                kind: "definition",
                name: definition.to_string(),
            })?;

        def.containers
            .iter()
            .map(|name| {
                let mut container =
                    self.containers
                        .get(name)
                        .cloned()
                        .ok_or_else(|| DispatchError::NotFound {
                            kind: "container",
                            name: name.clone(),
                        })?;
                if let Some(constraint) = def.constraints.get(name) {
                    container.constraint = Some(constraint.clone());
                }
                Ok(container)
            })
            .collect()
    }

    pub fn set_context(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.context.insert(name.into(), value.into());
    }

    pub fn context_value(&self, name: &str) -> Option<&str> {
        self.context.get(name).map(String::as_str)
    }

    pub fn context(&self) -> impl Iterator<Item = (&str, &str)> {
        self.context.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
