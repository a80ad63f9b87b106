//! Containers and definitions.
//!
//! A container gives a symbolic name to a backing resource (a file path)
//! plus the name of the request handler that knows how to read it. A
//! definition groups containers so a single `get` can address them all.

use serde::Serialize;
use std::collections::BTreeMap;

/// Store used when a command does not name one.
pub const DEFAULT_STORE: &str = "default";

/// Handler type assumed when `set container` omits one.
pub const DEFAULT_CONTAINER_TYPE: &str = "raw";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Container {
    /// Name the client uses in later commands
    pub symbolic_name: String,
    /// Backing resource, resolved by the handler
    pub real_name: String,
    /// Request handler name
    pub container_type: String,
    pub store: String,
    /// Set when a definition attaches a constraint to this container
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl Container {
    pub fn new(
        symbolic_name: impl Into<String>,
        real_name: impl Into<String>,
        container_type: impl Into<String>,
    ) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            real_name: real_name.into(),
            container_type: container_type.into(),
            store: DEFAULT_STORE.to_string(),
            constraint: None,
        }
    }

    #[must_use]
    pub fn in_store(mut self, store: impl Into<String>) -> Self {
        self.store = store.into();
        self
    }
}

/// Named group of containers with optional per-container constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    pub name: String,
    pub store: String,
    /// Container symbolic names, in the order given
    pub containers: Vec<String>,
    /// Container symbolic name to constraint expression
    pub constraints: BTreeMap<String, String>,
}

impl Definition {
    pub fn new(name: impl Into<String>, containers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            store: DEFAULT_STORE.to_string(),
            containers,
            constraints: BTreeMap::new(),
        }
    }
}
