//! Command registry.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use bes_core::{DispatchResult, RequestContext};
use tracing::debug;

use crate::dispatch::CommandEnv;
use crate::request::Args;

/// A command that parses its own arguments.
///
/// Implementations either mutate the session (`set`, `define`, `delete`)
/// or leave a response object in the context for the dispatcher to
/// transmit (`get`, `show.status`).
pub trait CommandHandler: Send + Sync {
    fn execute(
        &self,
        args: &mut Args<'_>,
        ctx: &mut RequestContext,
        env: &mut CommandEnv<'_>,
    ) -> DispatchResult<()>;
}

/// A registered command.
pub enum Command {
    /// Full command object.
    Parsed(Box<dyn CommandHandler>),

    /// Leaf command with no arguments. Its response is built entirely by the
    /// request handlers' methods of the same key.
    Terminal,
}

impl Command {
    pub fn parsed(handler: impl CommandHandler + 'static) -> Self {
        Self::Parsed(Box::new(handler))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }
}

/// Command name to command.
#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<BTreeMap<String, Arc<Command>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command.
    ///
    /// Returns `false`, leaving the existing entry untouched, if the name is
    /// taken.
    pub fn add(&self, name: &str, command: Command) -> bool {
        let mut commands = self.commands.write().unwrap_or_else(PoisonError::into_inner);
        if commands.contains_key(name) {
            debug!(command = name, "Command already registered");
            return false;
        }
        commands.insert(name.to_string(), Arc::new(command));
        true
    }

    /// Deregisters and drops a command. Returns `false` if it was not
    /// registered.
    pub fn remove(&self, name: &str) -> bool {
        self.commands
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    pub fn find(&self, name: &str) -> Option<Arc<Command>> {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    impl CommandHandler for Nop {
        fn execute(
            &self,
            _args: &mut Args<'_>,
            _ctx: &mut RequestContext,
            _env: &mut CommandEnv<'_>,
        ) -> DispatchResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_duplicate_add_keeps_first() {
        let registry = CommandRegistry::new();
        assert!(registry.add("show.help", Command::Terminal));
        assert!(!registry.add("show.help", Command::parsed(Nop)));

        let found = registry.find("show.help").unwrap();
        assert!(found.is_terminal());
    }

    #[test]
    fn test_remove() {
        let registry = CommandRegistry::new();
        assert!(!registry.remove("get"));

        registry.add("get", Command::parsed(Nop));
        assert!(registry.contains("get"));
        assert!(registry.remove("get"));
        assert!(registry.find("get").is_none());
        assert!(!registry.remove("get"));
    }

    #[test]
    fn test_names_sorted() {
        let registry = CommandRegistry::new();
        registry.add("show.version", Command::Terminal);
        registry.add("define", Command::parsed(Nop));
        assert_eq!(registry.names(), vec!["define", "show.version"]);
    }
}
