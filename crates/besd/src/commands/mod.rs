//! Built-in commands.
//!
//! | Key | Syntax |
//! |-----|--------|
//! | `show.help` | `show help;` |
//! | `show.version` | `show version;` |
//! | `show.status` | `show status;` |
//! | `show.containers` | `show containers;` |
//! | `show.definitions` | `show definitions;` |
//! | `show.context` | `show context;` |
//! | `show.services` | `show services;` |
//! | `set.container` | `set container [in <store>] values <name>, <path>[, <type>];` |
//! | `set.context` | `set context <name> to <value>;` |
//! | `define` | `define <name> [in <store>] as <c1>[, <c2>...] [with <c>.constraint="..."[, ...]];` |
//! | `delete.container` | `delete container <name>;` |
//! | `delete.definition` | `delete definition <name>;` |
//! | `get` | `get <type> for <definition> [return as <protocol>];` |

mod define;
mod delete;
mod get;
mod set;
mod show;

pub use get::{register_dap_service, DAP_COMMANDS, DAP_SERVICE};

use tracing::debug;

use crate::registry::{Command, CommandRegistry};

/// Syntax summary for `show help`: (syntax, description).
pub const HELP: &[(&str, &str)] = &[
    ("show help;", "list commands and module help"),
    ("show version;", "versions of the server and loaded modules"),
    ("show status;", "server start time, uptime and connection count"),
    ("show containers;", "containers in this session"),
    ("show definitions;", "definitions in this session"),
    ("show context;", "context values in this session"),
    ("show services;", "services, their commands and return formats"),
    (
        "set container [in <store>] values <name>, <path>[, <type>];",
        "add or replace a container",
    ),
    ("set context <name> to <value>;", "set a session context value"),
    (
        "define <name> [in <store>] as <c1>[, <c2>...] [with <c>.constraint=\"...\"];",
        "group containers into a definition",
    ),
    ("delete container <name>;", "remove a container"),
    ("delete definition <name>;", "remove a definition"),
    (
        "get <type> for <definition> [return as <protocol>];",
        "build a response for every container in a definition",
    ),
];

fn builtin() -> Vec<(&'static str, Command)> {
    vec![
        ("show.help", Command::Terminal),
        ("show.version", Command::Terminal),
        ("show.status", Command::parsed(show::ShowStatus)),
        ("show.containers", Command::parsed(show::ShowContainers)),
        ("show.definitions", Command::parsed(show::ShowDefinitions)),
        ("show.context", Command::parsed(show::ShowContext)),
        ("show.services", Command::parsed(show::ShowServices)),
        ("set.container", Command::parsed(set::SetContainer)),
        ("set.context", Command::parsed(set::SetContext)),
        ("define", Command::parsed(define::Define)),
        ("delete.container", Command::parsed(delete::DeleteContainer)),
        ("delete.definition", Command::parsed(delete::DeleteDefinition)),
        ("get", Command::parsed(get::Get)),
    ]
}

/// Registers every built-in command. Names already taken are left alone.
///
/// Returns the number of commands added.
pub fn register_builtin(registry: &CommandRegistry) -> usize {
    let mut added = 0;
    for (name, command) in builtin() {
        if registry.add(name, command) {
            added += 1;
        } else {
            debug!(command = name, "Built-in command already registered, skipping");
        }
    }
    added
}
