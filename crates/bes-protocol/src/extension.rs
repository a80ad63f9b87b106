//! Extension sideband codec.
//!
//! Extensions travel in `x` chunks as concatenated `name[=value];` tokens.
//! They carry status flags (`status=error`, `status=PPT_EXIT_NOW`), never
//! bulk data.

use std::fmt;

use crate::error::PptError;

/// Name of the status extension.
pub const STATUS: &str = "status";

/// Status value asking the peer to end the session.
pub const EXIT_NOW: &str = "PPT_EXIT_NOW";

/// Status value marking the enclosing message as an error report.
pub const ERROR: &str = "error";

/// A single `name[=value]` sideband token.
///
/// `value: Some("")` (`name=;`) and `value: None` (`name;`) are distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub name: String,
    pub value: Option<String>,
}

impl Extension {
    /// Creates a value-less extension.
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// Creates an extension with a value.
    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// `status=PPT_EXIT_NOW`
    pub fn exit_now() -> Self {
        Self::with_value(STATUS, EXIT_NOW)
    }

    /// `status=error`
    pub fn error_status() -> Self {
        Self::with_value(STATUS, ERROR)
    }

    /// Returns true for `status=PPT_EXIT_NOW`.
    pub fn is_exit(&self) -> bool {
        self.name == STATUS && self.value.as_deref() == Some(EXIT_NOW)
    }

    /// Returns true for `status=error`.
    pub fn is_error(&self) -> bool {
        self.name == STATUS && self.value.as_deref() == Some(ERROR)
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={};", self.name, value),
            None => write!(f, "{};", self.name),
        }
    }
}

/// Serializes extensions in list order.
pub fn encode(extensions: &[Extension]) -> String {
    extensions.iter().map(ToString::to_string).collect()
}

/// Parses a `name[=value];...` string.
///
/// Every token must be closed by `;`. An `=` only counts when it appears
/// before the token's `;`.
pub fn decode(input: &str) -> Result<Vec<Extension>, PptError> {
    let mut extensions = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        let Some((token, tail)) = rest.split_once(';') else {
            return Err(PptError::MalformedExtensions(rest.to_string()));
        };

        let extension = match token.split_once('=') {
            Some((name, value)) => Extension::with_value(name, value),
            None => Extension::flag(token),
        };
        extensions.push(extension);
        rest = tail;
    }

    Ok(extensions)
}

/// Finds the first extension with the given name.
pub fn find<'a>(extensions: &'a [Extension], name: &str) -> Option<&'a Extension> {
    extensions.iter().find(|ext| ext.name == name)
}
