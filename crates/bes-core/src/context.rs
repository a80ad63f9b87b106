//! Per-request context.
//!
//! Created for each client request, threaded through every command, handler
//! method and transmitter method run for that request, then discarded.

use std::collections::BTreeMap;

use crate::container::Container;
use crate::error::{DispatchError, DispatchResult};
use crate::response::ResponseObject;

/// Well-known keys in [`RequestContext::data`].
pub mod keys {
    pub const DEF_NAME: &str = "def_name";
    pub const STORE_NAME: &str = "store_name";
    pub const CONTAINER_NAME: &str = "container_name";
    pub const REAL_NAME: &str = "real_name";
    pub const CONTAINER_TYPE: &str = "container_type";
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Command key being executed (`get`, `show.version`, ...)
    pub action: String,

    /// Response type requested (`dds`, `show.help`, ...)
    pub response_key: String,

    /// Transmit protocol named by the request, if any
    pub transmit_protocol: Option<String>,

    /// Definition addressed by a `get`
    pub definition: Option<String>,

    /// Containers resolved for this request
    pub containers: Vec<Container>,

    /// Container currently being processed by `execute_each`
    pub container: Option<Container>,

    /// Free-form values set while parsing (see [`keys`])
    pub data: BTreeMap<String, String>,

    pub response: Option<ResponseObject>,

    /// Copied into error responses for diagnostics
    pub annotation_url: Option<String>,

    /// Short description of the request, for logs
    pub log_line: String,
}

impl RequestContext {
    pub fn new(action: impl Into<String>) -> Self {
        let action = action.into();
        Self {
            response_key: action.clone(),
            log_line: action.clone(),
            action,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_annotation_url(mut self, url: Option<String>) -> Self {
        self.annotation_url = url;
        self
    }

    /// Resets per-command state, keeping request-wide values.
    ///
    /// The response must already have been taken.
    pub fn begin_command(&mut self, action: &str) {
        self.action = action.to_string();
        self.response_key = action.to_string();
        self.transmit_protocol = None;
        self.container = None;
        self.containers.clear();
        self.definition = None;
        self.data.clear();
    }

    pub fn set_data(&mut self, key: &str, value: impl Into<String>) {
        self.data.insert(key.to_string(), value.into());
    }

    pub fn data(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn set_response(&mut self, response: ResponseObject) {
        self.response = Some(response);
    }

    pub fn take_response(&mut self) -> Option<ResponseObject> {
        self.response.take()
    }

    /// The response as mutable, or an internal error if none was set up.
    pub fn response_mut(&mut self) -> DispatchResult<&mut ResponseObject> {
        let action = &self.action;
        self.response
            .as_mut()
            .ok_or_else(|| DispatchError::Internal(format!("no response object for {action}")))
    }

    /// Container currently being processed, or an internal error.
    pub fn current_container(&self) -> DispatchResult<&Container> {
        self.container.as_ref().ok_or_else(|| {
            DispatchError::Internal(format!("no current container for {}", self.action))
        })
    }
}
