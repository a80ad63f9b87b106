//! Built-in transmitters.
//!
//! | Protocol | info | version | status | text | error | das/dds/dmr/data |
//! |----------|------|---------|--------|------|-------|------------------|
//! | `basic`  | text | text    | text   | text | text  | raw bytes        |
//! | `html`   | html | html    | html   | html | html  | -                |
//! | `json`   | json | json    | json   | json | json  | json             |

pub mod basic;
pub mod html;
pub mod json;

use async_trait::async_trait;
use bes_core::{DispatchError, RequestContext, ResponseObject};
use bes_protocol::ResponseSink;

use crate::commands::{DAP_COMMANDS, DAP_SERVICE};
use crate::error::RequestError;
use crate::registry::{Registries, ServiceError, TransmitMethod, TransmitterRegistry};

/// Method keys for the non-data response objects.
pub const INFO_METHODS: &[&str] = &["info", "version", "status", "text", "error"];

/// Registers `basic`, `html` and `json`. Returns the number added.
pub fn register_builtin(registry: &TransmitterRegistry) -> usize {
    [basic::transmitter(), html::transmitter(), json::transmitter()]
        .into_iter()
        .map(|transmitter| registry.add(transmitter))
        .filter(|added| *added)
        .count()
}

/// Method keys for data responses.
pub fn data_methods() -> impl Iterator<Item = &'static str> {
    DAP_COMMANDS.iter().map(|(command, _)| *command)
}

/// Adds every registered transmitter as a `dap` format for each data
/// method it implements. Formats already present are left alone.
///
/// Returns the number of formats added.
pub fn register_formats(registries: &Registries) -> Result<usize, ServiceError> {
    let services = &registries.services;
    let mut added = 0;
    for name in registries.transmitters.names() {
        let Some(transmitter) = registries.transmitters.find(&name) else {
            continue;
        };
        for command in data_methods() {
            if transmitter.find_method(command).is_none()
                || services.service_available(DAP_SERVICE, Some(command), Some(&name))
            {
                continue;
            }
            services.add_format(DAP_SERVICE, command, &name)?;
            added += 1;
        }
    }
    Ok(added)
}

/// Streams each data item's bytes unchanged, one after another.
pub struct RawContent;

#[async_trait]
impl TransmitMethod for RawContent {
    async fn transmit(
        &self,
        response: &ResponseObject,
        _ctx: &RequestContext,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), RequestError> {
        let ResponseObject::Data(data) = response else {
            return Err(unexpected(response, "data").into());
        };
        for item in &data.items {
            sink.write_data(&item.content).await?;
        }
        Ok(())
    }
}

/// Internal error for a response routed to the wrong method.
pub(crate) fn unexpected(response: &ResponseObject, expected: &str) -> DispatchError {
    DispatchError::Internal(format!(
        "{expected} transmitter received a {} response",
        response.method_key()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_builtin() {
        let registry = TransmitterRegistry::new();
        assert_eq!(register_builtin(&registry), 3);
        assert_eq!(register_builtin(&registry), 0);
        assert_eq!(registry.names(), vec!["basic", "html", "json"]);

        let html = registry.find("html").unwrap();
        for key in INFO_METHODS {
            assert!(html.find_method(key).is_some(), "html missing {key}");
        }
        assert!(html.find_method("data").is_none());

        let basic = registry.find("basic").unwrap();
        for key in INFO_METHODS.iter().copied().chain(data_methods()) {
            assert!(basic.find_method(key).is_some(), "basic missing {key}");
        }
    }

    #[test]
    fn test_register_formats_follows_data_methods() {
        let registries = Registries::new();
        crate::commands::register_dap_service(&registries.services).unwrap();
        register_builtin(&registries.transmitters);

        assert_eq!(register_formats(&registries).unwrap(), 8);
        assert_eq!(register_formats(&registries).unwrap(), 0);
        for command in data_methods() {
            assert_eq!(registries.services.formats(DAP_SERVICE, command), vec!["basic", "json"]);
        }
    }
}
