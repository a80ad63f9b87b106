//! Transmitter registry.
//!
//! A transmitter is a named table of serialization methods keyed by the
//! response's method key (`info`, `version`, `dds`, ...). The label it is
//! registered under is the transmit protocol a request selects with
//! `return as <protocol>`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bes_core::{DispatchError, DispatchResult, RequestContext, ResponseObject};
use bes_protocol::ResponseSink;
use tracing::{debug, error};

use crate::error::RequestError;

/// A serialization callback.
#[async_trait]
pub trait TransmitMethod: Send + Sync {
    async fn transmit(
        &self,
        response: &ResponseObject,
        ctx: &RequestContext,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), RequestError>;
}

/// Adapts a render function that produces the whole body at once.
pub struct Render<F>(pub F);

#[async_trait]
impl<F> TransmitMethod for Render<F>
where
    F: Fn(&ResponseObject, &RequestContext) -> DispatchResult<Vec<u8>> + Send + Sync,
{
    async fn transmit(
        &self,
        response: &ResponseObject,
        ctx: &RequestContext,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), RequestError> {
        let body = (self.0)(response, ctx)?;
        sink.write_data(&body).await?;
        Ok(())
    }
}

/// A named table of transmit methods.
pub struct Transmitter {
    name: String,
    methods: HashMap<String, Arc<dyn TransmitMethod>>,
}

impl Transmitter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `false` if `key` already has a method.
    pub fn add_method(&mut self, key: &str, method: impl TransmitMethod + 'static) -> bool {
        if self.methods.contains_key(key) {
            return false;
        }
        self.methods.insert(key.to_string(), Arc::new(method));
        true
    }

    pub fn remove_method(&mut self, key: &str) -> bool {
        self.methods.remove(key).is_some()
    }

    pub fn find_method(&self, key: &str) -> Option<Arc<dyn TransmitMethod>> {
        self.methods.get(key).cloned()
    }

    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Protocol label to transmitter.
#[derive(Default)]
pub struct TransmitterRegistry {
    transmitters: RwLock<HashMap<String, Arc<Transmitter>>>,
}

impl TransmitterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transmitter under its own name.
    ///
    /// Returns `false`, leaving the existing entry untouched, if the name is
    /// taken.
    pub fn add(&self, transmitter: Transmitter) -> bool {
        let mut transmitters = self
            .transmitters
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if transmitters.contains_key(&transmitter.name) {
            debug!(transmitter = %transmitter.name, "Transmitter already registered");
            return false;
        }
        transmitters.insert(transmitter.name.clone(), Arc::new(transmitter));
        true
    }

    pub fn remove(&self, name: &str) -> bool {
        self.transmitters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    pub fn find(&self, name: &str) -> Option<Arc<Transmitter>> {
        self.transmitters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transmitters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered protocol labels, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .transmitters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    /// Serializes `response` through `protocol`'s `method_key` method.
    ///
    /// An unknown protocol or method is an internal error: requests naming
    /// a protocol are validated when parsed.
    pub async fn send_response(
        &self,
        protocol: &str,
        method_key: &str,
        response: &ResponseObject,
        ctx: &RequestContext,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), RequestError> {
        let method = self
            .find(protocol)
            .and_then(|transmitter| transmitter.find_method(method_key))
            .ok_or_else(|| {
                error!(protocol, method = method_key, "No transmitter for method");
                DispatchError::NoTransmitter {
                    protocol: protocol.to_string(),
                    method: method_key.to_string(),
                }
            })?;

        debug!(protocol, method = method_key, "Transmitting response");
        method.transmit(response, ctx, sink).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bes_core::TextResponse;
    use bes_protocol::BufferSink;

    fn text_transmitter(name: &str) -> Transmitter {
        let mut transmitter = Transmitter::new(name);
        transmitter.add_method(
            "text",
            Render(
                |response: &ResponseObject, _ctx: &RequestContext| -> DispatchResult<Vec<u8>> {
                    match response {
                        ResponseObject::Text(text) => Ok(text.text.clone().into_bytes()),
                        _ => Err(DispatchError::Internal("not text".into())),
                    }
                },
            ),
        );
        transmitter
    }

    fn text(body: &str) -> ResponseObject {
        ResponseObject::Text(TextResponse {
            text: body.to_string(),
        })
    }

    #[test]
    fn test_registry_uniqueness() {
        let registry = TransmitterRegistry::new();
        assert!(registry.add(text_transmitter("basic")));
        assert!(!registry.add(Transmitter::new("basic")));
        assert!(registry
            .find("basic")
            .is_some_and(|t| t.find_method("text").is_some()));
        assert!(registry.remove("basic"));
        assert!(!registry.remove("basic"));
    }

    #[tokio::test]
    async fn test_send_response_uses_method() {
        let registry = TransmitterRegistry::new();
        registry.add(text_transmitter("basic"));

        let mut sink = BufferSink::new();
        let ctx = RequestContext::new("show.status");
        registry
            .send_response("basic", "text", &text("hello"), &ctx, &mut sink)
            .await
            .unwrap();
        assert_eq!(sink.text(), "hello");
    }

    #[tokio::test]
    async fn test_missing_method_or_protocol_is_internal() {
        let registry = TransmitterRegistry::new();
        registry.add(text_transmitter("basic"));
        let ctx = RequestContext::new("get");
        let mut sink = BufferSink::new();

        for (protocol, method) in [("basic", "dmr"), ("xml", "text")] {
            let result = registry
                .send_response(protocol, method, &text("x"), &ctx, &mut sink)
                .await;
            match result {
                Err(RequestError::Dispatch(err)) => {
                    assert!(err.is_internal());
                    assert!(err
                        .to_string()
                        .contains(&format!("no transmitter for method {method}")));
                }
                other => panic!("expected internal error, got {other:?}"),
            }
        }
        assert!(sink.data.is_empty());
    }
}
