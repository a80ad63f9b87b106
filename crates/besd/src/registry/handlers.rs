//! Request handler registry.
//!
//! A request handler is a named table of methods keyed by response type
//! (`show.help`, `show.version`, `dds`, `data`, ...). Each method fills in
//! the response object already placed in the request context.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use bes_core::{DispatchError, DispatchResult, RequestContext};
use tracing::{debug, error};

/// A response-building callback.
pub trait HandlerMethod: Send + Sync {
    fn call(&self, ctx: &mut RequestContext) -> DispatchResult<()>;
}

impl<F> HandlerMethod for F
where
    F: Fn(&mut RequestContext) -> DispatchResult<()> + Send + Sync,
{
    fn call(&self, ctx: &mut RequestContext) -> DispatchResult<()> {
        self(ctx)
    }
}

/// A named table of handler methods.
pub struct RequestHandler {
    name: String,
    methods: HashMap<String, Box<dyn HandlerMethod>>,
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandler")
            .field("name", &self.name)
            .field("methods", &self.method_names())
            .finish()
    }
}

impl RequestHandler {
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
    pub fn add_method(&mut self, key: &str, method: impl HandlerMethod + 'static) -> bool {
        if self.methods.contains_key(key) {
            return false;
        }
        self.methods.insert(key.to_string(), Box::new(method));
        true
    }

    pub fn remove_method(&mut self, key: &str) -> bool {
        self.methods.remove(key).is_some()
    }

    pub fn find_method(&self, key: &str) -> Option<&dyn HandlerMethod> {
        self.methods.get(key).map(|method| &**method)
    }

    /// Method keys, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Handler name to handler, in registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<Vec<Arc<RequestHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its own name.
    ///
    /// Returns `false`, leaving the existing entry untouched, if the name is
    /// taken.
    pub fn add(&self, handler: RequestHandler) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if handlers.iter().any(|h| h.name == handler.name) {
            debug!(handler = %handler.name, "Handler already registered");
            return false;
        }
        handlers.push(Arc::new(handler));
        true
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|h| h.name != name);
        handlers.len() != before
    }

    pub fn find(&self, name: &str) -> Option<Arc<RequestHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|h| h.name == name)
            .cloned()
    }

    pub fn handler_names(&self) -> Vec<String> {
        self.snapshot().iter().map(|h| h.name.clone()).collect()
    }

    fn snapshot(&self) -> Vec<Arc<RequestHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs `key` on one handler.
    ///
    /// # Errors
    /// - `DispatchError::UnknownHandler` if no handler has this name
    /// - `DispatchError::MethodNotFound` (internal) if the handler exists
    ///   but has no `key` method
    /// - whatever the method itself returns
    pub fn dispatch_to_handler(
        &self,
        handler_name: &str,
        key: &str,
        ctx: &mut RequestContext,
    ) -> DispatchResult<()> {
        let handler = self
            .find(handler_name)
            .ok_or_else(|| DispatchError::UnknownHandler(handler_name.to_string()))?;

        let method = handler.find_method(key).ok_or_else(|| {
            error!(handler = handler_name, method = key, "Handler has no such method");
            DispatchError::MethodNotFound {
                handler: handler_name.to_string(),
                method: key.to_string(),
            }
        })?;

        debug!(handler = handler_name, method = key, "Dispatching to handler");
        method.call(ctx)
    }

    /// Runs `key` on every handler that has it, in registration order.
    ///
    /// Handlers without the method are skipped. Used for `show.help` and
    /// `show.version`, where each module adds its own part.
    pub fn execute_all(&self, key: &str, ctx: &mut RequestContext) -> DispatchResult<()> {
        for handler in self.snapshot() {
            if let Some(method) = handler.find_method(key) {
                debug!(handler = %handler.name, method = key, "Executing for all handlers");
                method.call(ctx)?;
            }
        }
        Ok(())
    }

    /// Runs `key` once per container in `ctx.containers`, on the handler
    /// named by the container's type.
    ///
    /// `ctx.container` is set to the container being processed.
    pub fn execute_each(&self, key: &str, ctx: &mut RequestContext) -> DispatchResult<()> {
        let containers = ctx.containers.clone();
        for container in containers {
            let handler_name = container.container_type.clone();
            ctx.container = Some(container);
            self.dispatch_to_handler(&handler_name, key, ctx)?;
        }
        ctx.container = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bes_core::{Container, InfoResponse, ResponseObject, VersionResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn version_method(name: &'static str) -> impl HandlerMethod {
        move |ctx: &mut RequestContext| -> DispatchResult<()> {
            if let Some(version) = ctx.response_mut()?.as_version_mut() {
                version.add_module(name, "1.0");
            }
            Ok(())
        }
    }

    #[test]
    fn test_add_method_unique() {
        let mut handler = RequestHandler::new("h5");
        assert!(handler.add_method("show.version", version_method("h5")));
        assert!(!handler.add_method("show.version", version_method("other")));
        assert!(handler.find_method("show.version").is_some());
        assert!(handler.find_method("show.help").is_none());
        assert!(handler.remove_method("show.version"));
        assert!(!handler.remove_method("show.version"));
    }

    #[test]
    fn test_registry_uniqueness() {
        let registry = HandlerRegistry::new();
        assert!(registry.add(RequestHandler::new("nc")));
        assert!(!registry.add(RequestHandler::new("nc")));
        assert_eq!(registry.handler_names(), vec!["nc"]);
        assert!(registry.remove("nc"));
        assert!(!registry.remove("nc"));
    }

    #[test]
    fn test_dispatch_invokes_method_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut handler = RequestHandler::new("usage");
        handler.add_method("show.version", move |_ctx: &mut RequestContext| -> DispatchResult<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let registry = HandlerRegistry::new();
        registry.add(handler);

        let mut ctx = RequestContext::new("show.help");
        let err = registry
            .dispatch_to_handler("usage", "show.help", &mut ctx)
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(err.is_internal());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        registry
            .dispatch_to_handler("usage", "show.version", &mut ctx)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_handler_is_not_internal() {
        let registry = HandlerRegistry::new();
        let mut ctx = RequestContext::new("get");
        let err = registry
            .dispatch_to_handler("hdf4", "dds", &mut ctx)
            .unwrap_err();
        assert_eq!(err, DispatchError::UnknownHandler("hdf4".to_string()));
        assert!(!err.is_internal());
    }

    #[test]
    fn test_execute_all_skips_handlers_without_method() {
        let registry = HandlerRegistry::new();
        let mut first = RequestHandler::new("usage");
        first.add_method("show.version", version_method("usage"));
        let second = RequestHandler::new("silent");
        let mut third = RequestHandler::new("raw");
        third.add_method("show.version", version_method("raw"));
        registry.add(first);
        registry.add(second);
        registry.add(third);

        let mut ctx = RequestContext::new("show.version");
        ctx.set_response(ResponseObject::Version(VersionResponse::default()));
        registry.execute_all("show.version", &mut ctx).unwrap();

        let Some(ResponseObject::Version(version)) = ctx.take_response() else {
            panic!("expected version response");
        };
        let names: Vec<_> = version.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["usage", "raw"]);
    }

    #[test]
    fn test_execute_each_routes_by_container_type() {
        let mut raw = RequestHandler::new("raw");
        raw.add_method("dds", |ctx: &mut RequestContext| -> DispatchResult<()> {
            let name = ctx.current_container()?.symbolic_name.clone();
            if let Some(info) = ctx.response_mut()?.as_info_mut() {
                info.add("seen", name, "");
            }
            Ok(())
        });
        let registry = HandlerRegistry::new();
        registry.add(raw);

        let mut ctx = RequestContext::new("get");
        ctx.containers = vec![
            Container::new("a", "/a", "raw"),
            Container::new("b", "/b", "raw"),
        ];
        ctx.set_response(ResponseObject::Info(InfoResponse::new("t")));
        registry.execute_each("dds", &mut ctx).unwrap();
        assert!(ctx.container.is_none());

        let Some(ResponseObject::Info(info)) = ctx.take_response() else {
            panic!("expected info response");
        };
        let seen: Vec<_> = info.sections[0].entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(seen, vec!["a", "b"]);

        ctx.containers = vec![Container::new("c", "/c", "nc")];
        assert!(matches!(
            registry.execute_each("dds", &mut ctx),
            Err(DispatchError::UnknownHandler(_))
        ));
    }
}
