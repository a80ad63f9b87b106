//! `get <type> for <definition> [return as <protocol>];`

use bes_core::context::keys;
use bes_core::{DataResponse, DispatchError, DispatchResult, RequestContext, ResponseObject};

use crate::dispatch::CommandEnv;
use crate::registry::{CommandHandler, ServiceError, ServiceRegistry};
use crate::request::Args;

/// Service `get` draws its response types from.
pub const DAP_SERVICE: &str = "dap";

/// Commands of the `dap` service: (response type, description).
pub const DAP_COMMANDS: &[(&str, &str)] = &[
    ("das", "dataset attributes"),
    ("dds", "dataset structure"),
    ("dmr", "DAP4 dataset metadata"),
    ("data", "dataset contents"),
];

/// Registers the `dap` service and its commands. Formats are added by the
/// transmitters that can return them.
pub fn register_dap_service(services: &ServiceRegistry) -> Result<(), ServiceError> {
    services.add_service(DAP_SERVICE)?;
    for (command, description) in DAP_COMMANDS {
        services.add_to_service(DAP_SERVICE, command, description)?;
    }
    Ok(())
}

pub struct Get;

impl CommandHandler for Get {
    fn execute(
        &self,
        args: &mut Args<'_>,
        ctx: &mut RequestContext,
        env: &mut CommandEnv<'_>,
    ) -> DispatchResult<()> {
        let services = &env.registries.services;

        let response_type = args.word("response type")?;
        if !services.service_available(DAP_SERVICE, Some(response_type), None) {
            return Err(args.error(format!(
                "unknown response type '{response_type}', expected one of {}",
                services.commands(DAP_SERVICE).join(", ")
            )));
        }
        args.expect("for")?;
        let definition = args.word("definition name")?;

        let protocol = if args.accept("return") {
            args.expect("as")?;
            Some(args.word("transmit protocol")?)
        } else {
            None
        };
        args.finish()?;

        if let Some(protocol) = protocol {
            if !env.registries.transmitters.contains(protocol) {
                return Err(DispatchError::syntax(format!(
                    "get: unknown transmit protocol '{protocol}'"
                )));
            }
        }
        let format = protocol.unwrap_or(env.default_transmitter);
        if !services.service_available(DAP_SERVICE, Some(response_type), Some(format)) {
            return Err(DispatchError::syntax(format!(
                "get: protocol '{format}' cannot return a {response_type} response, use one of {}",
                services.formats(DAP_SERVICE, response_type).join(", ")
            )));
        }
        if let Some(protocol) = protocol {
            ctx.transmit_protocol = Some(protocol.to_string());
        }

        ctx.response_key = response_type.to_string();
        ctx.definition = Some(definition.to_string());
        ctx.set_data(keys::DEF_NAME, definition);
        ctx.containers = env.session.resolve(definition)?;
        ctx.log_line = format!("get {response_type} for {definition}");

        ctx.set_response(ResponseObject::Data(DataResponse::new(
            response_type,
            definition,
        )));
        env.registries.handlers.execute_each(response_type, ctx)
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::{registries, run, run_with_default};
    use crate::registry::RequestHandler;
    use bes_core::{
        Container, Definition, DispatchError, DispatchResult, RequestContext, ResponseObject,
        Session,
    };

    fn setup() -> (crate::registry::Registries, Session) {
        let registries = registries();
        let mut fake = RequestHandler::new("fake");
        fake.add_method("dds", |ctx: &mut RequestContext| -> DispatchResult<()> {
            let name = ctx.current_container()?.symbolic_name.clone();
            if let Some(data) = ctx.response_mut()?.as_data_mut() {
                data.push(name, "text/plain", b"Dataset {}".to_vec());
            }
            Ok(())
        });
        registries.handlers.add(fake);

        let mut session = Session::new();
        session.set_container(Container::new("a", "/a", "fake"));
        session.set_container(Container::new("b", "/b", "fake"));
        session
            .define(Definition::new("d", vec!["a".into(), "b".into()]))
            .unwrap();
        (registries, session)
    }

    #[test]
    fn test_get_fills_data_response_per_container() {
        let (registries, mut session) = setup();
        let mut ctx = run(&registries, &mut session, "get dds for d return as json;").unwrap();

        assert_eq!(ctx.response_key, "dds");
        assert_eq!(ctx.transmit_protocol.as_deref(), Some("json"));
        let Some(ResponseObject::Data(data)) = ctx.take_response() else {
            panic!("expected data response");
        };
        assert_eq!(data.kind, "dds");
        let containers: Vec<_> = data.items.iter().map(|i| i.container.as_str()).collect();
        assert_eq!(containers, vec!["a", "b"]);
    }

    #[test]
    fn test_get_validation() {
        let (registries, mut session) = setup();

        assert!(matches!(
            run(&registries, &mut session, "get thing for d;"),
            Err(DispatchError::Syntax(_))
        ));
        assert!(matches!(
            run(&registries, &mut session, "get dds for d return as xml;"),
            Err(DispatchError::Syntax(_))
        ));
        assert!(matches!(
            run(&registries, &mut session, "get dds for nope;"),
            Err(DispatchError::NotFound { kind: "definition", .. })
        ));
    }

    #[test]
    fn test_get_rejects_protocol_without_data_method() {
        let (registries, mut session) = setup();

        let err = run(&registries, &mut session, "get dds for d return as html;").unwrap_err();
        assert!(matches!(err, DispatchError::Syntax(_)));
        assert!(!err.is_internal());
        assert!(err.to_string().contains("use one of basic, json"));
    }

    #[test]
    fn test_get_checks_default_protocol() {
        let registries = registries();
        let mut session = Session::new();
        session.set_container(Container::new("a", "/a", "fake"));
        session.define(Definition::new("d", vec!["a".into()])).unwrap();

        let err = run_with_default(&registries, &mut session, "html", "get das for d;").unwrap_err();
        assert!(matches!(err, DispatchError::Syntax(_)));
    }

    #[test]
    fn test_get_missing_method_is_internal() {
        let (registries, mut session) = setup();
        let err = run(&registries, &mut session, "get das for d;").unwrap_err();
        assert!(err.is_internal());
    }
}
