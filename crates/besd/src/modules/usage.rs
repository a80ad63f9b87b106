//! `usage` module: answers `show help` with the command table.

use bes_core::{DispatchResult, RequestContext};

use crate::commands::HELP;
use crate::dispatch::SERVER_VERSION;
use crate::registry::RequestHandler;

pub const NAME: &str = "usage";

/// Answers no `get` service.
pub const SERVICES: &[&str] = &[];

pub fn handler() -> RequestHandler {
    let mut handler = RequestHandler::new(NAME);
    handler.add_method("show.help", help);
    handler.add_method("show.version", version);
    handler
}

fn help(ctx: &mut RequestContext) -> DispatchResult<()> {
    if let Some(info) = ctx.response_mut()?.as_info_mut() {
        for (syntax, description) in HELP {
            info.add(NAME, *syntax, *description);
        }
    }
    Ok(())
}

fn version(ctx: &mut RequestContext) -> DispatchResult<()> {
    if let Some(version) = ctx.response_mut()?.as_version_mut() {
        version.add_module(NAME, SERVER_VERSION);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bes_core::{InfoResponse, ResponseObject};

    #[test]
    fn test_help_lists_every_command() {
        let mut ctx = RequestContext::new("show.help");
        ctx.set_response(ResponseObject::Info(InfoResponse::new("help")));
        help(&mut ctx).unwrap();

        let Some(ResponseObject::Info(info)) = ctx.take_response() else {
            panic!("expected info response");
        };
        let section = info.section(NAME).unwrap();
        assert_eq!(section.entries.len(), HELP.len());
        assert!(section.entries.iter().any(|e| e.key.starts_with("get ")));
    }

    #[test]
    fn test_without_response_is_internal() {
        let mut ctx = RequestContext::new("show.version");
        assert!(version(&mut ctx).unwrap_err().is_internal());
    }
}
