//! `show` commands that answer from server or session state.
//!
//! `show help` and `show version` are terminal commands and live in the
//! modules' handlers instead.

use bes_core::{DispatchResult, InfoResponse, RequestContext, ResponseObject};

use crate::dispatch::CommandEnv;
use crate::registry::CommandHandler;
use crate::request::Args;

pub struct ShowStatus;

impl CommandHandler for ShowStatus {
    fn execute(
        &self,
        args: &mut Args<'_>,
        ctx: &mut RequestContext,
        env: &mut CommandEnv<'_>,
    ) -> DispatchResult<()> {
        args.finish()?;
        ctx.set_response(ResponseObject::Status(env.status.snapshot()));
        Ok(())
    }
}

pub struct ShowContainers;

impl CommandHandler for ShowContainers {
    fn execute(
        &self,
        args: &mut Args<'_>,
        ctx: &mut RequestContext,
        env: &mut CommandEnv<'_>,
    ) -> DispatchResult<()> {
        args.finish()?;
        let mut info = InfoResponse::new("containers");
        for container in env.session.containers() {
            info.add(
                &container.store,
                &container.symbolic_name,
                format!("{} ({})", container.real_name, container.container_type),
            );
        }
        ctx.set_response(ResponseObject::Info(info));
        Ok(())
    }
}

pub struct ShowDefinitions;

impl CommandHandler for ShowDefinitions {
    fn execute(
        &self,
        args: &mut Args<'_>,
        ctx: &mut RequestContext,
        env: &mut CommandEnv<'_>,
    ) -> DispatchResult<()> {
        args.finish()?;
        let mut info = InfoResponse::new("definitions");
        for def in env.session.definitions() {
            let members: Vec<String> = def
                .containers
                .iter()
                .map(|name| match def.constraints.get(name) {
                    Some(constraint) => format!("{name} [{constraint}]"),
                    None => name.clone(),
                })
                .collect();
            info.add(&def.store, &def.name, members.join(", "));
        }
        ctx.set_response(ResponseObject::Info(info));
        Ok(())
    }
}

pub struct ShowContext;

impl CommandHandler for ShowContext {
    fn execute(
        &self,
        args: &mut Args<'_>,
        ctx: &mut RequestContext,
        env: &mut CommandEnv<'_>,
    ) -> DispatchResult<()> {
        args.finish()?;
        let mut info = InfoResponse::new("context");
        info.add_section("context");
        for (name, value) in env.session.context() {
            info.add("context", name, value);
        }
        ctx.set_response(ResponseObject::Info(info));
        Ok(())
    }
}

pub struct ShowServices;

impl CommandHandler for ShowServices {
    fn execute(
        &self,
        args: &mut Args<'_>,
        ctx: &mut RequestContext,
        env: &mut CommandEnv<'_>,
    ) -> DispatchResult<()> {
        args.finish()?;
        ctx.set_response(ResponseObject::Info(env.registries.services.describe()));
        Ok(())
    }
}
