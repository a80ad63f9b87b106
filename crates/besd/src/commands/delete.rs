//! `delete container` and `delete definition`.

use bes_core::{DispatchResult, RequestContext};

use crate::dispatch::CommandEnv;
use crate::registry::CommandHandler;
use crate::request::Args;

pub struct DeleteContainer;

impl CommandHandler for DeleteContainer {
    fn execute(
        &self,
        args: &mut Args<'_>,
        _ctx: &mut RequestContext,
        env: &mut CommandEnv<'_>,
    ) -> DispatchResult<()> {
        let name = args.word("container name")?;
        args.finish()?;
        env.session.delete_container(name)?;
        Ok(())
    }
}

pub struct DeleteDefinition;

impl CommandHandler for DeleteDefinition {
    fn execute(
        &self,
        args: &mut Args<'_>,
        _ctx: &mut RequestContext,
        env: &mut CommandEnv<'_>,
    ) -> DispatchResult<()> {
        let name = args.word("definition name")?;
        args.finish()?;
        env.session.delete_definition(name)?;
        Ok(())
    }
}
