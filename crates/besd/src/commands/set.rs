//! `set container` and `set context`.

use bes_core::context::keys;
use bes_core::{
    Container, DispatchResult, RequestContext, DEFAULT_CONTAINER_TYPE, DEFAULT_STORE,
};
use tracing::debug;

use crate::dispatch::CommandEnv;
use crate::registry::CommandHandler;
use crate::request::Args;

/// `set container [in <store>] values <name>, <path>[, <type>];`
///
/// Replaces a container of the same name.
pub struct SetContainer;

impl CommandHandler for SetContainer {
    fn execute(
        &self,
        args: &mut Args<'_>,
        ctx: &mut RequestContext,
        env: &mut CommandEnv<'_>,
    ) -> DispatchResult<()> {
        let store = if args.accept("in") {
            args.word("store name")?
        } else {
            DEFAULT_STORE
        };
        args.expect("values")?;

        let values = args.word_list("container value")?;
        args.finish()?;

        let (name, real_name, container_type) = match values.as_slice() {
            [name, real_name] => (*name, *real_name, DEFAULT_CONTAINER_TYPE),
            [name, real_name, container_type] => (*name, *real_name, *container_type),
            _ => {
                return Err(args.error(format!(
                    "expected <name>, <path>[, <type>], found {} values",
                    values.len()
                )))
            }
        };
        if name.is_empty() || real_name.is_empty() {
            return Err(args.error("container name and path must not be empty".to_string()));
        }

        ctx.set_data(keys::STORE_NAME, store);
        ctx.set_data(keys::CONTAINER_NAME, name);
        ctx.set_data(keys::REAL_NAME, real_name);
        ctx.set_data(keys::CONTAINER_TYPE, container_type);

        let container = Container::new(name, real_name, container_type).in_store(store);
        if env.session.set_container(container).is_some() {
            debug!(container = name, "Replaced existing container");
        }
        Ok(())
    }
}

/// `set context <name> to <value>;`
pub struct SetContext;

impl CommandHandler for SetContext {
    fn execute(
        &self,
        args: &mut Args<'_>,
        _ctx: &mut RequestContext,
        env: &mut CommandEnv<'_>,
    ) -> DispatchResult<()> {
        let name = args.word("context name")?;
        args.expect("to")?;
        let value = args.word("context value")?;
        args.finish()?;

        env.session.set_context(name, value);
        Ok(())
    }
}
