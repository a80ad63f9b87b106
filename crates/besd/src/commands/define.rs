//! `define <name> [in <store>] as <c1>[, <c2>...] [with <c>.constraint="..."[, ...]];`

use bes_core::context::keys;
use bes_core::{Definition, DispatchResult, RequestContext, DEFAULT_STORE};
use tracing::debug;

use crate::dispatch::CommandEnv;
use crate::registry::CommandHandler;
use crate::request::Args;

const CONSTRAINT_SUFFIX: &str = ".constraint=";

pub struct Define;

impl CommandHandler for Define {
    fn execute(
        &self,
        args: &mut Args<'_>,
        ctx: &mut RequestContext,
        env: &mut CommandEnv<'_>,
    ) -> DispatchResult<()> {
        let name = args.word("definition name")?;
        let store = if args.accept("in") {
            args.word("store name")?
        } else {
            DEFAULT_STORE
        };
        args.expect("as")?;

        let containers: Vec<String> = args
            .word_list("container name")?
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut definition = Definition::new(name, containers);
        definition.store = store.to_string();

        if args.accept("with") {
            for clause in args.word_list("constraint")? {
                let (container, constraint) = clause.split_once(CONSTRAINT_SUFFIX).ok_or_else(|| {
                    args.error(format!("expected <container>.constraint=\"...\", found '{clause}'"))
                })?;
                if !definition.containers.iter().any(|c| c == container) {
                    return Err(args.error(format!(
                        "constraint names container '{container}', which is not part of {name}"
                    )));
                }
                definition
                    .constraints
                    .insert(container.to_string(), constraint.to_string());
            }
        }
        args.finish()?;

        ctx.set_data(keys::DEF_NAME, name);
        ctx.set_data(keys::STORE_NAME, store);

        if env.session.define(definition)?.is_some() {
            debug!(definition = name, "Replaced existing definition");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::{registries, run};
    use bes_core::{Container, DispatchError, Session};

    fn session() -> Session {
        let mut session = Session::new();
        session.set_container(Container::new("a", "/a.bin", "raw"));
        session.set_container(Container::new("b", "/b.bin", "raw"));
        session
    }

    #[test]
    fn test_define_with_constraints() {
        let registries = registries();
        let mut session = session();

        run(
            &registries,
            &mut session,
            r#"define d as a, b with b.constraint="x[0:1:9],y";"#,
        )
        .unwrap();
        let def = session.definition("d").unwrap();
        assert_eq!(def.containers, vec!["a", "b"]);
        assert_eq!(def.constraints.get("b").map(String::as_str), Some("x[0:1:9],y"));
        assert!(def.constraints.get("a").is_none());
    }

    #[test]
    fn test_define_unknown_container() {
        let registries = registries();
        let mut session = session();
        assert!(matches!(
            run(&registries, &mut session, "define d as a, zz;"),
            Err(DispatchError::NotFound { kind: "container", .. })
        ));
    }

    #[test]
    fn test_constraint_for_foreign_container() {
        let registries = registries();
        let mut session = session();
        assert!(matches!(
            run(
                &registries,
                &mut session,
                r#"define d as a with b.constraint="x";"#
            ),
            Err(DispatchError::Syntax(_))
        ));
        assert!(matches!(
            run(&registries, &mut session, "define d as a with a.projection=x;"),
            Err(DispatchError::Syntax(_))
        ));
    }

    #[test]
    fn test_define_in_store() {
        let registries = registries();
        let mut session = session();
        run(&registries, &mut session, "define d in volatile as a;").unwrap();
        assert_eq!(session.definition("d").unwrap().store, "volatile");
    }
}
