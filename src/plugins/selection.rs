// src/plugins/selection.rs

use crate::{
    core::{
        handler::{Handler, UsageError},
        prequire::{Exports, PluginContext},
        selection::SharedSelection,
    },
    models::{ArgSpec, CommandOptions, Selection, Usage},
};
use serde_json::{Value, json};
use std::sync::Arc;

/// Plugin body for `/ui/selection`.
///
/// Exports the [`SharedSelection`] its commands write to; the shell must be
/// built around the same instance for `require_selection` commands to see it.
pub fn init(ctx: &mut PluginContext<'_>) -> anyhow::Result<Exports> {
    let selection = SharedSelection::new(None);

    let target = selection.clone();
    ctx.tree.listen(
        "/select",
        Handler::new(move |inv| {
            let (Some(kind), Some(name)) = (inv.argv.first(), inv.argv.get(1)) else {
                return Err(UsageError::new("select needs an entity kind and a name").into());
            };
            let mut selected = Selection::new(plural(kind), name.as_str());
            selected.namespace = inv
                .option_str("namespace")
                .or_else(|| inv.option_str("n"))
                .map(str::to_string);

            log::debug!("Selected {} '{}'", selected.kind, selected.qualified_name());
            target.select(selected.clone());
            Ok(json!(selected))
        }),
        CommandOptions::new().usage(
            Usage::titled("select")
                .header("Select an entity for later commands")
                .example("select action hello")
                .required(ArgSpec::new("kind"))
                .required(ArgSpec::new("name"))
                .optional(ArgSpec::new("--namespace").alias("-n")),
        ),
    )?;

    let target = selection.clone();
    ctx.tree.listen(
        "/deselect",
        Handler::new(move |_| Ok(target.clear().map(|prior| json!(prior)).unwrap_or(Value::Null))),
        CommandOptions::new().docs("Clear the current selection"),
    )?;

    ctx.tree.listen(
        "/selection",
        Handler::new(|inv| Ok(json!(inv.selection))),
        CommandOptions::new()
            .require_selection()
            .docs("Show the current selection"),
    )?;

    Ok(Arc::new(selection))
}

/// Entity kinds are stored plural, the way the command tree names them.
fn plural(kind: &str) -> String {
    if kind.ends_with('s') {
        kind.to_string()
    } else {
        format!("{}s", kind)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::{
        constants::SELECTION_PLUGIN,
        core::{
            dispatcher::{DispatchError, Shell},
            prequire::Prequire,
            selection::SelectionProvider,
            tree::CommandTree,
        },
    };

    fn shell() -> (Shell, Arc<SharedSelection>) {
        let mut tree = CommandTree::new();
        let mut loader = Prequire::new();
        loader.define(SELECTION_PLUGIN, init).unwrap();
        let selection = loader
            .require_as::<SharedSelection>(&mut tree, SELECTION_PLUGIN)
            .unwrap();
        let shell = Shell::with_selection(tree, Arc::new(selection.as_ref().clone()));
        (shell, selection)
    }

    #[tokio::test]
    async fn test_select_show_and_deselect() {
        let (shell, selection) = shell();

        assert!(matches!(
            shell.exec("selection").await,
            Err(DispatchError::NoSelection { .. })
        ));

        let selected = shell.exec("select action hello -n guest").await.unwrap();
        assert_eq!(selected["kind"], "actions");
        assert_eq!(selected["namespace"], "guest");
        assert_eq!(
            selection.current_selection().map(|s| s.qualified_name()),
            Some("guest/hello".to_string())
        );

        let shown = shell.exec("selection").await.unwrap();
        assert_eq!(shown["name"], "hello");

        let cleared = shell.exec("deselect").await.unwrap();
        assert_eq!(cleared["name"], "hello");
        assert_eq!(shell.exec("deselect").await.unwrap(), Value::Null);
        assert!(selection.current_selection().is_none());
    }

    #[tokio::test]
    async fn test_select_needs_kind_and_name() {
        let (shell, _) = shell();
        assert!(shell.exec("select action").await.is_err());
    }
}
