//! # OpenWhisk command set
//!
//! Registers `/wsk` and the cross product of entity kinds and verbs beneath it,
//! plus the short names users actually type (`wsk a invoke`, `wsk action ls`).
//! Handlers do not talk to an OpenWhisk deployment; they reply with a
//! description of the request they would make, which is what downstream UI
//! plugins and the tests consume.

use crate::{
    constants::WSK_ROOT,
    core::{
        handler::{Handler, HandlerResult, Invocation, UsageError},
        path::{CommandPath, normalize},
        prequire::{Exports, PluginContext},
        selection::SelectionFilter,
    },
    models::{ArgSpec, CommandOptions, Usage},
    plugins::params::parse_key_values_with,
};
use anyhow::Context;
use serde_json::json;
use std::sync::Arc;

/// One entity kind and the verbs it supports.
#[derive(Debug)]
pub struct EntityDefinition {
    /// Plural, canonical name, e.g. `actions`.
    pub name: &'static str,
    /// Alternate prefixes for the whole entity subtree.
    pub synonyms: &'static [&'static str],
    pub verbs: &'static [&'static str],
    pub docs: &'static str,
}

/// Every entity kind the shell knows, with the verbs each one accepts.
pub static ENTITIES: &[EntityDefinition] = &[
    EntityDefinition {
        name: "actions",
        synonyms: &["action", "a"],
        verbs: &["list", "get", "create", "update", "delete", "invoke"],
        docs: "Work with actions",
    },
    EntityDefinition {
        name: "packages",
        synonyms: &["package", "p"],
        verbs: &["list", "get", "create", "update", "delete"],
        docs: "Work with packages",
    },
    EntityDefinition {
        name: "rules",
        synonyms: &["rule", "r"],
        verbs: &["list", "get", "create", "update", "delete", "enable", "disable"],
        docs: "Work with rules",
    },
    EntityDefinition {
        name: "triggers",
        synonyms: &["trigger", "t"],
        verbs: &["list", "get", "create", "update", "delete", "fire"],
        docs: "Work with triggers",
    },
    EntityDefinition {
        name: "activations",
        synonyms: &["activation", "$"],
        verbs: &["list", "get", "logs", "result"],
        docs: "Work with activations",
    },
    EntityDefinition {
        name: "namespaces",
        synonyms: &["namespace", "ns"],
        verbs: &["list", "get"],
        docs: "Work with namespaces",
    },
];

/// Alternate verb names, registered wherever their target verb exists.
const VERB_SYNONYMS: &[(&str, &str)] = &[("ls", "list"), ("rm", "delete")];

/// Verbs that only ever act on the current selection.
const SELECTION_VERBS: &[&str] = &["logs", "result"];

/// Flags the verbs treat as switches rather than `--flag value` pairs.
const BOOLEAN_FLAGS: &[&str] = &["blocking", "b", "result", "r", "summary", "json"];

/// What `/openwhisk-core` exports to the plugins that require it.
#[derive(Debug, Clone)]
pub struct OpenWhiskCore {
    root: CommandPath,
    entities: Vec<CommandPath>,
}

impl OpenWhiskCore {
    /// Canonical paths of the entity subtrees, in registration order.
    pub fn entity_paths(&self) -> &[CommandPath] {
        &self.entities
    }

    /// The canonical path of `verb` on `entity`, e.g. `/wsk/actions/invoke`.
    pub fn verb_path(&self, entity: &str, verb: &str) -> CommandPath {
        self.root.join(entity).join(verb)
    }
}

/// Plugin body for `/openwhisk-core`.
pub fn init(ctx: &mut PluginContext<'_>) -> anyhow::Result<Exports> {
    let root = normalize(WSK_ROOT)?;
    ctx.tree.subtree(
        &root,
        CommandOptions::new().usage(
            Usage::titled("wsk")
                .header("OpenWhisk operations")
                .example("wsk <entity> <verb>"),
        ),
    )?;

    let mut entities = Vec::with_capacity(ENTITIES.len());
    for entity in ENTITIES {
        let entity_path = root.join(entity.name);
        register_entity(ctx, &entity_path, entity)
            .with_context(|| format!("registering '{}'", entity_path))?;
        entities.push(entity_path);
    }

    log::debug!("Registered {} OpenWhisk entity subtrees", entities.len());
    Ok(Arc::new(OpenWhiskCore { root, entities }))
}

fn register_entity(
    ctx: &mut PluginContext<'_>,
    entity_path: &CommandPath,
    entity: &'static EntityDefinition,
) -> anyhow::Result<()> {
    ctx.tree.subtree(
        entity_path,
        CommandOptions::new().usage(
            Usage::titled(entity.name)
                .header(entity.docs)
                .example(format!("wsk {} <verb>", entity.name)),
        ),
    )?;

    for &verb in entity.verbs {
        ctx.tree.listen(
            &entity_path.join(verb),
            entity_verb(entity.name, verb),
            verb_options(entity.name, verb),
        )?;
    }

    for (alias, verb) in VERB_SYNONYMS {
        if entity.verbs.contains(verb) {
            ctx.tree.synonym(
                &entity_path.join(alias),
                &entity_path.join(verb),
                CommandOptions::new().hide(),
            )?;
        }
    }

    if let Some(parent) = entity_path.parent() {
        for synonym in entity.synonyms {
            ctx.tree.subtree_synonym(
                &parent.join(synonym),
                entity_path,
                CommandOptions::new().hide(),
            )?;
        }
    }
    Ok(())
}

fn verb_options(entity: &'static str, verb: &'static str) -> CommandOptions {
    let mut usage = Usage::titled(verb).header(format!("{} {}", verb, singular(entity)));
    let mut options = CommandOptions::new();

    match verb {
        "list" => {
            usage = usage.optional(ArgSpec::new("namespace").docs("list entities in this namespace"));
        }
        _ if SELECTION_VERBS.contains(&verb) => {
            options = options.filter(SelectionFilter::kind(entity));
        }
        _ => {
            usage = usage
                .required(ArgSpec::new("name").docs("defaults to the current selection"))
                .optional(ArgSpec::new("--param").alias("-p").docs("key value"))
                .optional(ArgSpec::new("--annotation").alias("-a").docs("key value"));
        }
    }
    if verb == "invoke" {
        usage = usage
            .optional(ArgSpec::new("--blocking").alias("-b").boolean().docs("wait for the result"))
            .optional(ArgSpec::new("--result").alias("-r").boolean().docs("show only the result"));
    }

    options.usage(usage.example(format!("wsk {} {} <name>", entity, verb)))
}

/// A handler that describes the request `verb` on `entity` would make.
fn entity_verb(entity: &'static str, verb: &'static str) -> Handler {
    Handler::new(move |inv| describe(entity, verb, &inv))
}

fn describe(entity: &str, verb: &str, inv: &Invocation) -> HandlerResult {
    let args = parse_key_values_with(&inv.full_argv, BOOLEAN_FLAGS)?;
    let listing = verb == "list";
    let name = args.positional.first().cloned().or_else(|| {
        inv.selection
            .as_ref()
            .filter(|selected| !listing && selected.kind == entity)
            .map(|selected| selected.qualified_name())
    });

    if name.is_none() && !listing {
        let usage = inv
            .shell
            .tree()
            .node_at(&inv.path)
            .ok()
            .flatten()
            .and_then(|node| node.usage().cloned());
        return Err(UsageError::new(format!(
            "wsk {} {} needs the name of the {}, or a selected one",
            entity,
            verb,
            singular(entity)
        ))
        .with_usage(usage)
        .into());
    }

    Ok(json!({
        "entity": entity,
        "verb": verb,
        "name": name,
        "params": args.params,
        "annotations": args.annotations,
        "flags": args.flags,
    }))
}

fn singular(entity: &str) -> &str {
    entity.strip_suffix('s').unwrap_or(entity)
}
