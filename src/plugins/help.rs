// src/plugins/help.rs

use crate::{
    core::{
        handler::{Handler, HandlerResult, Invocation, UsageError},
        path::CommandPath,
        prequire::{Exports, PluginContext, no_exports},
        tree::{Binding, CommandNode, CommandTree},
    },
    models::{ArgSpec, CommandOptions, Usage},
};
use clap::Parser;
use serde_json::Value;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Displays the available commands as a tree.")]
struct HelpArgs {
    /// The command subtree to start from, as words (`wsk actions`). Defaults to everything.
    words: Vec<String>,

    /// Limit the depth of the tree display.
    #[arg(long, short)]
    depth: Option<usize>,

    /// Include hidden commands and synonyms.
    #[arg(long)]
    all: bool,
}

/// What to include when rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayOptions {
    pub show_hidden: bool,
    pub max_depth: Option<usize>,
}

/// Plugin body for `/ui/help`.
pub fn init(ctx: &mut PluginContext<'_>) -> anyhow::Result<Exports> {
    let usage = Usage::titled("help")
        .header("Show the available commands")
        .example("help wsk actions")
        .optional(ArgSpec::new("words").docs("the command subtree to describe"))
        .optional(ArgSpec::new("--depth").alias("-d").docs("levels to show"))
        .optional(ArgSpec::new("--all").boolean().docs("include hidden commands"));

    ctx.tree.listen(
        "/help",
        Handler::new(|inv| help(&inv)),
        CommandOptions::new().usage(usage),
    )?;
    ctx.tree.synonym("/?", "/help", CommandOptions::new().hide())?;
    Ok(no_exports())
}

fn help(inv: &Invocation) -> HandlerResult {
    let args = HelpArgs::try_parse_from(&inv.full_argv)
        .map_err(|e| UsageError::new(e.to_string().trim_end()))?;
    let display = DisplayOptions {
        show_hidden: args.all,
        max_depth: args.depth,
    };
    let tree = inv.shell.tree();

    let start = if args.words.is_empty() {
        None
    } else {
        let path = CommandPath::from_segments(&args.words)
            .map_err(|e| UsageError::new(e.to_string()))?;
        if tree.children(Some(&path)).is_empty() && tree.find(&path).ok().flatten().is_none() {
            return Err(UsageError::new(format!(
                "No command or subtree at '{}'.",
                args.words.join(" ")
            ))
            .into());
        }
        Some(path)
    };

    Ok(Value::String(render_command_tree(tree, start.as_ref(), &display)))
}

/// Renders the command tree (or the subtree at `start`) as ASCII art, one
/// command per line, with its summary when it has one.
pub fn render_command_tree(
    tree: &CommandTree,
    start: Option<&CommandPath>,
    options: &DisplayOptions,
) -> String {
    let mut out = String::new();

    if let Some(start) = start {
        // The starting node is printed as a root, without a connector.
        let heading = tree
            .find(start)
            .ok()
            .flatten()
            .map(|node| describe(tree, node))
            .unwrap_or_else(|| start.to_string());
        out.push_str(&heading);
        out.push('\n');
    }

    let roots = visible(tree.children(start), options);
    if roots.is_empty() && start.is_none() {
        out.push_str("No commands are registered.\n");
        return out;
    }

    for (i, node) in roots.iter().enumerate() {
        let is_last = i + 1 == roots.len();
        render_node(tree, node, options, "", is_last, 1, &mut out);
    }
    out
}

/// Appends a node and its descendants to `out`.
fn render_node(
    tree: &CommandTree,
    node: &CommandNode,
    options: &DisplayOptions,
    prefix: &str,
    is_last: bool,
    depth: usize,
    out: &mut String,
) {
    let connector = if is_last { "└─" } else { "├─" };
    out.push_str(&format!("{}{}{}\n", prefix, connector, describe(tree, node)));

    if options.max_depth.is_some_and(|max| depth >= max) {
        return;
    }

    let child_prefix = format!("{}{}", prefix, if is_last { "   " } else { "│  " });
    let children = visible(tree.children(Some(node.path())), options);
    for (i, child) in children.iter().enumerate() {
        let is_last_child = i + 1 == children.len();
        render_node(tree, child, options, &child_prefix, is_last_child, depth + 1, out);
    }
}

/// `name`, `name - summary` or `name -> target` for synonyms.
fn describe(tree: &CommandTree, node: &CommandNode) -> String {
    match node.binding() {
        Binding::SubtreeAlias(target) => format!("{} -> {}", node.name(), target),
        Binding::Synonym(_) => {
            format!("{} -> {}", node.name(), tree.resolve_synonym(node).path())
        }
        _ => match node.options().summary() {
            Some(summary) => format!("{} - {}", node.name(), summary),
            None => node.name().to_string(),
        },
    }
}

fn visible<'t>(nodes: Vec<&'t CommandNode>, options: &DisplayOptions) -> Vec<&'t CommandNode> {
    nodes
        .into_iter()
        .filter(|node| options.show_hidden || !node.is_hidden())
        .filter(|node| node.is_registered() || node.has_children())
        .collect()
}
