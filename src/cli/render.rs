// src/cli/render.rs

use crate::{
    core::{
        dispatcher::DispatchError,
        handler::{HandlerError, UsageError},
    },
    models::{ArgSpec, Usage},
};
use colored::Colorize;
use serde_json::Value;

/// Formats a handler's result for the terminal. Strings print as-is unless
/// `json` is set; `null` prints nothing.
pub fn render_value(value: &Value, json: bool) -> Option<String> {
    match value {
        Value::Null if !json => None,
        Value::String(text) if !json => Some(text.trim_end().to_string()),
        other => Some(serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())),
    }
}

/// The error line, followed by usage when the error carries one.
pub fn render_error(err: &DispatchError) -> String {
    let mut out = format!("{}: {}", "Error".red().bold(), err);

    let usage = match err {
        DispatchError::NeedsVerb { usage, .. } => usage.as_ref(),
        DispatchError::Handler(HandlerError::Usage(UsageError { usage, .. })) => usage.as_ref(),
        _ => None,
    };
    if let Some(usage) = usage {
        out.push_str("\n\n");
        out.push_str(&render_usage(usage));
    }
    out
}

/// Plain-text rendering of a usage model.
pub fn render_usage(usage: &Usage) -> String {
    let mut lines = Vec::new();

    match (&usage.title, &usage.header) {
        (Some(title), Some(header)) => lines.push(format!("{}: {}", title.bold(), header)),
        (Some(title), None) => lines.push(title.bold().to_string()),
        (None, Some(header)) => lines.push(header.clone()),
        (None, None) => {}
    }
    if let Some(example) = &usage.example {
        lines.push(format!("Usage: {}", example.cyan()));
    }

    if !usage.required.is_empty() {
        lines.push("Required:".to_string());
        lines.extend(usage.required.iter().map(|arg| arg_line(arg, false)));
    }
    if !usage.optional.is_empty() {
        lines.push("Options:".to_string());
        lines.extend(usage.optional.iter().map(|arg| arg_line(arg, true)));
    }
    lines.join("\n")
}

fn arg_line(arg: &ArgSpec, optional: bool) -> String {
    let mut names = arg.name.clone();
    if let Some(alias) = &arg.alias {
        names = format!("{}, {}", names, alias);
    }
    let names = if optional {
        format!("[{}]", names)
    } else {
        names
    };
    match &arg.docs {
        Some(docs) => format!("  {:<24} {}", names, docs.dimmed()),
        None => format!("  {}", names),
    }
}
