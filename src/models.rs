// src/models.rs

use crate::core::selection::SelectionFilter;
use serde::{Deserialize, Serialize};

// --- USAGE MODEL ---
// Stored on nodes at registration time and handed to help renderers as-is.
// The dispatcher only ever reads the `boolean` marker of optional args.

/// Describes one argument of a command for help output.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: String,
    #[serde(default)]
    pub docs: Option<String>,
    /// A boolean flag takes no value, so `--async foo` keeps `foo` positional.
    #[serde(default)]
    pub boolean: bool,
    /// Short alias of a flag (`-a` for `--async`).
    #[serde(default)]
    pub alias: Option<String>,
}

impl ArgSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn docs(mut self, docs: impl Into<String>) -> Self {
        self.docs = Some(docs.into());
        self
    }

    pub fn boolean(mut self) -> Self {
        self.boolean = true;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The bare flag names this argument answers to (`--name` and `-alias`, without dashes).
    pub fn flag_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.trim_start_matches('-'))
            .chain(self.alias.iter().map(|a| a.trim_start_matches('-')))
    }
}

/// Structured help for a command or subtree.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub required: Vec<ArgSpec>,
    #[serde(default)]
    pub optional: Vec<ArgSpec>,
}

impl Usage {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn required(mut self, arg: ArgSpec) -> Self {
        self.required.push(arg);
        self
    }

    pub fn optional(mut self, arg: ArgSpec) -> Self {
        self.optional.push(arg);
        self
    }

    /// One line summary used by listings: the header, else the title.
    pub fn summary(&self) -> Option<&str> {
        self.header.as_deref().or(self.title.as_deref())
    }
}

// --- CURRENT SELECTION ---

/// The entity the user is currently looking at, as reported by the UI.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Entity kind in its plural form, e.g. `actions` or `packages`.
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Selection {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: None,
        }
    }

    /// `namespace/name`, or just `name` outside any namespace.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

// --- REGISTRATION OPTIONS ---

/// Options attached to a node at registration time.
///
/// Precondition fields (`require_selection`, `filter`) and `boolean_flags` are
/// read through synonym links from the canonical node; `usage` and `hide`
/// belong to each node individually.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    pub usage: Option<Usage>,
    pub docs: Option<String>,
    pub require_selection: bool,
    pub filter: Option<SelectionFilter>,
    pub hide: bool,
    pub boolean_flags: Vec<String>,
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn docs(mut self, docs: impl Into<String>) -> Self {
        self.docs = Some(docs.into());
        self
    }

    pub fn require_selection(mut self) -> Self {
        self.require_selection = true;
        self
    }

    pub fn filter(mut self, filter: SelectionFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn hide(mut self) -> Self {
        self.hide = true;
        self
    }

    pub fn boolean_flag(mut self, name: impl Into<String>) -> Self {
        self.boolean_flags.push(name.into());
        self
    }

    /// Every flag name this command declares as boolean, from `boolean_flags`
    /// and from optional usage args marked boolean.
    pub fn declared_boolean_flags(&self) -> Vec<&str> {
        let mut flags: Vec<&str> = self
            .boolean_flags
            .iter()
            .map(|f| f.trim_start_matches('-'))
            .collect();
        if let Some(usage) = &self.usage {
            flags.extend(
                usage
                    .optional
                    .iter()
                    .filter(|arg| arg.boolean)
                    .flat_map(ArgSpec::flag_names),
            );
        }
        flags
    }

    /// Short text for listings.
    pub fn summary(&self) -> Option<&str> {
        self.docs
            .as_deref()
            .or_else(|| self.usage.as_ref().and_then(Usage::summary))
    }
}
