//! # Dispatcher
//!
//! Turns a line of user input into a handler call:
//!
//! 1. **Tokenize** with shell quoting rules (quoted substrings are single tokens).
//! 2. **Rewrite** leading tokens through the subtree synonyms.
//! 3. **Walk** the trie greedily. The deepest registered node on the walked path wins.
//! 4. **Parse options** from the remaining tokens.
//! 5. **Check preconditions** (`require_selection`, `filter`) against the current selection.
//! 6. **Invoke** the handler and await its reply. Handler errors are passed through untouched.

use crate::{
    core::{
        arg_parser::{ParsedArgs, ParsedOptions, is_flag},
        handler::{Handler, HandlerError, Invocation, Reply},
        path::CommandPath,
        selection::{NoSelection, SelectionProvider},
        tree::{CommandNode, CommandTree},
    },
    models::{Selection, Usage},
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Suggestions further away than this are not worth showing.
const MAX_SUGGESTION_DISTANCE: usize = 2;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Nothing to execute.")]
    EmptyInput,
    #[error("Could not parse '{line}': unterminated quote.")]
    Parse { line: String },
    #[error("Command not found: '{input}'.{}", did_you_mean(.suggestion))]
    CommandNotFound {
        input: String,
        suggestion: Option<String>,
    },
    #[error("'{path}' needs a verb.{}", available_verbs(.verbs))]
    NeedsVerb {
        path: CommandPath,
        usage: Option<Usage>,
        verbs: Vec<String>,
    },
    #[error("'{path}' requires a selection, but you have not selected an entity.")]
    NoSelection { path: CommandPath },
    #[error("'{path}' operates on {expected}, but the current selection is '{}' ({}).", .selected.name, .selected.kind)]
    SelectionTypeMismatch {
        path: CommandPath,
        expected: String,
        selected: Selection,
    },
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" Did you mean '{}'?", s))
        .unwrap_or_default()
}

fn available_verbs(verbs: &[String]) -> String {
    if verbs.is_empty() {
        " It has no commands to run yet.".to_string()
    } else {
        format!(" Available: {}.", verbs.join(", "))
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// A resolved input line, ready for precondition checks and invocation.
#[derive(Debug)]
pub struct Resolution<'s> {
    /// The canonical node (synonyms already followed).
    pub node: &'s CommandNode,
    pub handler: Handler,
    pub argv: Vec<String>,
    pub full_argv: Vec<String>,
    pub options: ParsedOptions,
    pub raw: String,
}

/// Splits an input line into tokens, keeping quoted substrings together.
/// Words starting with `#` are ordinary tokens, not comments.
pub fn tokenize(line: &str) -> DispatchResult<Vec<String>> {
    let tokens = shlex::split(&escape_comment_marks(line)).ok_or_else(|| DispatchError::Parse {
        line: line.to_string(),
    })?;
    if tokens.is_empty() {
        return Err(DispatchError::EmptyInput);
    }
    Ok(tokens)
}

/// Escapes every unquoted `#` that opens a word, so `shlex` keeps it.
fn escape_comment_marks(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut word_start = true;

    for c in line.chars() {
        if escaped {
            escaped = false;
        } else {
            match quote {
                Some(q) if c == q => quote = None,
                Some('"') if c == '\\' => escaped = true,
                Some(_) => {}
                None => match c {
                    '\\' => escaped = true,
                    '\'' | '"' => quote = Some(c),
                    '#' if word_start => out.push('\\'),
                    _ => {}
                },
            }
        }
        word_start = quote.is_none() && !escaped && c.is_whitespace();
        out.push(c);
    }
    out
}

/// A frozen command tree plus the selection it consults. Cheap to clone; every
/// handler receives one for nested dispatch.
#[derive(Clone)]
pub struct Shell {
    tree: Arc<CommandTree>,
    selection: Arc<dyn SelectionProvider>,
}

impl Shell {
    /// Freezes `tree` with nothing ever selected.
    pub fn new(tree: CommandTree) -> Self {
        Self::with_selection(tree, Arc::new(NoSelection))
    }

    pub fn with_selection(tree: CommandTree, selection: Arc<dyn SelectionProvider>) -> Self {
        Self {
            tree: Arc::new(tree),
            selection,
        }
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    pub fn current_selection(&self) -> Option<Selection> {
        self.selection.current_selection()
    }

    /// Finds the command an input line addresses and parses its arguments.
    pub fn resolve(&self, line: &str) -> DispatchResult<Resolution<'_>> {
        let tokens = tokenize(line)?;
        let tokens = self.tree.rewrite_tokens(&tokens).unwrap_or(tokens);
        log::trace!("Resolving tokens {:?}", tokens);

        let walk = self.tree.walk(&tokens);

        // The deepest node the user actually registered; implicit interior nodes don't count.
        let matched = walk
            .trail
            .iter()
            .copied()
            .enumerate()
            .rev()
            .find(|(_, node)| node.is_registered());

        let Some((depth, matched)) = matched else {
            return Err(self.not_found(&tokens, walk.deepest(), walk.consumed));
        };
        let consumed = depth + 1;

        let node = self.tree.resolve_synonym(matched);
        let Some(handler) = self.tree.handler_of(node) else {
            // An unknown word after a subtree is a typo, not a missing verb.
            let unknown_verb = tokens.get(walk.consumed).is_some_and(|t| !is_flag(t));
            if consumed < walk.consumed || !node.is_subtree() || unknown_verb {
                return Err(self.not_found(&tokens, walk.deepest(), walk.consumed));
            }
            return Err(DispatchError::NeedsVerb {
                path: node.path().clone(),
                usage: node.usage().cloned(),
                verbs: visible_names(self.tree.children(Some(node.path()))),
            });
        };

        let full_argv = tokens.get(consumed..).unwrap_or_default().to_vec();
        let boolean_flags = node.options().declared_boolean_flags();
        let parsed = ParsedArgs::new(&full_argv, &boolean_flags);

        log::debug!(
            "'{}' resolved to '{}' with argv {:?}",
            line.trim(),
            node.path(),
            parsed.positional
        );

        Ok(Resolution {
            node,
            handler: handler.clone(),
            argv: parsed.positional,
            full_argv,
            options: parsed.named,
            raw: line.to_string(),
        })
    }

    /// Resolves a line, checks its preconditions and calls the handler without
    /// waiting for a deferred reply.
    pub fn invoke(&self, line: &str) -> DispatchResult<Reply> {
        let resolution = self.resolve(line)?;
        let selection = self.check_preconditions(resolution.node)?;

        let invocation = Invocation {
            path: resolution.node.path().clone(),
            argv: resolution.argv,
            full_argv: resolution.full_argv,
            options: resolution.options,
            raw: resolution.raw,
            selection,
            shell: self.clone(),
        };
        Ok(resolution.handler.call(invocation))
    }

    /// Executes a line and waits for the handler's result.
    pub async fn exec(&self, line: &str) -> DispatchResult<Value> {
        let reply = self.invoke(line)?;
        Ok(reply.settle().await?)
    }

    /// Nested dispatch from inside a handler. Same semantics as [`Shell::exec`].
    pub async fn qexec(&self, line: &str) -> DispatchResult<Value> {
        log::trace!("qexec: {}", line);
        self.exec(line).await
    }

    fn check_preconditions(&self, node: &CommandNode) -> DispatchResult<Option<Selection>> {
        let options = node.options();
        let selection = self.selection.current_selection();

        if options.require_selection && selection.is_none() {
            return Err(DispatchError::NoSelection {
                path: node.path().clone(),
            });
        }

        if let Some(filter) = &options.filter {
            let Some(selected) = &selection else {
                return Err(DispatchError::NoSelection {
                    path: node.path().clone(),
                });
            };
            if !filter.accepts(selected) {
                return Err(DispatchError::SelectionTypeMismatch {
                    path: node.path().clone(),
                    expected: filter.label().to_string(),
                    selected: selected.clone(),
                });
            }
        }

        Ok(selection)
    }

    fn not_found(
        &self,
        tokens: &[String],
        deepest: Option<&CommandNode>,
        consumed: usize,
    ) -> DispatchError {
        let siblings = self.tree.children(deepest.map(CommandNode::path));
        let suggestion = tokens.get(consumed).and_then(|unknown| {
            suggest(unknown, &visible_names(siblings)).map(|best| {
                let mut corrected: Vec<&str> = tokens
                    .iter()
                    .take(consumed)
                    .map(String::as_str)
                    .collect();
                corrected.push(best);
                corrected.join(" ")
            })
        });

        DispatchError::CommandNotFound {
            input: tokens
                .iter()
                .take(consumed + 1)
                .cloned()
                .collect::<Vec<_>>()
                .join(" "),
            suggestion,
        }
    }
}

impl fmt::Debug for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shell")
            .field("nodes", &self.tree.nodes().count())
            .finish_non_exhaustive()
    }
}

fn visible_names(nodes: Vec<&CommandNode>) -> Vec<String> {
    nodes
        .into_iter()
        .filter(|node| !node.is_hidden() && (node.is_registered() || node.has_children()))
        .map(|node| node.name().to_string())
        .collect()
}

/// The closest candidate to `input`, if any is close enough.
fn suggest<'c>(input: &str, candidates: &'c [String]) -> Option<&'c str> {
    candidates
        .iter()
        .map(|candidate| (candidate, edit_distance(input, candidate)))
        .filter(|(_, distance)| *distance <= MAX_SUGGESTION_DISTANCE)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate.as_str())
}

/// Levenshtein distance over chars.
fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, a_char) in a.chars().enumerate() {
        if let Some(first) = curr.first_mut() {
            *first = i + 1;
        }
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != *b_char);
            let deletion = prev.get(j + 1).copied().unwrap_or(usize::MAX) + 1;
            let insertion = curr.get(j).copied().unwrap_or(usize::MAX) + 1;
            let substitution = prev.get(j).copied().unwrap_or(usize::MAX) + cost;
            if let Some(cell) = curr.get_mut(j + 1) {
                *cell = deletion.min(insertion).min(substitution);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev.last().copied().unwrap_or_default()
}
