// src/core/rewrite.rs

use crate::core::{path::CommandPath, tree::TreeError};

/// `alias` prefix is replaced by `target` prefix before the trie is walked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    pub alias: CommandPath,
    pub target: CommandPath,
}

/// The subtree synonyms declared so far.
///
/// Rules are applied lazily to each lookup, so an alias also reaches children
/// registered under its target after the alias was declared.
#[derive(Debug, Clone, Default)]
pub struct RewriteRules {
    rules: Vec<RewriteRule>,
}

impl RewriteRules {
    /// Declares `alias` as a synonym prefix for `target`.
    ///
    /// Re-declaring an alias replaces its target. Rules that would make
    /// rewriting non-idempotent are rejected: an alias that is a prefix of its
    /// own target, or one that closes a cycle with existing rules.
    pub fn add(&mut self, alias: CommandPath, target: CommandPath) -> Result<(), TreeError> {
        if target.starts_with(&alias) {
            return Err(TreeError::SelfReferentialSynonym {
                alias: alias.to_string(),
                target: target.to_string(),
            });
        }

        let previous = self
            .rules
            .iter()
            .position(|rule| rule.alias == alias)
            .map(|i| self.rules.remove(i));

        self.rules.push(RewriteRule {
            alias: alias.clone(),
            target: target.clone(),
        });

        if self.rewrite(alias.segments()).is_none() {
            self.rules.pop();
            if let Some(previous) = previous {
                self.rules.push(previous);
            }
            return Err(TreeError::SelfReferentialSynonym {
                alias: alias.to_string(),
                target: target.to_string(),
            });
        }

        if let Some(previous) = previous {
            log::debug!(
                "Subtree synonym '{}' re-pointed from '{}' to '{}'",
                alias,
                previous.target,
                target
            );
        }
        Ok(())
    }

    /// Rewrites the leading tokens that match an alias, repeatedly, until no
    /// alias matches. Returns `None` if the rules never settle.
    pub fn rewrite(&self, tokens: &[String]) -> Option<Vec<String>> {
        let mut current = tokens.to_vec();

        // Each pass applies one rule; more passes than rules means a cycle.
        for _ in 0..=self.rules.len() {
            let Some(rule) = self.longest_match(&current) else {
                return Some(current);
            };
            let rest = current.split_off(rule.alias.len());
            log::trace!(
                "Rewriting prefix '{}' -> '{}' (rest: {:?})",
                rule.alias,
                rule.target,
                rest
            );
            current = rule.target.segments().to_vec();
            current.extend(rest);
        }

        None
    }

    /// Rewrites a path; paths the rules do not touch come back unchanged.
    pub fn rewrite_path(&self, path: &CommandPath) -> CommandPath {
        self.rewrite(path.segments())
            .and_then(|segments| CommandPath::from_segments(segments).ok())
            .unwrap_or_else(|| path.clone())
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    fn longest_match(&self, tokens: &[String]) -> Option<&RewriteRule> {
        self.rules
            .iter()
            .filter(|rule| tokens.starts_with(rule.alias.segments()))
            .max_by_key(|rule| rule.alias.len())
    }
}
