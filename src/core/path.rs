// src/core/path.rs

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Invalid command path '{raw}': a path needs at least one non-empty segment.")]
    Invalid { raw: String },
}

/// The canonical address of a command in the tree, e.g. `/wsk/actions/invoke`.
///
/// A `CommandPath` always holds at least one segment and none of its segments
/// are empty, so two paths compare equal exactly when their canonical strings do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandPath {
    segments: Vec<String>,
}

/// Splits a human-friendly or canonical path on `/`, drops empty segments and
/// returns the canonical form.
///
/// `"/wsk/actions/"`, `"wsk/actions"` and `"//wsk//actions"` all normalize to
/// `/wsk/actions`.
///
/// # Errors
/// Returns `PathError::Invalid` when nothing but slashes or whitespace remains.
pub fn normalize(path: &str) -> Result<CommandPath, PathError> {
    let segments: Vec<String> = path
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();

    if segments.is_empty() {
        return Err(PathError::Invalid {
            raw: path.to_string(),
        });
    }
    Ok(CommandPath { segments })
}

impl CommandPath {
    /// Builds a path from already tokenized segments (e.g. the words of an input line).
    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let raw: Vec<String> = segments
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        normalize(&raw.join("/"))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; kept for the `len`/`is_empty` pair.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The final segment, i.e. the command's own name.
    pub fn last(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// The enclosing path, or `None` for a top-level command.
    pub fn parent(&self) -> Option<CommandPath> {
        if self.segments.len() < 2 {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(CommandPath { segments })
    }

    /// Appends one segment. A blank segment leaves the path unchanged.
    pub fn join(&self, segment: &str) -> CommandPath {
        let mut segments = self.segments.clone();
        segments.extend(
            segment
                .split('/')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        CommandPath { segments }
    }

    /// Segment-wise prefix test: `/wsk/action` is not a prefix of `/wsk/actions`.
    pub fn starts_with(&self, prefix: &CommandPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// The segments left after removing `prefix`, if `prefix` is a prefix.
    pub fn strip_prefix(&self, prefix: &CommandPath) -> Option<&[String]> {
        self.segments.strip_prefix(prefix.segments.as_slice())
    }
}

impl fmt::Display for CommandPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for CommandPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

impl TryFrom<&str> for CommandPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        normalize(value)
    }
}

impl TryFrom<String> for CommandPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        normalize(&value)
    }
}

impl TryFrom<&String> for CommandPath {
    type Error = PathError;

    fn try_from(value: &String) -> Result<Self, Self::Error> {
        normalize(value)
    }
}

impl TryFrom<&CommandPath> for CommandPath {
    type Error = PathError;

    fn try_from(value: &CommandPath) -> Result<Self, Self::Error> {
        Ok(value.clone())
    }
}

impl Serialize for CommandPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CommandPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        normalize(&raw).map_err(serde::de::Error::custom)
    }
}
