//! # Current Selection
//!
//! The shell's UI owns the notion of "the entity the user is currently looking at".
//! The dispatcher only consults it through [`SelectionProvider`] to evaluate the
//! `require_selection` and `filter` preconditions of a command.

use crate::models::Selection;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Read access to the current selection.
pub trait SelectionProvider: Send + Sync {
    fn current_selection(&self) -> Option<Selection>;
}

/// A provider that never has anything selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSelection;

impl SelectionProvider for NoSelection {
    fn current_selection(&self) -> Option<Selection> {
        None
    }
}

/// A selection slot shared between the REPL and the commands that change it.
#[derive(Debug, Clone, Default)]
pub struct SharedSelection {
    slot: Arc<RwLock<Option<Selection>>>,
}

impl SharedSelection {
    pub fn new(initial: Option<Selection>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(initial)),
        }
    }

    /// Replaces the selection, returning the previous one.
    pub fn select(&self, selection: Selection) -> Option<Selection> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(selection)
    }

    pub fn clear(&self) -> Option<Selection> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.take()
    }
}

impl SelectionProvider for SharedSelection {
    fn current_selection(&self) -> Option<Selection> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// A named predicate over the current selection.
///
/// The label is what the user is told they should have selected when the
/// predicate rejects the selection.
#[derive(Clone)]
pub struct SelectionFilter {
    label: String,
    predicate: Arc<dyn Fn(&Selection) -> bool + Send + Sync>,
}

impl SelectionFilter {
    pub fn new<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Selection) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Accepts selections of the given entity kind only.
    pub fn kind(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        let expected = kind.clone();
        Self::new(kind, move |selection| selection.kind == expected)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn accepts(&self, selection: &Selection) -> bool {
        (self.predicate)(selection)
    }
}

impl fmt::Debug for SelectionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionFilter")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
