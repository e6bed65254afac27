// src/core/handler.rs

use crate::{
    core::{arg_parser::ParsedOptions, dispatcher::Shell, path::CommandPath},
    models::{Selection, Usage},
};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// A boxed, `Send` future, as returned by deferred handlers.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// What a handler produces. The value itself is opaque to the dispatcher.
pub type HandlerResult = Result<Value, HandlerError>;

/// The user invoked a command incorrectly. Carries the usage model to show them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct UsageError {
    pub message: String,
    pub usage: Option<Usage>,
}

impl UsageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Option<Usage>) -> Self {
        self.usage = usage;
        self
    }
}

/// The failure half of a handler's result.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Failure(#[from] anyhow::Error),
}

/// A handler's reply: either settled already, or a future the dispatcher awaits.
pub enum Reply {
    Ready(HandlerResult),
    Pending(BoxFuture<HandlerResult>),
}

impl Reply {
    /// Waits for the reply to settle.
    pub async fn settle(self) -> HandlerResult {
        match self {
            Reply::Ready(result) => result,
            Reply::Pending(future) => future.await,
        }
    }
}

impl From<HandlerResult> for Reply {
    fn from(result: HandlerResult) -> Self {
        Reply::Ready(result)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Reply::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Everything a handler is called with.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// The canonical path of the command being executed.
    pub path: CommandPath,
    /// Positional arguments left after option parsing.
    pub argv: Vec<String>,
    /// Every token after the command path, for handlers that re-parse their own flags.
    pub full_argv: Vec<String>,
    pub options: ParsedOptions,
    /// The input line exactly as the user typed it.
    pub raw: String,
    pub selection: Option<Selection>,
    /// Handle for nested dispatch (`qexec`).
    pub shell: Shell,
}

impl Invocation {
    /// True when a flag is present and not explicitly `false`.
    pub fn flag(&self, name: &str) -> bool {
        match self.options.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(_) => true,
            None => false,
        }
    }

    /// The string value of an option, if it has one.
    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.options.get(name).and_then(Value::as_str)
    }

    /// The first positional argument, falling back to the current selection's name.
    pub fn name_or_selection(&self) -> Option<String> {
        self.argv
            .first()
            .cloned()
            .or_else(|| self.selection.as_ref().map(Selection::qualified_name))
    }
}

/// A command implementation, shared by reference between a node and its synonyms.
#[derive(Clone)]
pub struct Handler(Arc<dyn Fn(Invocation) -> Reply + Send + Sync>);

impl Handler {
    /// Wraps a handler that settles immediately.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Invocation) -> HandlerResult + Send + Sync + 'static,
    {
        Self(Arc::new(move |invocation| Reply::Ready(f(invocation))))
    }

    /// Wraps a handler whose result arrives later (network, filesystem, polling).
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self(Arc::new(move |invocation| Reply::Pending(Box::pin(f(invocation)))))
    }

    /// Wraps a handler that decides per call whether to settle now or later.
    pub fn from_reply<F>(f: F) -> Self
    where
        F: Fn(Invocation) -> Reply + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, invocation: Invocation) -> Reply {
        (self.0)(invocation)
    }

    /// Identity comparison: true only for clones of the same handler.
    pub fn same(&self, other: &Handler) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Arc::as_ptr(&self.0))
    }
}
