//! # Plugin Loader
//!
//! `Prequire` loads plugins on demand and memoizes their exports. Plugins are
//! looked up by normalized path in a catalog of init functions; each init
//! function receives a [`PluginContext`] giving it the command tree to register
//! into and the loader itself to pull in the plugins it depends on.
//!
//! ## Lifecycle
//!
//! A plugin path is *unresolved* until first required, *loading* while its init
//! function runs, and *loaded* afterwards. Loaded exports are cached for the
//! rest of the process, so a plugin's registration code runs at most once.
//! Requiring a plugin that is still *loading* means the dependency graph has a
//! cycle and fails with [`LoadError::Circular`].

use crate::{
    core::{
        path::{CommandPath, PathError, normalize},
        tree::CommandTree,
    },
    dev_utils::BlockTimer,
};
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A plugin's public API, as seen by the plugins that require it.
pub type Exports = Arc<dyn Any + Send + Sync>;

/// Exports of a plugin that only registers commands.
pub fn no_exports() -> Exports {
    Arc::new(())
}

/// A plugin body.
pub type PluginInit = Arc<dyn Fn(&mut PluginContext<'_>) -> anyhow::Result<Exports> + Send + Sync>;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Unknown plugin '{path}'.")]
    UnknownPlugin { path: String },
    #[error("Circular plugin dependency: {}.", .chain.join(" -> "))]
    Circular { path: String, chain: Vec<String> },
    #[error("Plugin '{path}' failed to load: {source}")]
    PluginFailed {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Plugin '{path}' does not export a {expected}.")]
    ExportType { path: String, expected: &'static str },
}

type LoadResult<T> = Result<T, LoadError>;

/// Where a plugin is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Unresolved,
    Loading,
    Loaded,
}

enum Slot {
    Loading,
    Loaded(Exports),
}

/// A statically known plugin, for catalogs declared as tables.
#[derive(Debug, Clone, Copy)]
pub struct PluginDefinition {
    pub path: &'static str,
    pub init: fn(&mut PluginContext<'_>) -> anyhow::Result<Exports>,
}

/// What a plugin body gets to work with.
pub struct PluginContext<'a> {
    pub tree: &'a mut CommandTree,
    loader: &'a mut Prequire,
}

impl PluginContext<'_> {
    /// Loads (or fetches the cached exports of) another plugin.
    pub fn require(&mut self, path: &str) -> LoadResult<Exports> {
        self.loader.require(self.tree, path)
    }

    /// Like [`PluginContext::require`], downcasting the exports to `T`.
    pub fn require_as<T: Any + Send + Sync>(&mut self, path: &str) -> LoadResult<Arc<T>> {
        self.loader.require_as(self.tree, path)
    }
}

impl fmt::Debug for PluginContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("loading", &self.loader.stack)
            .finish_non_exhaustive()
    }
}

/// The memoizing plugin loader.
#[derive(Default)]
pub struct Prequire {
    catalog: HashMap<CommandPath, PluginInit>,
    cache: HashMap<CommandPath, Slot>,
    /// Plugins currently loading, outermost first.
    stack: Vec<CommandPath>,
}

impl Prequire {
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader whose catalog holds every definition in `definitions`.
    pub fn from_definitions(definitions: &[PluginDefinition]) -> LoadResult<Self> {
        let mut loader = Self::new();
        for definition in definitions {
            loader.define(definition.path, definition.init)?;
        }
        Ok(loader)
    }

    /// Adds a plugin to the catalog. Defining a path twice replaces the body,
    /// but a plugin that has already loaded keeps its cached exports.
    pub fn define<F>(&mut self, path: &str, init: F) -> LoadResult<()>
    where
        F: Fn(&mut PluginContext<'_>) -> anyhow::Result<Exports> + Send + Sync + 'static,
    {
        let path = normalize(path)?;
        if self.catalog.insert(path.clone(), Arc::new(init)).is_some() {
            log::warn!("Plugin '{}' was defined twice; keeping the latest body", path);
        }
        Ok(())
    }

    pub fn is_defined(&self, path: &str) -> bool {
        normalize(path).is_ok_and(|path| self.catalog.contains_key(&path))
    }

    pub fn state(&self, path: &str) -> ModuleState {
        let Ok(path) = normalize(path) else {
            return ModuleState::Unresolved;
        };
        match self.cache.get(&path) {
            None => ModuleState::Unresolved,
            Some(Slot::Loading) => ModuleState::Loading,
            Some(Slot::Loaded(_)) => ModuleState::Loaded,
        }
    }

    /// Paths of every loaded plugin, sorted.
    pub fn loaded(&self) -> Vec<&CommandPath> {
        let mut loaded: Vec<&CommandPath> = self
            .cache
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Loaded(_)))
            .map(|(path, _)| path)
            .collect();
        loaded.sort();
        loaded
    }

    /// Loads the plugin at `path` into `tree`, or returns its cached exports.
    ///
    /// # Errors
    /// - `UnknownPlugin` if nothing is defined at `path`.
    /// - `Circular` if `path` is already loading further up the stack.
    /// - `PluginFailed` if the plugin body returned an error. Load errors raised
    ///   by the plugins it required are passed through as they are.
    pub fn require(&mut self, tree: &mut CommandTree, path: &str) -> LoadResult<Exports> {
        let path = normalize(path)?;

        match self.cache.get(&path) {
            Some(Slot::Loaded(exports)) => {
                log::trace!("Plugin '{}' served from cache", path);
                return Ok(exports.clone());
            }
            Some(Slot::Loading) => {
                let mut chain: Vec<String> = self.stack.iter().map(ToString::to_string).collect();
                chain.push(path.to_string());
                return Err(LoadError::Circular {
                    path: path.to_string(),
                    chain,
                });
            }
            None => {}
        }

        let init = self
            .catalog
            .get(&path)
            .cloned()
            .ok_or_else(|| LoadError::UnknownPlugin {
                path: path.to_string(),
            })?;

        log::debug!("Loading plugin '{}'", path);
        self.cache.insert(path.clone(), Slot::Loading);
        self.stack.push(path.clone());

        // Whatever happens in the plugin body, leave the stack balanced and never
        // leave a half-loaded entry behind.
        let key = path.clone();
        let mut loader = scopeguard::guard(&mut *self, move |loader| {
            loader.stack.pop();
            if matches!(loader.cache.get(&key), Some(Slot::Loading)) {
                loader.cache.remove(&key);
            }
        });

        let result = {
            let _timer = BlockTimer::new(format!("plugin {}", path));
            let mut ctx = PluginContext {
                tree,
                loader: &mut **loader,
            };
            init(&mut ctx)
        };

        match result {
            Ok(exports) => {
                loader
                    .cache
                    .insert(path.clone(), Slot::Loaded(exports.clone()));
                log::debug!("Plugin '{}' loaded", path);
                Ok(exports)
            }
            Err(err) => match err.downcast::<LoadError>() {
                Ok(load_error) => Err(load_error),
                Err(source) => Err(LoadError::PluginFailed {
                    path: path.to_string(),
                    source,
                }),
            },
        }
    }

    /// Requires `path` and downcasts its exports to `T`.
    pub fn require_as<T: Any + Send + Sync>(
        &mut self,
        tree: &mut CommandTree,
        path: &str,
    ) -> LoadResult<Arc<T>> {
        let exports = self.require(tree, path)?;
        exports
            .downcast::<T>()
            .map_err(|_| LoadError::ExportType {
                path: path.to_string(),
                expected: type_name::<T>(),
            })
    }
}

impl fmt::Debug for Prequire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut defined: Vec<String> = self.catalog.keys().map(ToString::to_string).collect();
        defined.sort();
        f.debug_struct("Prequire")
            .field("defined", &defined)
            .field("loaded", &self.loaded())
            .field("loading", &self.stack)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{core::handler::Handler, models::CommandOptions};
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_require_runs_body_once_and_returns_identical_exports() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let mut loader = Prequire::new();
        loader
            .define("/plugins/counter", move |ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                ctx.tree.listen(
                    "/count",
                    Handler::new(|_| Ok(json!(1))),
                    CommandOptions::new(),
                )?;
                Ok(Arc::new(String::from("counter api")) as Exports)
            })
            .unwrap();

        let mut tree = CommandTree::new();
        let first = loader.require(&mut tree, "/plugins/counter").unwrap();
        let second = loader.require(&mut tree, "plugins/counter/").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(loader.state("/plugins/counter"), ModuleState::Loaded);
        assert!(tree.find("/count").unwrap().is_some());
    }

    #[test]
    fn test_circular_require_is_detected() {
        let mut loader = Prequire::new();
        loader
            .define("/x", |ctx| {
                ctx.require("/y")?;
                Ok(no_exports())
            })
            .unwrap();
        loader
            .define("/y", |ctx| {
                ctx.require("/x")?;
                Ok(no_exports())
            })
            .unwrap();

        let mut tree = CommandTree::new();
        match loader.require(&mut tree, "/x") {
            Err(LoadError::Circular { path, chain }) => {
                assert_eq!(path, "/x");
                assert_eq!(chain, vec!["/x", "/y", "/x"]);
            }
            other => panic!("expected a circular load error, got {:?}", other.map(|_| ())),
        }

        // Neither plugin is left half-loaded.
        assert_eq!(loader.state("/x"), ModuleState::Unresolved);
        assert_eq!(loader.state("/y"), ModuleState::Unresolved);
    }

    #[test]
    fn test_failed_plugin_leaves_other_entries_intact() {
        let mut loader = Prequire::new();
        loader.define("/good", |_| Ok(no_exports())).unwrap();
        loader
            .define("/bad", |ctx| {
                ctx.require("/good")?;
                Err(anyhow!("backend unreachable"))
            })
            .unwrap();

        let mut tree = CommandTree::new();
        let err = loader.require(&mut tree, "/bad").unwrap_err();
        assert!(matches!(err, LoadError::PluginFailed { ref path, .. } if path == "/bad"));
        assert!(err.to_string().contains("backend unreachable"));

        assert_eq!(loader.state("/good"), ModuleState::Loaded);
        assert_eq!(loader.state("/bad"), ModuleState::Unresolved);
    }

    #[test]
    fn test_nested_load_errors_pass_through_unchanged() {
        let mut loader = Prequire::new();
        loader
            .define("/outer", |ctx| {
                ctx.require("/missing")?;
                Ok(no_exports())
            })
            .unwrap();

        let mut tree = CommandTree::new();
        assert!(matches!(
            loader.require(&mut tree, "/outer"),
            Err(LoadError::UnknownPlugin { ref path }) if path == "/missing"
        ));
    }

    #[test]
    fn test_require_as_downcasts_exports() {
        let mut loader = Prequire::new();
        loader
            .define("/api", |_| Ok(Arc::new(vec![1u8, 2, 3]) as Exports))
            .unwrap();

        let mut tree = CommandTree::new();
        let api = loader.require_as::<Vec<u8>>(&mut tree, "/api").unwrap();
        assert_eq!(api.as_slice(), &[1, 2, 3]);

        assert!(matches!(
            loader.require_as::<String>(&mut tree, "/api"),
            Err(LoadError::ExportType { .. })
        ));
    }

    #[test]
    fn test_from_definitions_and_invalid_paths() {
        fn noop(_: &mut PluginContext<'_>) -> anyhow::Result<Exports> {
            Ok(no_exports())
        }

        let loader = Prequire::from_definitions(&[PluginDefinition {
            path: "/noop",
            init: noop,
        }])
        .unwrap();
        assert!(loader.is_defined("noop"));
        assert!(!loader.is_defined("/other"));

        let mut loader = loader;
        let mut tree = CommandTree::new();
        assert!(matches!(
            loader.require(&mut tree, " / "),
            Err(LoadError::Path(_))
        ));
        assert!(matches!(
            loader.define("", noop),
            Err(LoadError::Path(_))
        ));
    }
}
