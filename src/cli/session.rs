// src/cli/session.rs

use crate::{
    config::ShellConfig,
    constants::SELECTION_PLUGIN,
    core::{
        dispatcher::Shell,
        prequire::{ModuleState, Prequire},
        selection::SharedSelection,
        tree::CommandTree,
    },
    plugins::BUILTIN_PLUGINS,
};
use anyhow::{Context, Result};
use std::sync::Arc;

/// A ready-to-use shell: plugins loaded, tree frozen, selection seeded.
#[derive(Debug)]
pub struct Session {
    pub shell: Shell,
    pub selection: SharedSelection,
    pub prompt: String,
    /// Plugins that were loaded, directly or as dependencies.
    pub loaded: Vec<String>,
}

impl Session {
    /// Loads the configured plugins plus `extra_plugins` and freezes the result.
    ///
    /// # Errors
    /// Fails on the first plugin that cannot be loaded.
    pub fn start(config: &ShellConfig, extra_plugins: &[String]) -> Result<Self> {
        let mut loader = Prequire::from_definitions(BUILTIN_PLUGINS)?;
        let mut tree = CommandTree::new();

        for path in config.preload_list(extra_plugins) {
            loader
                .require(&mut tree, &path)
                .with_context(|| format!("Failed to preload plugin '{}'", path))?;
        }

        // Without the selection plugin nothing can select, but the slot still seeds from config.
        let selection = if loader.state(SELECTION_PLUGIN) == ModuleState::Loaded {
            loader
                .require_as::<SharedSelection>(&mut tree, SELECTION_PLUGIN)?
                .as_ref()
                .clone()
        } else {
            SharedSelection::default()
        };
        if let Some(initial) = config.selection.clone() {
            log::debug!("Seeding selection with {} '{}'", initial.kind, initial.name);
            selection.select(initial);
        }

        let loaded = loader.loaded().iter().map(ToString::to_string).collect();
        let shell = Shell::with_selection(tree, Arc::new(selection.clone()));
        log::debug!("Session ready: {:?}", shell);

        Ok(Self {
            shell,
            selection,
            prompt: config.prompt.clone(),
            loaded,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::{
        constants::{HELP_PLUGIN, INVOKE_EXTENSION_PLUGIN, OPENWHISK_CORE_PLUGIN},
        core::selection::SelectionProvider,
        models::Selection,
    };
    use serde_json::json;

    #[tokio::test]
    async fn test_default_session_wires_selection_into_the_shell() {
        let config = ShellConfig {
            selection: Some(Selection::new("actions", "hello")),
            ..ShellConfig::default()
        };
        let session = Session::start(&config, &[]).unwrap();

        assert_eq!(session.selection.current_selection().unwrap().name, "hello");
        let got = session.shell.exec("wsk action get").await.unwrap();
        assert_eq!(got["name"], "hello");

        session.shell.exec("select package utils").await.unwrap();
        let got = session.shell.exec("wsk p get").await.unwrap();
        assert_eq!(got["name"], "utils");
    }

    #[tokio::test]
    async fn test_disabled_plugins_are_not_loaded() {
        let config = ShellConfig {
            plugins: vec![OPENWHISK_CORE_PLUGIN.into(), INVOKE_EXTENSION_PLUGIN.into()],
            disabled: vec![INVOKE_EXTENSION_PLUGIN.into()],
            ..ShellConfig::default()
        };
        let session = Session::start(&config, &[]).unwrap();
        assert_eq!(session.loaded, vec![OPENWHISK_CORE_PLUGIN]);

        let invoked = session.shell.exec("wsk a invoke hello").await.unwrap();
        assert_eq!(invoked["flags"], json!({}));
        assert!(session.shell.exec("help").await.is_err());
    }

    #[test]
    fn test_dependencies_load_with_their_dependents() {
        let config = ShellConfig {
            plugins: vec![],
            ..ShellConfig::default()
        };
        let extra = vec![INVOKE_EXTENSION_PLUGIN.to_string(), HELP_PLUGIN.to_string()];
        let session = Session::start(&config, &extra).unwrap();
        assert_eq!(
            session.loaded,
            vec![OPENWHISK_CORE_PLUGIN, INVOKE_EXTENSION_PLUGIN, HELP_PLUGIN]
        );
    }

    #[test]
    fn test_unknown_plugin_fails_with_context() {
        let err = Session::start(&ShellConfig::default(), &["/nope".to_string()]).unwrap_err();
        assert!(err.to_string().contains("/nope"));
    }
}
