// src/config.rs

use crate::{
    constants::{CONFIG_DIR_NAME, CONFIG_FILENAME, DEFAULT_PROMPT},
    core::path::normalize,
    models::Selection,
    plugins::DEFAULT_PRELOAD,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not write the config file atomically: {0}")]
    TempFile(#[from] tempfile::PersistError),
    #[error("Could not find the system config directory.")]
    ConfigDirNotFound,
    #[error("Could not expand config path '{template}': {message}")]
    Expand { template: String, message: String },
    #[error("Failed to parse {path}: {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize the shell config to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings read from `shell.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ShellConfig {
    /// Prompt printed before each REPL line.
    pub prompt: String,
    /// Plugins to preload, in order.
    pub plugins: Vec<String>,
    /// Plugins never preloaded, even when listed or passed with `--plugin`.
    pub disabled: Vec<String>,
    /// Entity selected when the shell starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            plugins: DEFAULT_PRELOAD.iter().map(|p| p.to_string()).collect(),
            disabled: Vec::new(),
            selection: None,
        }
    }
}

impl ShellConfig {
    /// The configured plugins followed by `extra`, without duplicates and
    /// without anything listed in `disabled`. Paths are compared normalized.
    pub fn preload_list(&self, extra: &[String]) -> Vec<String> {
        let disabled: Vec<String> = self
            .disabled
            .iter()
            .filter_map(|p| normalize(p).ok())
            .map(|p| p.to_string())
            .collect();

        let mut list: Vec<String> = Vec::new();
        for raw in self.plugins.iter().chain(extra) {
            let key = normalize(raw)
                .map(|p| p.to_string())
                .unwrap_or_else(|_| raw.clone());
            if disabled.contains(&key) {
                log::debug!("Plugin '{}' is disabled in the config; skipping", key);
                continue;
            }
            if !list.contains(&key) {
                list.push(key);
            }
        }
        list
    }
}

/// `<config_dir>/cmdtree/shell.toml`.
pub fn default_config_path() -> ConfigResult<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME);
    Ok(dir.join(CONFIG_FILENAME))
}

/// The config file to use: `template` with `~` and `$VARS` expanded, or the default location.
pub fn resolve_config_path(template: Option<&str>) -> ConfigResult<PathBuf> {
    match template {
        Some(template) => {
            // `shellexpand::full` handles both home dir and env vars across platforms.
            let expanded = shellexpand::full(template).map_err(|e| ConfigError::Expand {
                template: template.to_string(),
                message: e.to_string(),
            })?;
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_config_path(),
    }
}

/// Reads the config at `path`, writing the defaults there first if it does not exist.
pub fn load_or_create(path: &Path) -> ConfigResult<ShellConfig> {
    if !path.exists() {
        let default_config = ShellConfig::default();
        save(path, &default_config)?;
        log::info!("Created default config at {}", path.display());
        return Ok(default_config);
    }

    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.display().to_string(),
        source,
    })
}

/// Writes `config` to `path` through a temporary file in the same directory,
/// so readers never see a half-written file.
pub fn save(path: &Path, config: &ShellConfig) -> ConfigResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let toml_string = toml::to_string_pretty(config)?;
    let mut temp_file = NamedTempFile::new_in(&dir)?;
    temp_file.write_all(toml_string.as_bytes())?;
    temp_file.persist(path)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILENAME);

        let config = load_or_create(&path).unwrap();
        assert_eq!(config, ShellConfig::default());
        assert!(path.exists());

        // Second load reads what the first one wrote.
        assert_eq!(load_or_create(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_config_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"
prompt = "ow> "
disabled = ["/openwhisk-extensions/actions/invoke"]

[selection]
kind = "actions"
name = "hello"
"#,
        )
        .unwrap();

        let config = load_or_create(&path).unwrap();
        assert_eq!(config.prompt, "ow> ");
        assert_eq!(config.plugins, ShellConfig::default().plugins);
        assert_eq!(config.selection, Some(Selection::new("actions", "hello")));
    }

    #[test]
    fn test_invalid_toml_reports_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "plugins = not-a-list").unwrap();

        let err = load_or_create(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse { .. }));
        assert!(err.to_string().contains(CONFIG_FILENAME));
    }

    #[test]
    fn test_preload_list_dedups_and_skips_disabled() {
        let config = ShellConfig {
            plugins: vec!["/ui/help".into(), "/openwhisk-core".into()],
            disabled: vec!["openwhisk-extensions/actions/invoke/".into()],
            ..ShellConfig::default()
        };
        let extra = vec![
            "ui/help".to_string(),
            "/openwhisk-extensions/actions/invoke".to_string(),
            "/ui/selection".to_string(),
        ];
        assert_eq!(
            config.preload_list(&extra),
            vec!["/ui/help", "/openwhisk-core", "/ui/selection"]
        );
    }

    #[test]
    fn test_resolve_config_path_expands_variables() {
        let explicit = resolve_config_path(Some("/tmp/cmdtree.toml")).unwrap();
        assert_eq!(explicit, PathBuf::from("/tmp/cmdtree.toml"));
        assert!(resolve_config_path(Some("$CMDTREE_SURELY_UNSET_VAR/x.toml")).is_err());

        if let Some(home) = dirs::home_dir() {
            let expanded = resolve_config_path(Some("~/shell.toml")).unwrap();
            assert_eq!(expanded, home.join("shell.toml"));
        }
    }
}
