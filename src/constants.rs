// src/constants.rs

/// The name of the directory holding cmdtree configuration (inside the system config dir).
pub const CONFIG_DIR_NAME: &str = "cmdtree";

/// The name of the shell configuration file (inside the config dir).
pub const CONFIG_FILENAME: &str = "shell.toml";

/// Prompt shown by the REPL when the config does not set one.
pub const DEFAULT_PROMPT: &str = "wsk> ";

/// Root of the OpenWhisk command subtree.
pub const WSK_ROOT: &str = "/wsk";

// --- Built-in plugin paths ---

pub const OPENWHISK_CORE_PLUGIN: &str = "/openwhisk-core";

pub const INVOKE_EXTENSION_PLUGIN: &str = "/openwhisk-extensions/actions/invoke";

pub const HELP_PLUGIN: &str = "/ui/help";

pub const SELECTION_PLUGIN: &str = "/ui/selection";
