// src/plugins/mod.rs

pub mod help;
pub mod invoke;
pub mod openwhisk;
pub mod params;
pub mod selection;

use crate::{
    constants::{HELP_PLUGIN, INVOKE_EXTENSION_PLUGIN, OPENWHISK_CORE_PLUGIN, SELECTION_PLUGIN},
    core::prequire::PluginDefinition,
};

/// Every plugin shipped with the shell. Adding a plugin means adding an entry here.
pub static BUILTIN_PLUGINS: &[PluginDefinition] = &[
    PluginDefinition {
        path: OPENWHISK_CORE_PLUGIN,
        init: openwhisk::init,
    },
    PluginDefinition {
        path: INVOKE_EXTENSION_PLUGIN,
        init: invoke::init,
    },
    PluginDefinition {
        path: HELP_PLUGIN,
        init: help::init,
    },
    PluginDefinition {
        path: SELECTION_PLUGIN,
        init: selection::init,
    },
];

/// Plugins preloaded when the config does not list any.
pub const DEFAULT_PRELOAD: &[&str] = &[
    SELECTION_PLUGIN,
    HELP_PLUGIN,
    OPENWHISK_CORE_PLUGIN,
    INVOKE_EXTENSION_PLUGIN,
];

/// Finds a built-in plugin by path. Trailing or doubled slashes are ignored.
pub fn find_plugin(path: &str) -> Option<&'static PluginDefinition> {
    let wanted = crate::core::path::normalize(path).ok()?;
    BUILTIN_PLUGINS
        .iter()
        .find(|plugin| crate::core::path::normalize(plugin.path).is_ok_and(|p| p == wanted))
}
