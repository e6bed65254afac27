//! cmdtree: a trie-structured command router for interactive shells.
//!
//! Plugins register commands into a [`core::tree::CommandTree`] through the
//! memoizing [`core::prequire::Prequire`] loader. The finished tree is frozen
//! inside a [`core::dispatcher::Shell`], which turns lines of user input into
//! handler calls.

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod dev_utils;
pub mod models;
pub mod plugins;
