// src/cli/mod.rs

use clap::Parser;

pub mod render;
pub mod repl;
pub mod session;

/// cmdtree: an interactive OpenWhisk command shell.
///
/// Without `-c`, reads commands from standard input, one per line.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Run a single command line and exit (e.g. -c "wsk action list").
    #[arg(short = 'c', long = "command")]
    pub command: Option<String>,

    /// Config file to use instead of <config_dir>/cmdtree/shell.toml. `~` and $VARS are expanded.
    #[arg(long)]
    pub config: Option<String>,

    /// Additional plugin to preload. May be given more than once.
    #[arg(long = "plugin", value_name = "PATH")]
    pub plugins: Vec<String>,

    /// Print every result as JSON, strings included.
    #[arg(long)]
    pub json: bool,
}
