// src/bin/cmdtree.rs

use anyhow::Result;
use clap::Parser;
use cmdtree::{
    cli::{Cli, render, repl, session::Session},
    config,
    core::dispatcher::DispatchError,
};
use colored::*;

/// The main entry point of the `cmdtree` application.
/// It sets up logging, parses arguments, builds the session and performs
/// centralized error handling.
#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()).await {
        // Dispatch errors carry usage worth showing in full.
        if let Some(dispatch_err) = e.downcast_ref::<DispatchError>() {
            eprintln!("{}", render::render_error(dispatch_err));
        } else {
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        }
        std::process::exit(1);
    }
}

async fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let config_path = config::resolve_config_path(cli.config.as_deref())?;
    let shell_config = config::load_or_create(&config_path)?;
    log::debug!("Using config at {}", config_path.display());

    let session = Session::start(&shell_config, &cli.plugins)?;
    log::info!("Loaded plugins: {}", session.loaded.join(", "));

    match cli.command {
        Some(line) => {
            let value = session.shell.exec(&line).await?;
            if let Some(text) = render::render_value(&value, cli.json) {
                println!("{}", text);
            }
            Ok(())
        }
        None => repl::run_stdin(&session, cli.json).await,
    }
}
