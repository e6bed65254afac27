// src/cli/repl.rs

use crate::{
    cli::{
        render::{render_error, render_value},
        session::Session,
    },
    core::dispatcher::{DispatchError, Shell},
};
use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Outcome of one REPL line.
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome {
    /// Nothing to do (blank line or a result of `null`).
    Silent,
    Printed(String),
    Failed(String),
}

/// Dispatches one line and renders whatever came back.
pub async fn eval_line(shell: &Shell, line: &str, json: bool) -> LineOutcome {
    match shell.exec(line).await {
        Ok(value) => render_value(&value, json)
            .map(LineOutcome::Printed)
            .unwrap_or(LineOutcome::Silent),
        Err(DispatchError::EmptyInput) => LineOutcome::Silent,
        Err(err) => {
            log::debug!("'{}' failed: {:?}", line.trim(), err);
            LineOutcome::Failed(render_error(&err))
        }
    }
}

/// Reads lines from `input` until it ends, dispatching each one.
pub async fn run<R>(session: &Session, input: R, json: bool) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        print!("{}", session.prompt);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            return Ok(());
        };

        match eval_line(&session.shell, &line, json).await {
            LineOutcome::Silent => {}
            LineOutcome::Printed(text) => println!("{}", text),
            LineOutcome::Failed(text) => eprintln!("{}", text),
        }
    }
}

/// Runs the REPL over standard input.
pub async fn run_stdin(session: &Session, json: bool) -> Result<()> {
    run(session, BufReader::new(tokio::io::stdin()), json).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::ShellConfig;

    #[tokio::test]
    async fn test_eval_line_outcomes() {
        colored::control::set_override(false);
        let session = Session::start(&ShellConfig::default(), &[]).unwrap();

        assert_eq!(eval_line(&session.shell, "   ", false).await, LineOutcome::Silent);

        match eval_line(&session.shell, "wsk action ls", true).await {
            LineOutcome::Printed(text) => assert!(text.contains("\"verb\": \"list\"")),
            other => panic!("expected output, got {:?}", other),
        }

        match eval_line(&session.shell, "wsk actoins ls", false).await {
            LineOutcome::Failed(text) => assert!(text.contains("Did you mean 'wsk actions'?")),
            other => panic!("expected a failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_consumes_input_until_eof() {
        let session = Session::start(&ShellConfig::default(), &[]).unwrap();
        let input: &[u8] = b"select action hello\n\nwsk action get\n";
        run(&session, input, false).await.unwrap();
        assert_eq!(
            crate::core::selection::SelectionProvider::current_selection(&session.selection)
                .map(|s| s.name),
            Some("hello".to_string())
        );
    }
}
