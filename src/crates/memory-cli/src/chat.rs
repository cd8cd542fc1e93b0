//! Line-oriented chat loop

use anyhow::{Context, Result};
use memory_core::{get_buffer_string, HistoryPipeline, Message};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

/// One line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Send text to the model
    Say(String),
    /// Print the untrimmed history of the current session
    History,
    /// List known sessions
    Sessions,
    /// Continue in another session
    Switch(String),
    /// Leave the loop
    Quit,
    /// Blank line
    Empty,
}

impl ReplCommand {
    /// Parse one input line
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "" => ReplCommand::Empty,
            "/quit" | "/exit" => ReplCommand::Quit,
            "/history" => ReplCommand::History,
            "/sessions" => ReplCommand::Sessions,
            _ => match line.strip_prefix("/session ") {
                Some(id) if !id.trim().is_empty() => ReplCommand::Switch(id.trim().to_string()),
                _ => ReplCommand::Say(line.to_string()),
            },
        }
    }
}

/// Read lines from `input` until EOF or `/quit`, answering on `output`
///
/// Model failures are printed and the loop continues; the failed input stays
/// in the session history.
pub async fn run_chat<R, W>(
    pipeline: &HistoryPipeline,
    session: &str,
    input: R,
    mut output: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = session.to_string();
    let mut lines = input.lines();

    loop {
        output.write_all(format!("[{}] > ", session).as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };

        let text = match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => break,
            ReplCommand::History => {
                let history = pipeline.history(&session).await;
                format!("{}\n", get_buffer_string(&history))
            }
            ReplCommand::Sessions => {
                let ids = pipeline.store().session_ids();
                format!("{}\n", ids.join("\n"))
            }
            ReplCommand::Switch(id) => {
                session = id;
                format!("Switched to session {}\n", session)
            }
            ReplCommand::Say(text) => match pipeline.invoke(&session, Message::human(text)).await {
                Ok(reply) => format!("{}\n", reply.content()),
                Err(e) => {
                    warn!(session_id = %session, error = %e, "Chat turn failed");
                    format!("error: {}\n", e)
                }
            },
        };

        output.write_all(text.as_bytes()).await?;
    }

    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
