use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::{dispatch, Command, Flow};
use crate::engine::RecipeEngine;
use crate::error::AppError;

const PROMPT: &str = "> ";

/// Read commands line by line until `quit` or end of input. A failing command
/// prints its error and the loop continues.
pub async fn run_shell<R, W>(engine: &RecipeEngine, reader: R, mut writer: W) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    loop {
        writer.write_all(PROMPT.as_bytes()).await?;
        writer.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(command = line, "shell input");

        let outcome = match Command::parse(line) {
            Ok(command) => dispatch(engine, command).await,
            Err(e) => Err(e),
        };
        let text = match outcome {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue(text)) => text,
            Err(e) => {
                if e.is_retryable() {
                    warn!(error = %e, "command failed, retry is possible");
                }
                format!("error: {}", e)
            }
        };
        writer.write_all(text.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    Ok(())
}
