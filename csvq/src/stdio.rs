//! Line-delimited JSON-RPC over stdin/stdout.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::rpc::Dispatcher;

/// Serve the process's stdin/stdout until stdin closes.
pub async fn run_stdio(dispatcher: &Dispatcher) -> std::io::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve_session(dispatcher, stdin, stdout).await
}

/// Read one message per line from `reader`, writing each reply as one line to `writer`.
///
/// Messages are handled in arrival order. Blank lines are skipped.
pub async fn serve_session<R, W>(dispatcher: &Dispatcher, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(reply) = dispatcher.handle_line(line).await {
            writer.write_all(reply.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }
    tracing::info!("stdin closed, ending session");
    Ok(())
}
