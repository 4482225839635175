//! Stdio transport: newline-delimited JSON-RPC on stdin/stdout.
//!
//! Stdout carries protocol frames only; logs go to stderr or a file.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::methods::handle_frame;
use crate::session::Session;
use crate::state::GatewayState;

/// How long the writer gets to flush remaining notifications after input ends.
const WRITER_DRAIN: Duration = Duration::from_secs(2);

/// Serve MCP over the process's stdin/stdout until EOF or Ctrl-C.
pub async fn serve_stdio(state: Arc<GatewayState>) -> anyhow::Result<()> {
    info!(server = %state.server_name(), "MCP server listening on stdio");
    serve_io(
        state,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        crate::server::shutdown_signal(),
    )
    .await
}

/// Serve MCP over any line-oriented reader/writer pair.
///
/// Returns when the reader hits EOF or `shutdown` resolves; background tasks
/// are then cancelled and drained.
pub async fn serve_io<R, W, S>(
    state: Arc<GatewayState>,
    reader: R,
    mut writer: W,
    shutdown: S,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    S: Future<Output = ()>,
{
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    let write_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let written = async {
                writer.write_all(frame.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await
            }
            .await;
            if let Err(e) = written {
                error!(%e, "Failed to write to stdout");
                break;
            }
        }
    });

    let session = Session::open(outbound_tx);
    state.connection_opened();
    let mut lines = reader.lines();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if let Some(reply) = handle_frame(&state, &session, line) {
                        let _ = session.outbound().send(reply);
                    }
                }
                Ok(None) => {
                    debug!("stdin closed");
                    break;
                }
                Err(e) => {
                    warn!(%e, "Failed to read from stdin");
                    break;
                }
            }
        }
    }

    state.connection_closed();
    state.launcher.shutdown().await;
    drop(session);

    // Reporters held by stragglers keep the channel open; stop waiting eventually.
    if tokio::time::timeout(WRITER_DRAIN, write_task).await.is_err() {
        debug!("Writer still busy after drain period");
    }
    info!("MCP server stopped");
    Ok(())
}
