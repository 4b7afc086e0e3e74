//! Line-based TCP transport for observers.
//!
//! Each connection becomes one observer: a reader task forwards its
//! lines into the hub's client-event channel, a writer task drains the
//! observer's sink back onto the socket. The roster enforces the
//! connection cap; refused connections are simply closed.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use cfp_arena::{ClientEvent, Roster};
use cfp_types::ObserverId;

/// Binds the listener and accepts observers forever.
///
/// # Errors
///
/// Returns an error only for the initial bind; per-connection failures
/// are logged and survived.
pub async fn serve(
    bind: &str,
    roster: Arc<Roster>,
    client_tx: mpsc::Sender<ClientEvent>,
    buffer: usize,
) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding observer transport to {bind}"))?;
    info!(%bind, "observer transport listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = %err, "accept failed");
                continue;
            }
        };
        let (sink_tx, sink_rx) = mpsc::channel(buffer);
        let observer = match roster.add(sink_tx) {
            Ok(observer) => observer,
            Err(err) => {
                debug!(%peer, error = %err, "refusing observer");
                continue;
            }
        };
        info!(%peer, %observer, "observer connected");
        tokio::spawn(connection(
            stream,
            observer,
            sink_rx,
            Arc::clone(&roster),
            client_tx.clone(),
        ));
    }
}

/// Runs one observer connection to completion.
async fn connection(
    stream: TcpStream,
    observer: ObserverId,
    mut sink_rx: mpsc::Receiver<String>,
    roster: Arc<Roster>,
    client_tx: mpsc::Sender<ClientEvent>,
) {
    let (read_half, mut write_half) = stream.into_split();

    let writer = tokio::spawn(async move {
        while let Some(line) = sink_rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
            if write_half.flush().await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if client_tx
                    .send(ClientEvent { observer, line })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!(%observer, error = %err, "observer read failed");
                break;
            }
        }
    }

    // Removing the observer drops its sink; the writer drains what is
    // left and ends.
    roster.remove(observer);
    writer.abort();
    info!(%observer, "observer disconnected");
}
