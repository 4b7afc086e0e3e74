//! The CFP protocol driver.
//!
//! A driver mediates a single engine over a pair of byte streams. It
//! writes line commands, and a single background reader task parses
//! everything the engine says:
//!
//! ```text
//!             write                       read (one task)
//!   driver ──────────► engine stdin   engine stdout ─────► reader
//!     ▲                                                      │
//!     │   name / author / option / cfpok / readyok /         │
//!     └────────────── bestmove rendezvous channels ◄─────────┘
//! ```
//!
//! All inbound events travel on single-slot rendezvous channels, so
//! the reader naturally blocks until the request that expects the
//! event is waiting for it. Unknown first tokens and malformed
//! payloads are dropped; the protocol mandates lenient parsing.
//!
//! Every request/reply wait is bounded by a [`DriverTimeouts`] entry.
//! The driver never retries: timeouts and write failures are reported
//! to the caller as-is.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::timeout;

use cfp_protocol::{join_tokens, split_tokens, Comm, EngineOption};
use cfp_types::Board;

use crate::error::EngineError;

/// Upper bounds on the driver's request/reply waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverTimeouts {
    /// Time the engine gets to complete the handshake after `cfp`.
    pub handshake: Duration,
    /// Time the engine gets to answer `isready` with `readyok`.
    pub ready: Duration,
    /// Time the engine gets to answer `stop` with `bestmove`.
    pub best_move: Duration,
}

impl Default for DriverTimeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(5),
            ready: Duration::from_secs(5),
            best_move: Duration::from_secs(5),
        }
    }
}

/// What an engine declares about itself during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Engine name from `id name ...`.
    pub name: String,
    /// Engine author from `id author ...`.
    pub author: String,
    /// Declared options, keyed by option name. When an engine declares
    /// the same name twice the first declaration wins.
    pub options: BTreeMap<String, EngineOption>,
}

/// Protocol driver for one engine.
///
/// Implementations speak one wire protocol; [`CfpDriver`] speaks CFP.
/// Callers own the ordering: a driver expects at most one in-flight
/// request at a time (the [`EngineHandle`](crate::EngineHandle)
/// enforces this).
#[async_trait]
pub trait Driver: Send {
    /// Performs the handshake and collects the engine's identity.
    ///
    /// # Errors
    ///
    /// [`EngineError::HandshakeTimeout`] when the engine does not
    /// finish in time, [`EngineError::MissingIdentity`] when it
    /// finishes without declaring both a name and an author.
    async fn handshake(&mut self) -> Result<Identity, EngineError>;

    /// Toggles engine debug output. Fire-and-forget.
    async fn debug(&mut self, enable: bool) -> Result<(), EngineError>;

    /// Sends a `setoption` for the given option's current value.
    async fn set_option(&mut self, option: &EngineOption) -> Result<(), EngineError>;

    /// Announces that the next position belongs to a new game.
    async fn new_game(&mut self) -> Result<(), EngineError>;

    /// Sends a position for the engine to analyse.
    async fn position(&mut self, board: &Board) -> Result<(), EngineError>;

    /// Starts a search, optionally bounded by a move time.
    async fn go(&mut self, move_time: Option<Duration>) -> Result<(), EngineError>;

    /// Stops the search and returns the engine's best-move column.
    ///
    /// # Errors
    ///
    /// [`EngineError::BestMoveTimeout`] when no `bestmove` arrives in
    /// time.
    async fn stop(&mut self) -> Result<usize, EngineError>;

    /// Tells the engine to quit and closes the write stream.
    ///
    /// The driver does not wait on process exit; that is the handle's
    /// job.
    async fn quit(&mut self) -> Result<(), EngineError>;

    /// Registers the sink that receives engine `info` lines.
    fn notify_info(&mut self, sink: mpsc::Sender<String>);

    /// Registers the sink that receives the raw wire trace.
    fn notify_comm(&mut self, sink: mpsc::Sender<Comm>);
}

/// Sinks shared between the driver and its reader task.
///
/// Registration happens after construction, so the reader looks the
/// current sink up on every line.
#[derive(Default)]
struct Sinks {
    info: Mutex<Option<mpsc::Sender<String>>>,
    comm: Mutex<Option<mpsc::Sender<Comm>>>,
}

impl Sinks {
    async fn send_info(&self, line: String) {
        let sink = self.info.lock().clone();
        if let Some(sink) = sink {
            let _ = sink.send(line).await;
        }
    }

    async fn send_comm(&self, comm: Comm) {
        let sink = self.comm.lock().clone();
        if let Some(sink) = sink {
            let _ = sink.send(comm).await;
        }
    }
}

/// Receiver ends of the rendezvous channels, owned by the driver.
struct Inbound {
    name: mpsc::Receiver<String>,
    author: mpsc::Receiver<String>,
    option: mpsc::Receiver<EngineOption>,
    handshake_ok: mpsc::Receiver<()>,
    ready_ok: mpsc::Receiver<()>,
    best_move: mpsc::Receiver<usize>,
}

/// Sender ends, owned by the reader task.
struct InboundTx {
    name: mpsc::Sender<String>,
    author: mpsc::Sender<String>,
    option: mpsc::Sender<EngineOption>,
    handshake_ok: mpsc::Sender<()>,
    ready_ok: mpsc::Sender<()>,
    best_move: mpsc::Sender<usize>,
}

fn inbound_channels() -> (InboundTx, Inbound) {
    let (name_tx, name) = mpsc::channel(1);
    let (author_tx, author) = mpsc::channel(1);
    let (option_tx, option) = mpsc::channel(1);
    let (handshake_tx, handshake_ok) = mpsc::channel(1);
    let (ready_tx, ready_ok) = mpsc::channel(1);
    let (best_tx, best_move) = mpsc::channel(1);
    (
        InboundTx {
            name: name_tx,
            author: author_tx,
            option: option_tx,
            handshake_ok: handshake_tx,
            ready_ok: ready_tx,
            best_move: best_tx,
        },
        Inbound {
            name,
            author,
            option,
            handshake_ok,
            ready_ok,
            best_move,
        },
    )
}

/// CFP implementation of [`Driver`].
///
/// Generic over its streams: production wires the child's stdio pipes,
/// tests wire an in-memory duplex double.
pub struct CfpDriver {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    rx: Inbound,
    sinks: Arc<Sinks>,
    timeouts: DriverTimeouts,
}

impl CfpDriver {
    /// Builds a driver over the given streams and starts its reader
    /// task.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn new<R, W>(reader: R, writer: W, timeouts: DriverTimeouts) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = inbound_channels();
        let sinks = Arc::new(Sinks::default());
        tokio::spawn(read_engine(reader, tx, Arc::clone(&sinks)));
        Self {
            writer: Box::new(writer),
            rx,
            sinks,
            timeouts,
        }
    }

    /// Writes one command line and records it on the trace sink.
    async fn send_line(&mut self, line: &str) -> Result<(), EngineError> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| EngineError::Write(e.to_string()))?;
        self.writer
            .write_all(b"\n")
            .await
            .map_err(|e| EngineError::Write(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| EngineError::Write(e.to_string()))?;
        self.sinks.send_comm(Comm::outbound(line)).await;
        Ok(())
    }

    /// The ready round-trip: probe with `isready`, block until
    /// `readyok` or the ready timeout.
    async fn wait_ready(&mut self) -> Result<(), EngineError> {
        self.send_line("isready").await?;
        match timeout(self.timeouts.ready, self.rx.ready_ok.recv()).await {
            Ok(Some(())) => Ok(()),
            Ok(None) => Err(EngineError::Closed),
            Err(_) => Err(EngineError::ReadyTimeout),
        }
    }
}

#[async_trait]
impl Driver for CfpDriver {
    async fn handshake(&mut self) -> Result<Identity, EngineError> {
        self.send_line("cfp").await?;

        let mut name = None;
        let mut author = None;
        let mut options = BTreeMap::new();

        let deadline = tokio::time::sleep(self.timeouts.handshake);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                () = &mut deadline => return Err(EngineError::HandshakeTimeout),
                v = self.rx.name.recv() => {
                    name = Some(v.ok_or(EngineError::Closed)?);
                }
                v = self.rx.author.recv() => {
                    author = Some(v.ok_or(EngineError::Closed)?);
                }
                v = self.rx.option.recv() => {
                    let option = v.ok_or(EngineError::Closed)?;
                    // First declaration of a name wins.
                    options
                        .entry(option.name().to_string())
                        .or_insert(option);
                }
                v = self.rx.handshake_ok.recv() => {
                    v.ok_or(EngineError::Closed)?;
                    break;
                }
            }
        }

        match (name, author) {
            (Some(name), Some(author)) => Ok(Identity {
                name,
                author,
                options,
            }),
            _ => Err(EngineError::MissingIdentity),
        }
    }

    async fn debug(&mut self, enable: bool) -> Result<(), EngineError> {
        self.send_line(if enable { "debug on" } else { "debug off" })
            .await
    }

    async fn set_option(&mut self, option: &EngineOption) -> Result<(), EngineError> {
        let line = format!("setoption name {}{}", option.name(), option.set_clause());
        self.send_line(&line).await
    }

    async fn new_game(&mut self) -> Result<(), EngineError> {
        self.wait_ready().await?;
        self.send_line("cfpnewgame").await
    }

    async fn position(&mut self, board: &Board) -> Result<(), EngineError> {
        self.wait_ready().await?;
        let line = format!("position {}", board.encode());
        self.send_line(&line).await
    }

    async fn go(&mut self, move_time: Option<Duration>) -> Result<(), EngineError> {
        self.wait_ready().await?;
        match move_time {
            Some(t) => {
                let line = format!("go movetime {}", t.as_secs_f64());
                self.send_line(&line).await
            }
            None => self.send_line("go").await,
        }
    }

    async fn stop(&mut self) -> Result<usize, EngineError> {
        self.send_line("stop").await?;
        match timeout(self.timeouts.best_move, self.rx.best_move.recv()).await {
            Ok(Some(column)) => Ok(column),
            Ok(None) => Err(EngineError::Closed),
            Err(_) => Err(EngineError::BestMoveTimeout),
        }
    }

    async fn quit(&mut self) -> Result<(), EngineError> {
        self.wait_ready().await?;
        self.send_line("quit").await?;
        // Closing stdin is the engine's EOF; the reader task ends when
        // the engine closes stdout in response.
        self.writer
            .shutdown()
            .await
            .map_err(|e| EngineError::Write(e.to_string()))
    }

    fn notify_info(&mut self, sink: mpsc::Sender<String>) {
        *self.sinks.info.lock() = Some(sink);
    }

    fn notify_comm(&mut self, sink: mpsc::Sender<Comm>) {
        *self.sinks.comm.lock() = Some(sink);
    }
}

/// The driver's single reader task.
///
/// Reads lines until EOF or a read error, traces each one, then
/// dispatches on the first token. Stops early if the driver side of a
/// rendezvous channel is gone.
async fn read_engine<R>(reader: R, tx: InboundTx, sinks: Arc<Sinks>)
where
    R: AsyncRead + Send + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::debug!(error = %err, "engine read failed");
                break;
            }
        };
        sinks.send_comm(Comm::inbound(line.as_str())).await;
        if !dispatch(&line, &tx, &sinks).await {
            break;
        }
    }
    tracing::debug!("engine reader finished");
}

/// Routes one inbound line. Returns `false` when the driver is gone
/// and the reader should stop.
async fn dispatch(line: &str, tx: &InboundTx, sinks: &Sinks) -> bool {
    let tokens = split_tokens(line);
    let Some(first) = tokens.first() else {
        return true;
    };
    match first.to_ascii_lowercase().as_str() {
        "id" => {
            let Some(kind) = tokens.get(1) else {
                return true;
            };
            let value = join_tokens(&tokens, 2, tokens.len());
            if value.is_empty() {
                return true;
            }
            if kind.eq_ignore_ascii_case("name") {
                tx.name.send(value).await.is_ok()
            } else if kind.eq_ignore_ascii_case("author") {
                tx.author.send(value).await.is_ok()
            } else {
                true
            }
        }
        "cfpok" => tx.handshake_ok.send(()).await.is_ok(),
        "readyok" => tx.ready_ok.send(()).await.is_ok(),
        "bestmove" => match tokens.get(1).and_then(|t| t.parse::<usize>().ok()) {
            Some(column) => tx.best_move.send(column).await.is_ok(),
            None => true,
        },
        "info" => {
            if tokens.len() > 1 {
                sinks.send_info(join_tokens(&tokens, 1, tokens.len())).await;
            }
            true
        }
        "option" => match EngineOption::parse(&tokens[1..]) {
            Ok(option) => tx.option.send(option).await.is_ok(),
            Err(err) => {
                tracing::debug!(error = %err, line, "dropping unparseable option");
                true
            }
        },
        _ => true,
    }
}
