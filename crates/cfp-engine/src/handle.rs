//! Lifecycle wrapper around a driver and its engine process.
//!
//! The handle is what the rest of the arena talks to. It owns the
//! child process and the driver, serializes command submission (at
//! most one in-flight command per engine), and tracks the lifecycle:
//!
//! ```text
//! Spawned ──load()──► Handshaking ──ok──► Ready ◄──stop()── Thinking
//!                          │                │                  ▲
//!                          └─err: killed    │ go()             │
//!                                           └──────────────────┘
//!                 any state ──quit()──► Quit (terminal)
//! ```
//!
//! Guards: `go` is rejected while `Thinking`, `stop` is rejected
//! unless `Thinking`, and everything is rejected after `Quit`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;

use cfp_protocol::{Comm, EngineOption};
use cfp_types::Board;

use crate::driver::{CfpDriver, Driver, DriverTimeouts};
use crate::error::EngineError;
use crate::event::EngineEvent;

/// Configuration for spawning and supervising one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Request/reply bounds passed to the driver.
    pub timeouts: DriverTimeouts,
    /// How long `quit` waits for the process to exit before killing it.
    pub quit_wait: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeouts: DriverTimeouts::default(),
            quit_wait: Duration::from_secs(5),
        }
    }
}

/// Lifecycle state of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Process started, handshake not yet attempted.
    Spawned,
    /// Handshake in progress.
    Handshaking,
    /// Idle and accepting commands.
    Ready,
    /// A search is running.
    Thinking,
    /// The engine has quit; the handle is spent.
    Quit,
}

#[derive(Default)]
struct Meta {
    name: String,
    author: String,
}

/// The moves a game runner needs from an engine.
///
/// [`EngineHandle`] implements this; game tests implement it with
/// scripted players instead of real processes.
#[async_trait]
pub trait EnginePlayer: Send + Sync {
    /// Announces a new game.
    async fn new_game(&self) -> Result<(), EngineError>;
    /// Sends the position to analyse.
    async fn position(&self, board: &Board) -> Result<(), EngineError>;
    /// Starts a search.
    async fn go(&self, move_time: Option<Duration>) -> Result<(), EngineError>;
    /// Stops the search and returns the chosen column.
    async fn stop(&self) -> Result<usize, EngineError>;
}

/// Supervisor-side handle to one engine process.
///
/// All methods take `&self`; an async mutex around the driver
/// serializes command submission, and the state machine above rejects
/// commands the current state disallows. The handle never logs the
/// errors it returns; that is the caller's decision.
pub struct EngineHandle {
    path: PathBuf,
    child: AsyncMutex<Child>,
    driver: AsyncMutex<Box<dyn Driver>>,
    state: Mutex<EngineState>,
    meta: Mutex<Meta>,
    options: Mutex<BTreeMap<String, EngineOption>>,
    quit_wait: Duration,
}

impl EngineHandle {
    /// Spawns the engine binary at `path` with a [`CfpDriver`] over its
    /// stdio pipes.
    ///
    /// Must be called within a tokio runtime. The handshake is not
    /// performed here; call [`load`](Self::load) next.
    ///
    /// # Errors
    ///
    /// [`EngineError::Spawn`] when the process cannot be started,
    /// [`EngineError::Pipe`] when a stdio pipe is missing.
    pub fn spawn(path: impl Into<PathBuf>, config: &EngineConfig) -> Result<Self, EngineError> {
        Self::spawn_with(path, config, |stdout, stdin, timeouts| {
            Box::new(CfpDriver::new(stdout, stdin, timeouts))
        })
    }

    /// Spawns the engine with a caller-supplied driver factory.
    ///
    /// The factory receives the child's stdout (engine-to-supervisor),
    /// stdin (supervisor-to-engine) and the configured timeouts.
    pub fn spawn_with<F>(
        path: impl Into<PathBuf>,
        config: &EngineConfig,
        factory: F,
    ) -> Result<Self, EngineError>
    where
        F: FnOnce(ChildStdout, ChildStdin, DriverTimeouts) -> Box<dyn Driver>,
    {
        let path = path.into();
        let mut child = Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn(e.to_string()))?;
        let stdin = child.stdin.take().ok_or(EngineError::Pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(EngineError::Pipe("stdout"))?;
        let driver = factory(stdout, stdin, config.timeouts);
        Ok(Self {
            path,
            child: AsyncMutex::new(child),
            driver: AsyncMutex::new(driver),
            state: Mutex::new(EngineState::Spawned),
            meta: Mutex::new(Meta::default()),
            options: Mutex::new(BTreeMap::new()),
            quit_wait: config.quit_wait,
        })
    }

    /// Performs the handshake, filling in name, author and the option
    /// map.
    ///
    /// On failure the child is killed and reaped; a process that never
    /// spoke the protocol has nothing left to say.
    ///
    /// # Errors
    ///
    /// Handshake errors from the driver, or [`EngineError::NotReady`] /
    /// [`EngineError::Gone`] if the handle is not freshly spawned.
    pub async fn load(&self) -> Result<(), EngineError> {
        let mut driver = self.driver.lock().await;
        {
            let mut state = self.state.lock();
            match *state {
                EngineState::Spawned => *state = EngineState::Handshaking,
                EngineState::Quit => return Err(EngineError::Gone),
                _ => return Err(EngineError::NotReady),
            }
        }
        match driver.handshake().await {
            Ok(identity) => {
                *self.meta.lock() = Meta {
                    name: identity.name,
                    author: identity.author,
                };
                *self.options.lock() = identity.options;
                *self.state.lock() = EngineState::Ready;
                Ok(())
            }
            Err(err) => {
                *self.state.lock() = EngineState::Quit;
                let mut child = self.child.lock().await;
                let _ = child.start_kill();
                let _ = child.wait().await;
                Err(err)
            }
        }
    }

    /// Path the engine was spawned from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Engine name declared during the handshake. Empty before
    /// [`load`](Self::load) completes.
    #[must_use]
    pub fn name(&self) -> String {
        self.meta.lock().name.clone()
    }

    /// Engine author declared during the handshake.
    #[must_use]
    pub fn author(&self) -> String {
        self.meta.lock().author.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// Snapshot of the option map, keyed (and therefore sorted) by
    /// option name.
    #[must_use]
    pub fn options(&self) -> BTreeMap<String, EngineOption> {
        self.options.lock().clone()
    }

    /// Looks a single option up by name.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<EngineOption> {
        self.options.lock().get(name).cloned()
    }

    fn ensure_ready(&self) -> Result<(), EngineError> {
        match *self.state.lock() {
            EngineState::Ready => Ok(()),
            EngineState::Thinking => Err(EngineError::AlreadyThinking),
            EngineState::Quit => Err(EngineError::Gone),
            EngineState::Spawned | EngineState::Handshaking => Err(EngineError::NotReady),
        }
    }

    /// Toggles engine debug output.
    pub async fn set_debug(&self, enable: bool) -> Result<(), EngineError> {
        let mut driver = self.driver.lock().await;
        self.ensure_ready()?;
        driver.debug(enable).await
    }

    /// Forwards an option update to the engine and records it in the
    /// local map on success.
    pub async fn set_option(&self, option: &EngineOption) -> Result<(), EngineError> {
        let mut driver = self.driver.lock().await;
        self.ensure_ready()?;
        driver.set_option(option).await?;
        self.options
            .lock()
            .insert(option.name().to_string(), option.clone());
        Ok(())
    }

    /// Merges the driver's info and trace sinks into one
    /// [`EngineEvent`] stream.
    ///
    /// Register the stream before [`load`](Self::load) to see the
    /// handshake traffic. Channels are bounded by `buffer`; a slow
    /// consumer backpressures the driver.
    pub async fn event_stream(&self, buffer: usize) -> mpsc::Receiver<EngineEvent> {
        let buffer = buffer.max(1);
        let (out_tx, out_rx) = mpsc::channel(buffer);
        let (info_tx, mut info_rx) = mpsc::channel::<String>(buffer);
        let (comm_tx, mut comm_rx) = mpsc::channel::<Comm>(buffer);
        {
            let mut driver = self.driver.lock().await;
            driver.notify_info(info_tx);
            driver.notify_comm(comm_tx);
        }
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    v = info_rx.recv() => v.map(EngineEvent::Info),
                    v = comm_rx.recv() => v.map(EngineEvent::Comm),
                };
                match event {
                    Some(event) => {
                        if out_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        });
        out_rx
    }

    /// Quits the engine and reaps the process.
    ///
    /// A thinking engine is stopped first (its move is discarded). The
    /// polite `quit` is given [`EngineConfig::quit_wait`] to take
    /// effect; after that the process is killed. Either way the child
    /// is reaped before this returns, so driver-level failures during
    /// the goodbye are not reported as errors.
    ///
    /// # Errors
    ///
    /// [`EngineError::Gone`] when already quit, [`EngineError::Wait`]
    /// when the OS-level wait itself fails.
    pub async fn quit(&self) -> Result<(), EngineError> {
        {
            let mut driver = self.driver.lock().await;
            let thinking = {
                let mut state = self.state.lock();
                match *state {
                    EngineState::Quit => return Err(EngineError::Gone),
                    current => {
                        *state = EngineState::Quit;
                        current == EngineState::Thinking
                    }
                }
            };
            if thinking {
                let _ = driver.stop().await;
            }
            if let Err(err) = driver.quit().await {
                // The engine is not answering; fall through to the
                // bounded wait and the kill below.
                tracing::debug!(error = %err, path = %self.path.display(), "quit handshake failed");
            }
        }
        let mut child = self.child.lock().await;
        match tokio::time::timeout(self.quit_wait, child.wait()).await {
            Ok(Ok(_status)) => Ok(()),
            Ok(Err(err)) => Err(EngineError::Wait(err.to_string())),
            Err(_elapsed) => {
                let _ = child.start_kill();
                child
                    .wait()
                    .await
                    .map(|_| ())
                    .map_err(|err| EngineError::Wait(err.to_string()))
            }
        }
    }
}

#[async_trait]
impl EnginePlayer for EngineHandle {
    async fn new_game(&self) -> Result<(), EngineError> {
        let mut driver = self.driver.lock().await;
        self.ensure_ready()?;
        driver.new_game().await
    }

    async fn position(&self, board: &Board) -> Result<(), EngineError> {
        let mut driver = self.driver.lock().await;
        self.ensure_ready()?;
        driver.position(board).await
    }

    async fn go(&self, move_time: Option<Duration>) -> Result<(), EngineError> {
        let mut driver = self.driver.lock().await;
        self.ensure_ready()?;
        *self.state.lock() = EngineState::Thinking;
        match driver.go(move_time).await {
            Ok(()) => Ok(()),
            Err(err) => {
                *self.state.lock() = EngineState::Ready;
                Err(err)
            }
        }
    }

    async fn stop(&self) -> Result<usize, EngineError> {
        let mut driver = self.driver.lock().await;
        {
            let state = self.state.lock();
            match *state {
                EngineState::Thinking => {}
                EngineState::Quit => return Err(EngineError::Gone),
                _ => return Err(EngineError::NotThinking),
            }
        }
        let result = driver.stop().await;
        // The search is over whether or not a move came back.
        *self.state.lock() = EngineState::Ready;
        result
    }
}
