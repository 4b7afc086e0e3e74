//! The game runner.
//!
//! A [`Game`] holds two player slots, the board history and the clocks,
//! and plays the engines against each other in a dedicated turn loop
//! task. The loop keeps each engine's internal position in sync with
//! the shared board through per-player *sync cursors*: the history
//! index the engine's internal state currently reflects, with `-1`
//! meaning "the engine must still be told a new game is starting".
//!
//! State machine:
//!
//! ```text
//!        play()                     terminal board
//! Idle ──────────► Running ────────────────────────► Finished
//!   ▲                 │ pause() / any error
//!   └─────────────────┘
//! ```
//!
//! Ordering guarantees: `NewState` for move `k` is emitted strictly
//! after board `k` is visible in the history and strictly before
//! `NewState` for move `k + 1`; `GameOver` follows the last `NewState`
//! and is emitted exactly once per game. An error aborts the loop with
//! an `Error` event and no `GameOver`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use cfp_engine::{EngineError, EnginePlayer};
use cfp_types::{Board, BoardError, EngineId, ErrorCode, Side};

use crate::event::{GameEvent, WinnerCode};

/// Default per-turn think budget.
pub const DEFAULT_TURN_TIME: Duration = Duration::from_secs(5);

/// Game runner errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// `play` was called while the game is running.
    #[error("game is already being played")]
    AlreadyRunning,

    /// `pause` was called while the game is idle.
    #[error("game is not being played")]
    NotRunning,

    /// `play` was called with an empty player slot.
    #[error("both players must be set before playing")]
    MissingPlayer,

    /// A setting was changed while the game is running.
    #[error("cannot change the game while it is being played")]
    Busy,

    /// `play` was called on a terminal position.
    #[error("game is already over")]
    Finished,

    /// The turn time must be a positive duration.
    #[error("turn time must be positive")]
    BadTurnTime,

    /// An engine chose a move the board rejects.
    #[error("engine played an illegal move: {0}")]
    IllegalMove(#[from] BoardError),

    /// An engine failed mid-turn.
    #[error("engine failed during the game: {0}")]
    Engine(#[from] EngineError),
}

impl ErrorCode for GameError {
    fn code(&self) -> &'static str {
        match self {
            Self::AlreadyRunning => "GAME_ALREADY_RUNNING",
            Self::NotRunning => "GAME_NOT_RUNNING",
            Self::MissingPlayer => "GAME_MISSING_PLAYER",
            Self::Busy => "GAME_BUSY",
            Self::Finished => "GAME_FINISHED",
            Self::BadTurnTime => "GAME_BAD_TURN_TIME",
            Self::IllegalMove(_) => "GAME_ILLEGAL_MOVE",
            Self::Engine(_) => "GAME_ENGINE_FAILURE",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Engine(inner) => inner.is_recoverable(),
            _ => false,
        }
    }
}

/// A filled player slot.
#[derive(Clone)]
struct PlayerSlot {
    id: EngineId,
    player: Arc<dyn EnginePlayer>,
}

fn slot_index(side: Side) -> usize {
    match side {
        Side::P1 => 0,
        Side::P2 => 1,
    }
}

struct GameInner {
    players: [Option<PlayerSlot>; 2],
    /// Sync cursors; `-1` means "send a new-game notice first".
    status: [i32; 2],
    turn_time: Duration,
    /// Every position reached, starting with the root.
    history: Vec<Board>,
    /// Index of the current position in `history`.
    cursor: usize,
    running: bool,
    events: Option<mpsc::Sender<GameEvent>>,
    pause_tx: Option<mpsc::Sender<()>>,
}

/// Two-engine game with history, clocks and a pause signal.
///
/// Cheap to clone handles around: all state lives behind one lock
/// shared with the turn loop task. Mutating operations are rejected
/// with [`GameError::Busy`] while the loop runs.
pub struct Game {
    inner: Arc<Mutex<GameInner>>,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    /// Creates an idle game on the starting position.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(GameInner {
                players: [None, None],
                status: [-1, -1],
                turn_time: DEFAULT_TURN_TIME,
                history: vec![Board::new()],
                cursor: 0,
                running: false,
                events: None,
                pause_tx: None,
            })),
        }
    }

    /// Registers the channel that receives [`GameEvent`]s.
    pub fn notify_events(&self, events: mpsc::Sender<GameEvent>) {
        self.inner.lock().events = Some(events);
    }

    /// Fills a player slot.
    ///
    /// When the other slot holds the same engine, the new slot inherits
    /// its sync cursor: one process has one internal position, however
    /// many seats it occupies.
    ///
    /// # Errors
    ///
    /// [`GameError::Busy`] while the game is running.
    pub fn set_player(
        &self,
        side: Side,
        id: EngineId,
        player: Arc<dyn EnginePlayer>,
    ) -> Result<(), GameError> {
        let mut inner = self.inner.lock();
        if inner.running {
            return Err(GameError::Busy);
        }
        let me = slot_index(side);
        let other = 1 - me;
        inner.status[me] = match &inner.players[other] {
            Some(slot) if slot.id == id => inner.status[other],
            _ => -1,
        };
        inner.players[me] = Some(PlayerSlot { id, player });
        Ok(())
    }

    /// Empties a player slot.
    ///
    /// # Errors
    ///
    /// [`GameError::Busy`] while the game is running.
    pub fn clear_player(&self, side: Side) -> Result<(), GameError> {
        let mut inner = self.inner.lock();
        if inner.running {
            return Err(GameError::Busy);
        }
        let me = slot_index(side);
        inner.players[me] = None;
        inner.status[me] = -1;
        Ok(())
    }

    /// Engine ids currently seated, player 1 first.
    #[must_use]
    pub fn players(&self) -> [Option<EngineId>; 2] {
        let inner = self.inner.lock();
        [
            inner.players[0].as_ref().map(|s| s.id),
            inner.players[1].as_ref().map(|s| s.id),
        ]
    }

    /// Sets the per-turn think budget.
    ///
    /// # Errors
    ///
    /// [`GameError::Busy`] while running, [`GameError::BadTurnTime`]
    /// for a zero duration.
    pub fn set_turn_time(&self, turn_time: Duration) -> Result<(), GameError> {
        let mut inner = self.inner.lock();
        if inner.running {
            return Err(GameError::Busy);
        }
        if turn_time.is_zero() {
            return Err(GameError::BadTurnTime);
        }
        inner.turn_time = turn_time;
        Ok(())
    }

    /// Current per-turn think budget.
    #[must_use]
    pub fn turn_time(&self) -> Duration {
        self.inner.lock().turn_time
    }

    /// Resets to the starting position.
    ///
    /// # Errors
    ///
    /// [`GameError::Busy`] while the game is running.
    pub fn reset(&self) -> Result<(), GameError> {
        self.set_position(Board::new())
    }

    /// Replaces the whole history with a new root position.
    ///
    /// Both sync cursors drop to `-1`: the engines have never seen
    /// this game.
    ///
    /// # Errors
    ///
    /// [`GameError::Busy`] while the game is running.
    pub fn set_position(&self, board: Board) -> Result<(), GameError> {
        let mut inner = self.inner.lock();
        if inner.running {
            return Err(GameError::Busy);
        }
        inner.history = vec![board];
        inner.cursor = 0;
        inner.status = [-1, -1];
        Ok(())
    }

    /// The current position.
    #[must_use]
    pub fn current(&self) -> Board {
        let inner = self.inner.lock();
        inner.history[inner.cursor]
    }

    /// Every position reached so far, root first.
    #[must_use]
    pub fn history(&self) -> Vec<Board> {
        self.inner.lock().history.clone()
    }

    /// Whether the turn loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    /// Starts the turn loop.
    ///
    /// # Errors
    ///
    /// [`GameError::AlreadyRunning`], [`GameError::MissingPlayer`] or
    /// [`GameError::Finished`] when the preconditions fail.
    pub fn play(&self) -> Result<(), GameError> {
        let mut inner = self.inner.lock();
        if inner.running {
            return Err(GameError::AlreadyRunning);
        }
        let (Some(p1), Some(p2)) = (inner.players[0].clone(), inner.players[1].clone()) else {
            return Err(GameError::MissingPlayer);
        };
        if inner.history[inner.cursor].outcome().is_terminal() {
            return Err(GameError::Finished);
        }
        inner.running = true;
        let (pause_tx, pause_rx) = mpsc::channel(1);
        inner.pause_tx = Some(pause_tx);
        tokio::spawn(turn_loop(Arc::clone(&self.inner), pause_rx, p1, p2));
        Ok(())
    }

    /// Signals the turn loop to stop after the current think.
    ///
    /// The in-flight search is stopped and its move discarded; the
    /// history is left exactly as it was.
    ///
    /// # Errors
    ///
    /// [`GameError::NotRunning`] when there is nothing to pause.
    pub async fn pause(&self) -> Result<(), GameError> {
        let pause_tx = {
            let inner = self.inner.lock();
            if !inner.running {
                return Err(GameError::NotRunning);
            }
            inner.pause_tx.clone().ok_or(GameError::NotRunning)?
        };
        // A closed channel means the loop exited on its own in the
        // meantime; from the caller's view the game is not running.
        pause_tx.send(()).await.map_err(|_| GameError::NotRunning)
    }
}

async fn emit(events: &Option<mpsc::Sender<GameEvent>>, event: GameEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}

/// Brings both engines' internal positions up to date with the board.
///
/// Visits the side to move first. A `-1` cursor gets the new-game
/// notice; a stale cursor gets the current position. When both slots
/// hold the same engine the second visit just mirrors the first
/// cursor.
async fn sync_players(
    inner: &Arc<Mutex<GameInner>>,
    board: &Board,
    cursor: usize,
    p1: &PlayerSlot,
    p2: &PlayerSlot,
) -> Result<(), GameError> {
    let mut status = inner.lock().status;
    let order = match board.to_move() {
        Side::P1 => [0usize, 1],
        Side::P2 => [1, 0],
    };
    let shared_engine = p1.id == p2.id;
    for (visited, index) in order.into_iter().enumerate() {
        if shared_engine && visited > 0 {
            status[index] = status[1 - index];
            continue;
        }
        let slot = if index == 0 { p1 } else { p2 };
        if status[index] == -1 {
            slot.player.new_game().await?;
        }
        if status[index] < cursor as i32 {
            slot.player.position(board).await?;
        }
        status[index] = cursor as i32;
    }
    inner.lock().status = status;
    Ok(())
}

async fn turn_loop(
    inner: Arc<Mutex<GameInner>>,
    mut pause_rx: mpsc::Receiver<()>,
    p1: PlayerSlot,
    p2: PlayerSlot,
) {
    loop {
        let (board, cursor, turn_time, events) = {
            let g = inner.lock();
            (
                g.history[g.cursor],
                g.cursor,
                g.turn_time,
                g.events.clone(),
            )
        };

        if board.outcome().is_terminal() {
            let winner = WinnerCode::from(board.outcome());
            emit(&events, GameEvent::GameOver { winner }).await;
            break;
        }

        if let Err(err) = sync_players(&inner, &board, cursor, &p1, &p2).await {
            emit(&events, GameEvent::Error(err)).await;
            break;
        }

        let mover = match board.to_move() {
            Side::P1 => &p1,
            Side::P2 => &p2,
        };
        if let Err(err) = mover.player.go(Some(turn_time)).await {
            emit(&events, GameEvent::Error(err.into())).await;
            break;
        }

        let paused = tokio::select! {
            () = tokio::time::sleep(turn_time) => false,
            _ = pause_rx.recv() => true,
        };
        if paused {
            // Forced move, discarded.
            if let Err(err) = mover.player.stop().await {
                emit(&events, GameEvent::Error(err.into())).await;
            }
            break;
        }

        let column = match mover.player.stop().await {
            Ok(column) => column,
            Err(err) => {
                emit(&events, GameEvent::Error(err.into())).await;
                break;
            }
        };

        let next = match board.apply(column) {
            Ok(next) => next,
            Err(err) => {
                emit(&events, GameEvent::Error(err.into())).await;
                break;
            }
        };

        {
            let mut g = inner.lock();
            g.history.push(next);
            g.cursor += 1;
        }
        emit(&events, GameEvent::NewState(next)).await;
    }

    let mut g = inner.lock();
    g.running = false;
    g.pause_tx = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfp_types::assert_error_codes;

    #[test]
    fn error_codes_are_well_formed() {
        assert_error_codes(
            &[
                GameError::AlreadyRunning,
                GameError::NotRunning,
                GameError::MissingPlayer,
                GameError::Busy,
                GameError::Finished,
                GameError::BadTurnTime,
                GameError::IllegalMove(BoardError::Terminal),
                GameError::Engine(EngineError::ReadyTimeout),
            ],
            "GAME_",
        );
    }

    #[test]
    fn engine_recoverability_passes_through() {
        assert!(GameError::Engine(EngineError::BestMoveTimeout).is_recoverable());
        assert!(!GameError::Engine(EngineError::Gone).is_recoverable());
        assert!(!GameError::IllegalMove(BoardError::ColumnFull(3)).is_recoverable());
    }
}
