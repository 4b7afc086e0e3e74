//! Events crossing the arena's channels.

use cfp_types::{Board, ObserverId, Outcome, Side};
use std::fmt;

use crate::game::GameError;

/// Winner code as it appears on the observer wire.
///
/// `0` for player 1, `1` for player 2, `2` for neither (a draw, or a
/// game that is not over).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinnerCode {
    /// Player 1 won.
    PlayerOne,
    /// Player 2 won.
    PlayerTwo,
    /// Nobody won.
    Neither,
}

impl WinnerCode {
    /// The numeric wire code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::PlayerOne => 0,
            Self::PlayerTwo => 1,
            Self::Neither => 2,
        }
    }
}

impl From<Outcome> for WinnerCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Won(Side::P1) => Self::PlayerOne,
            Outcome::Won(Side::P2) => Self::PlayerTwo,
            Outcome::Draw | Outcome::Undecided => Self::Neither,
        }
    }
}

impl fmt::Display for WinnerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.code().fmt(f)
    }
}

/// What the running game reports to the hub.
#[derive(Debug, Clone)]
pub enum GameEvent {
    /// A move was applied; the board is already in the history.
    NewState(Board),
    /// The game reached a terminal position. Emitted exactly once per
    /// game, after the last [`NewState`](Self::NewState).
    GameOver {
        /// Who won.
        winner: WinnerCode,
    },
    /// The turn loop aborted. No [`GameOver`](Self::GameOver) follows.
    Error(GameError),
}

/// One line an observer sent to the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEvent {
    /// Which observer sent it.
    pub observer: ObserverId,
    /// The raw line, terminator stripped.
    pub line: String,
}

/// One line the hub broadcasts to every observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent(pub String);

impl ServerEvent {
    /// Wraps a broadcast line.
    #[must_use]
    pub fn new(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    /// The line text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
