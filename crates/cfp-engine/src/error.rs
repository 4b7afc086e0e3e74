//! Engine layer errors.

use thiserror::Error;

use cfp_types::ErrorCode;

/// Errors from driving or supervising an engine.
///
/// Timeouts are recoverable (the engine may answer a retry); everything
/// else reflects a dead process, a broken pipe or a lifecycle
/// violation that a retry cannot fix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine process could not be started.
    #[error("couldn't start engine process: {0}")]
    Spawn(String),

    /// A stdio pipe of the child could not be acquired.
    #[error("couldn't acquire engine {0} pipe")]
    Pipe(&'static str),

    /// A write to the engine's stdin failed.
    #[error("couldn't write to engine: {0}")]
    Write(String),

    /// The engine closed its side of the connection.
    #[error("engine connection closed")]
    Closed,

    /// The engine did not finish the handshake in time.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// The handshake completed without both a name and an author.
    #[error("engine did not provide a name and author")]
    MissingIdentity,

    /// The engine did not acknowledge a readiness probe in time.
    #[error("readyok timed out")]
    ReadyTimeout,

    /// The engine did not answer a stop with a best move in time.
    #[error("bestmove timed out")]
    BestMoveTimeout,

    /// The engine is not in a state that accepts this command.
    #[error("engine is not ready")]
    NotReady,

    /// A search was requested while one is already running.
    #[error("engine is already thinking")]
    AlreadyThinking,

    /// A stop was requested with no search running.
    #[error("engine is not thinking")]
    NotThinking,

    /// The engine has quit; no further commands are accepted.
    #[error("engine has quit")]
    Gone,

    /// Waiting on the engine process failed at the OS level.
    #[error("couldn't wait on engine process: {0}")]
    Wait(String),
}

impl ErrorCode for EngineError {
    fn code(&self) -> &'static str {
        match self {
            Self::Spawn(_) => "ENGINE_SPAWN_FAILED",
            Self::Pipe(_) => "ENGINE_PIPE_FAILED",
            Self::Write(_) => "ENGINE_WRITE_FAILED",
            Self::Closed => "ENGINE_CLOSED",
            Self::HandshakeTimeout => "ENGINE_HANDSHAKE_TIMEOUT",
            Self::MissingIdentity => "ENGINE_MISSING_IDENTITY",
            Self::ReadyTimeout => "ENGINE_READY_TIMEOUT",
            Self::BestMoveTimeout => "ENGINE_BEST_MOVE_TIMEOUT",
            Self::NotReady => "ENGINE_NOT_READY",
            Self::AlreadyThinking => "ENGINE_ALREADY_THINKING",
            Self::NotThinking => "ENGINE_NOT_THINKING",
            Self::Gone => "ENGINE_QUIT",
            Self::Wait(_) => "ENGINE_WAIT_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::HandshakeTimeout | Self::ReadyTimeout | Self::BestMoveTimeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfp_types::assert_error_codes;

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(
            &[
                EngineError::Spawn("x".into()),
                EngineError::Pipe("stdin"),
                EngineError::Write("x".into()),
                EngineError::Closed,
                EngineError::HandshakeTimeout,
                EngineError::MissingIdentity,
                EngineError::ReadyTimeout,
                EngineError::BestMoveTimeout,
                EngineError::NotReady,
                EngineError::AlreadyThinking,
                EngineError::NotThinking,
                EngineError::Gone,
                EngineError::Wait("x".into()),
            ],
            "ENGINE_",
        );
    }

    #[test]
    fn only_timeouts_are_recoverable() {
        assert!(EngineError::ReadyTimeout.is_recoverable());
        assert!(EngineError::BestMoveTimeout.is_recoverable());
        assert!(!EngineError::Gone.is_recoverable());
        assert!(!EngineError::MissingIdentity.is_recoverable());
    }
}
