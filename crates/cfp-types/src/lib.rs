//! Core types for the CFP arena.
//!
//! This crate is the leaf of the workspace: it carries the board model,
//! the identifier newtypes and the unified error-code interface that the
//! rest of the arena builds on.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  cfp-cli       : binary, observer transport                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cfp-arena     : game runner, session hub, config            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cfp-engine    : protocol driver, engine handle              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cfp-protocol  : option model, wire helpers                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cfp-types     : Board, ids, ErrorCode  ◄── HERE             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Contents
//!
//! - [`Board`] - an immutable 7×6 Connect-Four position with side to
//!   move and terminal marker, plus the `position` wire encoding
//! - [`EngineId`], [`ObserverId`] - monotonic identifiers assigned by
//!   the session hub
//! - [`ErrorCode`] - machine-readable error codes with recoverability
//!   info, implemented by every error enum in the workspace
//!
//! # Example
//!
//! ```
//! use cfp_types::{Board, Side};
//!
//! let board = Board::new();
//! assert_eq!(board.to_move(), Side::P1);
//!
//! // The token drops to the bottom row of column 3 (index 38).
//! let board = board.apply(3).unwrap();
//! assert_eq!(board.to_move(), Side::P2);
//! assert_eq!(board.encode(), format!("{}1{}2", "0".repeat(38), "0".repeat(3)));
//! ```

mod board;
mod error;
mod id;

pub use board::{Board, BoardError, Cell, Outcome, Side, COLS, ROWS, SQUARES};
pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{EngineId, ObserverId};
