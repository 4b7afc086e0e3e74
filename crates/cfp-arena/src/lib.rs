//! The arena runtime: game runner and session hub.
//!
//! This crate orchestrates what the leaf crates provide. The [`Hub`]
//! owns everything; observers and engines only ever talk to it through
//! channels:
//!
//! ```text
//!  observers ──lines──► ClientEvent channel ─┐
//!                                            ▼
//!                            ┌────────────────────────────┐
//!                            │        Hub event loop      │
//!                            │  registry · game · roster  │
//!                            └────────────────────────────┘
//!                               │                  ▲
//!                        play / pause        GameEvent channel
//!                               ▼                  │
//!                            ┌────────────────────────────┐
//!                            │        Game turn loop      │
//!                            │  clocks · history · sync   │
//!                            └────────────────────────────┘
//!                               │ go/stop/position
//!                               ▼
//!                          engine handles
//! ```
//!
//! All mutation happens on the hub's event loop or the game's turn
//! loop; the observer roster is the one shared structure, guarded by a
//! reader/writer lock so broadcasts only contend with connection
//! churn.

mod command;
mod config;
mod event;
mod game;
mod hub;
mod paths;
mod roster;

pub use command::{CommandParser, HubCommand, Parsed};
pub use config::{ArenaConfig, ConfigError, TimeoutConfig};
pub use event::{ClientEvent, GameEvent, ServerEvent, WinnerCode};
pub use game::{Game, GameError, DEFAULT_TURN_TIME};
pub use hub::{Hub, HubError};
pub use paths::discover_engines;
pub use roster::Roster;
