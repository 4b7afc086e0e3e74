//! Engine supervision: the CFP protocol driver and the process handle.
//!
//! An *engine* is an external Connect-Four analysis program spoken to
//! over line-delimited stdio. This crate supervises one engine at a
//! time, in two layers:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       EngineHandle                           │
//! │  lifecycle state machine · one-in-flight serialization ·     │
//! │  option map · child reaping on quit                          │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                     CfpDriver                          │  │
//! │  │  handshake · ready round-trips · go/stop · quit ·      │  │
//! │  │  one reader task · rendezvous channels · trace sinks   │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │        │ stdin                          stdout │             │
//! └────────┼──────────────────────────────────────┼─────────────┘
//!          ▼                                      │
//!    engine process  ──────────────────────────────┘
//! ```
//!
//! The driver is generic over its byte streams, so tests drive it with
//! an in-memory duplex instead of a real process. The handle owns the
//! process and is the only place that waits on it.
//!
//! Event flow is strictly upward: the driver pushes [`EngineEvent`]s
//! into sinks its owner registered, and borrows nothing from above.

mod driver;
mod error;
mod event;
mod handle;
pub mod testing;

pub use driver::{CfpDriver, Driver, DriverTimeouts, Identity};
pub use error::EngineError;
pub use event::EngineEvent;
pub use handle::{EngineConfig, EngineHandle, EnginePlayer, EngineState};
