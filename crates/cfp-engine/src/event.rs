//! Events an engine produces while running.

use cfp_protocol::Comm;

/// Something observable an engine did, pushed into sinks registered by
/// the owner of the handle.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A free-text `info` line from the engine.
    Info(String),
    /// A raw wire line with direction and timestamp.
    Comm(Comm),
}
