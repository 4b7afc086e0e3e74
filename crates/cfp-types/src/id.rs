//! Identifier types.
//!
//! Both identifiers are plain monotonic counters assigned by the
//! session hub. They appear verbatim on the observer wire (`engine
//! load id 3`, ...), so they stay small integers rather than UUIDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Identifier of a loaded engine.
///
/// Assigned by the hub when an engine is loaded and never reused
/// within a session. Observers refer to engines only by this id.
///
/// # Example
///
/// ```
/// use cfp_types::EngineId;
///
/// let id = EngineId::new(3);
/// assert_eq!(id.to_string(), "3");
/// assert_eq!("3".parse::<EngineId>().unwrap(), id);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EngineId(u32);

impl EngineId {
    /// Wraps a raw id value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EngineId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Identifier of a connected observer.
///
/// Assigned by the roster when the observer's connection is accepted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Wraps a raw id value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_id_round_trips_through_text() {
        let id = EngineId::new(17);
        assert_eq!(id.to_string().parse::<EngineId>().unwrap(), id);
        assert_eq!(id.raw(), 17);
    }

    #[test]
    fn engine_id_rejects_junk() {
        assert!("seven".parse::<EngineId>().is_err());
        assert!("-1".parse::<EngineId>().is_err());
    }

    #[test]
    fn observer_ids_are_ordered() {
        assert!(ObserverId::new(1) < ObserverId::new(2));
    }
}
