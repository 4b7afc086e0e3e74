//! Wire vocabulary shared by the driver and the session hub.
//!
//! The CFP wire is line-delimited text on both legs: supervisor to
//! engine over stdio, and supervisor to observers over the session
//! transport. This crate holds the pieces both legs share:
//!
//! - [`EngineOption`] - the tagged variant of tunable engine
//!   parameters, with lenient wire parsing and strict validation
//! - [`Comm`] - a timestamped trace record of one wire line
//! - [`format_time`] - the `HH:MM:SS DD/MM/YYYY` stamp observers see
//! - [`split_tokens`] / [`keyword_index`] - tokenizing helpers for the
//!   keyword-scan grammar both command surfaces use
//!
//! Parsing here is deliberately lenient where the transport demands it
//! (unparseable option descriptions are reported as errors for the
//! caller to drop) and strict where state would otherwise corrupt
//! (spin bounds, combo variant sets).

mod comm;
mod option;
mod tokens;

pub use comm::{format_time, Comm};
pub use option::{EngineOption, OptionError};
pub use tokens::{join_tokens, keyword_index, split_tokens};
