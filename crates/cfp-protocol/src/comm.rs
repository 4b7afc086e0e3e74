//! Wire-trace records and observer time formatting.

use chrono::{DateTime, Local};

/// One line that crossed the engine wire, with direction and timestamp.
///
/// The driver produces one of these for every command it writes and
/// every line it reads, so observers can watch the raw conversation.
/// `message` holds the line without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comm {
    /// When the line crossed the wire.
    pub time: DateTime<Local>,
    /// `true` for supervisor-to-engine, `false` for engine-to-supervisor.
    pub to_engine: bool,
    /// The line itself, terminator stripped.
    pub message: String,
}

impl Comm {
    /// Records a line written to the engine, stamped now.
    #[must_use]
    pub fn outbound(message: impl Into<String>) -> Self {
        Self {
            time: Local::now(),
            to_engine: true,
            message: message.into(),
        }
    }

    /// Records a line read from the engine, stamped now.
    #[must_use]
    pub fn inbound(message: impl Into<String>) -> Self {
        Self {
            time: Local::now(),
            to_engine: false,
            message: message.into(),
        }
    }
}

/// Formats a timestamp the way observers expect: `HH:MM:SS DD/MM/YYYY`.
///
/// # Example
///
/// ```
/// use chrono::{Local, TimeZone};
/// use cfp_protocol::format_time;
///
/// let t = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
/// assert_eq!(format_time(&t), "14:05:07 09/03/2024");
/// ```
#[must_use]
pub fn format_time(time: &DateTime<Local>) -> String {
    time.format("%H:%M:%S %d/%m/%Y").to_string()
}
