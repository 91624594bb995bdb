//! Failure kinds of a background color query.

use thiserror::Error;

/// Why a terminal background query did not produce a theme.
///
/// Every variant is recoverable; callers typically fall back to
/// [`Theme::Unknown`](crate::Theme::Unknown).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Output is not a terminal or input cannot enter raw mode. Nothing was
    /// written.
    #[error("not a TTY environment")]
    NotATty,

    /// The terminal did not answer within the query window.
    #[error("OSC 11 query timed out after {0} ms")]
    Timeout(u128),

    /// The terminal answered, but not with a recognizable OSC 11 reply.
    #[error("no valid OSC 11 response in {0} buffered bytes")]
    NoMatch(usize),

    /// Reading from or writing to the terminal failed.
    #[error("terminal I/O failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for QueryError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
