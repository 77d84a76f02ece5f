/// An error that can occur while parsing, validating or expanding a
/// recurrence rule.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// The rule failed validation.
    ///
    /// This covers an unknown or unsupported FREQ, COUNT and UNTIL both
    /// being set, non-positive INTERVAL or COUNT values, malformed BYDAY
    /// entries, out-of-range BY-part integers and illegal FREQ/BY-part
    /// combinations.
    #[error("{0}")]
    InvalidRule(String),
    /// The rule contains a part that is not in the recognized set.
    #[error("unknown recurrence rule part `{0}`")]
    UnknownPart(String),
    /// A yearly scan crossed the supported upper limit.
    ///
    /// This is only raised when the cursor was configured to fault on
    /// overrun instead of silently exhausting.
    #[error(
        "recurrence scan crossed the supported upper limit \
         (9999-12-31T23:59:59Z)"
    )]
    HorizonExceeded,
    /// An operation was used in a way that can never succeed.
    #[error("{0}")]
    Logic(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Like `assert!`, but returns an `Error::InvalidRule` with the formatted
/// message instead of panicking.
macro_rules! ensure_rule {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::error::Error::InvalidRule(format!($($arg)*)));
        }
    };
}

pub(crate) use ensure_rule;
