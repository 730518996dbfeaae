//! # Errors

use std::fmt::{self, Display, Formatter};

/// Error type.
#[derive(Debug)]
pub enum Error {
    /// Wrapper around `std::io::Error`, tagged with the name of the operation that failed.
    Io(&'static str, std::io::Error),
    /// Error returned when the window size obtained through a system call is invalid.
    InvalidWindowSize,
    /// Too many arguments given to warm. The attribute corresponds to the total number of command
    /// line arguments.
    TooManyArguments(usize),
}

impl From<std::io::Error> for Error {
    /// Convert an IO Error into a warm Error.
    fn from(err: std::io::Error) -> Self { Self::Io("I/O error", err) }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(context, err) => write!(f, "{}: {}", context, err),
            Self::InvalidWindowSize => write!(f, "Invalid window size"),
            Self::TooManyArguments(n) =>
                write!(f, "Expected at most 1 argument, got {}", n.saturating_sub(1)),
        }
    }
}
