use std::fmt::Display;
use std::io;

use serde::ser;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading or writing PDF object syntax.
///
/// Syntax errors carry the byte offset (relative to the start of the parsed input) at which the
/// parser gave up.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum Error {
    /// Created by data structures through `ser::Error`.
    #[error("{0}")]
    Message(String),

    #[error("IO error ({0:?})")]
    Io(io::ErrorKind),

    #[error("unexpected end of input at byte {0}")]
    Eof(usize),
    #[error("expected {expected} at byte {offset}")]
    Expected {
        expected: &'static str,
        offset: usize,
    },
    #[error("number overflow at byte {0}")]
    NumberOverflow(usize),
    #[error("invalid escape sequence at byte {0}")]
    InvalidEscapeSequence(usize),
    #[error("objects nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("raw output must be a string or bytes")]
    ExpectedRaw,
    #[error("names and dictionary keys must be strings, bytes or integers")]
    ExpectedName,
    #[error("{0} cannot be written as PDF")]
    Unsupported(&'static str),
}

impl Error {
    pub(crate) fn expected(expected: &'static str, offset: usize) -> Self {
        Error::Expected { expected, offset }
    }
}

impl ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.kind())
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Io(kind) => kind.into(),
            err => io::Error::new(io::ErrorKind::Other, err),
        }
    }
}
