// src/error/mod.rs

use thiserror::Error;

/// Error taxonomy for the correction pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed tabular input: bad delimiter geometry, ragged rows,
    /// or a missing header.
    #[error("parse error: {0}")]
    Parse(String),

    /// Destination path resolves outside the data root.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Underlying read/write failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or empty required request field.
    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        // csv wraps io errors from the underlying reader; unwrap those so
        // they land in the right bucket.
        if err.is_io_error() {
            match err.into_kind() {
                csv::ErrorKind::Io(io) => Error::Io(io),
                other => Error::Parse(format!("{:?}", other)),
            }
        } else {
            Error::Parse(err.to_string())
        }
    }
}
