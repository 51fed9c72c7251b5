use std::io;

use thiserror::Error;

/// A specialized `Result` type for WIM parsing and reading.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for WIM parsing and reading.
///
/// Parse errors are fatal for the call that produced them, but the
/// [`Wim`](crate::Wim) they came from remains usable for other images and
/// files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The file is not a WIM, or uses a feature this crate does not support.
    #[error("unsupported WIM: {0}")]
    Unsupported(String),

    /// The WIM metadata could not be decoded.
    #[error("WIM parse error at {op}: {reason}")]
    Parse {
        /// The operation that failed.
        op: &'static str,
        /// What was wrong with the data.
        reason: String,
    },

    /// The metadata for a named file or stream could not be decoded.
    #[error("WIM parse error: {op} {path}: {reason}")]
    ParseFile {
        /// The operation that failed.
        op: &'static str,
        /// The name of the file or stream the error relates to.
        path: String,
        /// What was wrong with the data.
        reason: String,
    },

    /// A chunk of a compressed resource could not be decoded.
    #[error("WIM parse error in chunk {chunk}: {reason}")]
    Chunk {
        /// Index of the offending chunk within its resource.
        chunk: usize,
        /// What was wrong with the chunk.
        reason: String,
    },

    /// An I/O error from the underlying byte source.
    #[error("I/O error at {op}")]
    Io {
        /// The operation that failed.
        op: &'static str,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn unsupported(reason: impl Into<String>) -> Error {
        Error::Unsupported(reason.into())
    }

    pub(crate) fn parse(op: &'static str, reason: impl Into<String>) -> Error {
        Error::Parse { op, reason: reason.into() }
    }

    pub(crate) fn parse_file(
        op: &'static str,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Error {
        Error::ParseFile { op, path: path.into(), reason: reason.into() }
    }

    pub(crate) fn chunk(chunk: usize, reason: impl Into<String>) -> Error {
        Error::Chunk { chunk, reason: reason.into() }
    }

    pub(crate) fn io(op: &'static str, source: io::Error) -> Error {
        Error::Io { op, source }
    }
}

impl From<Error> for io::Error {
    fn from(error: Error) -> io::Error {
        let kind = match &error {
            Error::Io { source, .. } => source.kind(),
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, error)
    }
}
