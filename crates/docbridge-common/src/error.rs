//! Error types for docbridge

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for docbridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// The failing stage of an operation. Each kind carries a static, human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Cursor,
    Find,
    Unmarshal,
    Insert,
    Update,
    Fetch,
    Delete,
    Count,
    Command,
    Index,
    Configuration,
    InvalidArgument,
    Worker,
    Runtime,
}

impl ErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "failed to connect to database",
            ErrorKind::Cursor => "failed to open cursor to query result",
            ErrorKind::Find => "failed to query database",
            ErrorKind::Unmarshal => "failed to unmarshal document",
            ErrorKind::Insert => "failed to insert documents",
            ErrorKind::Update => "failed to update documents",
            ErrorKind::Fetch => "failed to fetch documents from database",
            ErrorKind::Delete => "failed to delete documents",
            ErrorKind::Count => "failed to count documents",
            ErrorKind::Command => "failed to run command",
            ErrorKind::Index => "index command failed",
            ErrorKind::Configuration => "invalid client configuration",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Worker => "worker exited before delivering a result",
            ErrorKind::Runtime => "failed to start blocking runtime",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// What went wrong underneath an [`Error`]
#[derive(Error, Debug, Clone)]
pub enum Cause {
    /// Error reported by the MongoDB driver
    #[cfg(feature = "mongodb-errors")]
    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),

    /// The per-operation deadline expired
    #[error("deadline of {0:?} exceeded")]
    Timeout(Duration),

    /// Plain description of a failure with no underlying error
    #[error("{0}")]
    Message(String),
}

/// Error returned by every docbridge operation.
///
/// Pairs a static message (the [`ErrorKind`]) with the optional underlying
/// [`Cause`]. The cause is exposed through [`std::error::Error::source`], and
/// [`Error::driver_error`] unwraps straight to the driver error when there is one.
#[derive(Error, Debug, Clone)]
#[error("{kind}{}", cause_suffix(.source))]
pub struct Error {
    kind: ErrorKind,
    source: Option<Cause>,
}

fn cause_suffix(source: &Option<Cause>) -> String {
    match source {
        Some(cause) => format!(": {}", cause),
        None => String::new(),
    }
}

impl Error {
    pub fn new(kind: ErrorKind, cause: impl Into<Option<Cause>>) -> Self {
        Self {
            kind,
            source: cause.into(),
        }
    }

    /// Error whose cause is a free-form message
    pub fn message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, Cause::Message(message.into()))
    }

    /// Error raised when the operation did not finish within `after`
    pub fn timeout(kind: ErrorKind, after: Duration) -> Self {
        Self::new(kind, Cause::Timeout(after))
    }

    /// Wrap a driver error.
    ///
    /// Decode failures are reported as [`ErrorKind::Unmarshal`] whatever
    /// operation hit them.
    #[cfg(feature = "mongodb-errors")]
    pub fn driver(kind: ErrorKind, err: mongodb::error::Error) -> Self {
        let kind = match *err.kind {
            mongodb::error::ErrorKind::BsonDeserialization(_) => ErrorKind::Unmarshal,
            _ => kind,
        };
        Self::new(kind, Cause::Driver(err))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.source.as_ref()
    }

    pub fn into_cause(self) -> Option<Cause> {
        self.source
    }

    /// The wrapped driver error, if this error came from the driver
    #[cfg(feature = "mongodb-errors")]
    pub fn driver_error(&self) -> Option<&mongodb::error::Error> {
        match &self.source {
            Some(Cause::Driver(err)) => Some(err),
            _ => None,
        }
    }

    /// Returns true if the operation ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self.source, Some(Cause::Timeout(_)))
    }

    /// Returns true if this error is potentially retryable
    pub fn is_retryable(&self) -> bool {
        match &self.source {
            Some(Cause::Timeout(_)) => true,
            #[cfg(feature = "mongodb-errors")]
            Some(Cause::Driver(err)) => {
                use mongodb::error::{ErrorKind as DriverKind, RETRYABLE_WRITE_ERROR};
                matches!(
                    *err.kind,
                    DriverKind::Io(_)
                        | DriverKind::ServerSelection { .. }
                        | DriverKind::ConnectionPoolCleared { .. }
                ) || err.contains_label(RETRYABLE_WRITE_ERROR)
            }
            _ => false,
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind, None)
    }
}
