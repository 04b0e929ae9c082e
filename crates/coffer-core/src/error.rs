//! Error types for Coffer

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause kept for diagnostics
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification of every fault surfaced by the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection, DNS, TLS or timeout failure
    Transport,
    /// Credentials rejected or signature mismatch
    Auth,
    /// The storage service answered with an error
    Server,
    /// Malformed request or unparseable response
    Protocol,
    /// Missing or invalid configuration
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Auth => "auth",
            ErrorKind::Server => "server",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Config => "config",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Fault reported by the underlying storage client
    #[error("{kind} error: {message}")]
    Client {
        kind: ErrorKind,
        code: Option<String>,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A facade operation failed; `source` carries the original fault
    #[error("{message}")]
    Service {
        message: String,
        #[source]
        source: Box<Error>,
    },

    #[error("The specified bucket does not exist: {0}")]
    NoSuchBucketNamed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a client-level error without an underlying cause
    pub fn client(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::Client {
            kind,
            code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Build a client-level error carrying the service error code
    pub fn with_code(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Client {
            kind,
            code: Some(code.into()),
            message: message.into(),
            source: None,
        }
    }

    /// Attach the cause of a client-level error
    pub fn caused_by(self, cause: impl Into<BoxError>) -> Self {
        match self {
            Error::Client {
                kind,
                code,
                message,
                ..
            } => Error::Client {
                kind,
                code,
                message,
                source: Some(cause.into()),
            },
            other => other,
        }
    }

    /// Wrap this error with an operation-level message
    pub fn context(self, message: impl Into<String>) -> Self {
        Error::Service {
            message: message.into(),
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Client { kind, .. } => *kind,
            Error::Service { source, .. } => source.kind(),
            Error::NoSuchBucketNamed(_) => ErrorKind::Server,
            Error::Config(_) | Error::InvalidArgument(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Transport,
        }
    }

    /// S3 error code of the innermost client fault, if the service sent one
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Client { code, .. } => code.as_deref(),
            Error::Service { source, .. } => source.code(),
            Error::NoSuchBucketNamed(_) => Some("NoSuchBucket"),
            _ => None,
        }
    }
}

/// Attach operation context to fallible results.
pub trait ResultExt<T> {
    fn context_with<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context_with<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}
