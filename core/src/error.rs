//! Error types for the courier client adapter.
//!
//! # Design
//! Configuration problems are detected once, when an endpoint is compiled,
//! and carry the endpoint name plus the offending parameter position so the
//! declaration can be fixed. Everything that happens per call (bad argument,
//! network failure, undecodable payload, cancellation) lands in [`Error`].
//!
//! `Error` is `Clone` because a call that failed to build its request replays
//! the very same failure on every later attempt instead of re-deriving it.

use std::fmt;
use std::io;
use std::sync::Arc;

/// A malformed endpoint declaration.
///
/// Rendered as `"<message> (parameter #N)\n    for method <endpoint>"`, with
/// the parameter part omitted for method-level problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub endpoint: String,
    /// Zero-based parameter index, if the problem is tied to one parameter.
    pub parameter: Option<usize>,
    pub message: String,
}

impl ConfigError {
    pub fn method(endpoint: &str, message: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            parameter: None,
            message: message.into(),
        }
    }

    pub fn parameter(endpoint: &str, index: usize, message: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            parameter: Some(index),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(p) = self.parameter {
            write!(f, " (parameter #{})", p + 1)?;
        }
        write!(f, "\n    for method {}", self.endpoint)
    }
}

impl std::error::Error for ConfigError {}

/// Errors surfaced by calls and by the client.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The endpoint declaration is inconsistent. Never retried.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A runtime argument could not be bound into the request.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The transport failed (connect, send, receive, timeout) or the body
    /// could not be read.
    #[error("I/O failure: {0}")]
    Io(#[source] Arc<io::Error>),

    /// The body was read but could not be decoded into the declared type.
    #[error("conversion to {type_name} failed: {source}")]
    Conversion {
        type_name: &'static str,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// The call was canceled before a result could be delivered.
    #[error("Canceled")]
    Canceled,

    /// `execute` or `enqueue` was invoked on a call that already ran.
    #[error("Already executed.")]
    AlreadyExecuted,

    /// The base URL and relative URL did not resolve to a valid URL.
    #[error("malformed URL: {0}")]
    Url(#[from] url::ParseError),

    /// A header name or value was not valid on the wire.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

impl Error {
    pub fn conversion<E>(type_name: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Conversion {
            type_name,
            source: Arc::new(source),
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled)
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    pub fn is_conversion(&self) -> bool {
        matches!(self, Error::Conversion { .. })
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}
