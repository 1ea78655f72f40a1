//! Unified error type.

use std::io;

/// The error type returned by switchyard's fallible operations.
///
/// Application-level failures (404, 429, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: a malformed route table, an unreadable config
/// file, binding to a port or accepting a connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid path template `{template}`: {reason}")]
    InvalidPath { template: String, reason: &'static str },

    #[error("invalid method token `{0}`")]
    InvalidMethod(String),

    #[error("route `{method} {template}` is registered twice")]
    DuplicateRoute { method: String, template: String },

    #[error("route `{template}` conflicts with an existing route: {source}")]
    RouteConflict {
        template: String,
        #[source]
        source: matchit::InsertError,
    },
}

/// `Result` alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
