//! Errors returned by `TriageClient`
//!
use std::path::PathBuf;

use snafu::prelude::*;

/// Errors returned by bugtriage crate
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TriageError {
    // Http connection or timeout error
    #[snafu(display("HTTP error {method} url:{url}"))]
    Http {
        method: String,
        url: String,
        source: reqwest::Error,
    },

    /// Backend responded with an error status.
    /// This error usually means the request was invalid, or there was an internal server error.
    #[snafu(display("Api Server reported error ({code}) {method} {url}: {message}"))]
    ApiError {
        code: u16,
        method: String,
        url: String,
        message: String,
    },

    /// Credentials were rejected at login.
    #[snafu(display("Authentication failed: {message}"))]
    Auth { message: String },

    /// The backend answered 401: the session is missing, expired, or revoked.
    /// Callers should send the user back through login rather than retry.
    #[snafu(display("Client is not authenticated. Log in first."))]
    Unauthorized,

    /// Client is authenticated, but the user may not access the resource
    #[snafu(display("Permission denied: User does not have permission to access the record(s)"))]
    Forbidden,

    /// Expected item was not found.
    #[snafu(display("{obj_type} {key} not found"))]
    NotFound { obj_type: String, key: String },

    /// Deserialization error. The server response did not have the expected shape.
    #[snafu(display("Deserialization: {source}"))]
    Deserialization { source: serde_json::Error },

    /// Serialization error. unlikely to occur. If you see this error, please report it as a bug.
    #[snafu(display("Serialization: {source}"))]
    Serialization { source: serde_json::Error },

    /// Validation error: a request parameter failed a local check.
    #[snafu(display("Validation error: {message}"))]
    Validation { message: String },

    /// An operation that needs a company or token was called without a session.
    #[snafu(display("No session. Log in first."))]
    NoSession,

    /// Writing an export file failed.
    #[snafu(display("export to {path:?}: {source}"))]
    Export {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Reading or writing a saved session failed.
    #[snafu(display("session file {path:?}: {message}"))]
    SessionFile { path: PathBuf, message: String },

    /// Some other error occurred
    #[snafu(display("{message}"))]
    Other { message: String },
}

impl TriageError {
    /// Returns true for errors that mean "go log in again".
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::NoSession)
    }
}
