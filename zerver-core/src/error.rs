//! Error taxonomy for the request engine (§7 of the runtime contract).
//!
//! `ErrorKind` mirrors the HTTP-aligned codes a [`crate::types::Decision::Fail`]
//! can carry; [`Error`] pairs a kind with a `{what, key}` context used both
//! for structured logs and for the default `on_error` JSON body.

use std::fmt;

/// HTTP-aligned error kind. The numeric value is used directly as the
/// response status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    InvalidInput,
    Unauthorized,
    Forbidden,
    NotFound,
    InternalError,
    UpstreamUnavailable,
    GatewayTimeout,
    Shutdown,
}

impl ErrorKind {
    /// The HTTP status code this kind renders as.
    pub const fn status(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::InvalidInput => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::InternalError => 500,
            ErrorKind::UpstreamUnavailable => 502,
            ErrorKind::GatewayTimeout => 504,
            ErrorKind::Shutdown => 503,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::InternalError => "InternalError",
            ErrorKind::UpstreamUnavailable => "UpstreamUnavailable",
            ErrorKind::GatewayTimeout => "GatewayTimeout",
            ErrorKind::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Contextual detail attached to an [`Error`] — what operation failed and
/// under what key (step name, effect variant tag, slot name, ...).
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub what: String,
    pub key: String,
}

impl ErrorContext {
    pub fn new(what: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            key: key.into(),
        }
    }
}

/// A terminal pipeline error: a kind plus the context that produced it.
#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub ctx: ErrorContext,
}

impl Error {
    pub fn new(kind: ErrorKind, what: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind,
            ctx: ErrorContext::new(what, key),
        }
    }

    pub fn not_found(what: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, what, key)
    }

    pub fn bad_request(what: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, what, key)
    }

    pub fn invalid_input(what: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, what, key)
    }

    pub fn internal(what: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, what, key)
    }

    pub fn upstream_unavailable(what: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamUnavailable, what, key)
    }

    pub fn shutdown(what: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(ErrorKind::Shutdown, what, key)
    }

    /// Serialize to the default `{"error":{"code","what","key"}}` body shape
    /// documented in §7.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.kind.status(),
                "what": self.ctx.what,
                "key": self.ctx.key,
            }
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.kind, self.ctx.what, self.ctx.key)
    }
}

impl std::error::Error for Error {}
