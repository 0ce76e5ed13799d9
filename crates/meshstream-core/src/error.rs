//! Unified error handling for meshstream
//!
//! This module provides a single error type shared by the loader and
//! export crates, covering I/O failures, malformed input, and the
//! loader lifecycle errors (locked/not-ready/not-available).

use thiserror::Error;

/// Unified error type for all meshstream operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying I/O failure (short read, invalid seek, closed reader).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input: bad header, truncated data, unknown required
    /// token, list-length overflow, degenerate face, inconsistent 3DS
    /// chunk length, and similar. Corresponds to the spec's
    /// "LoaderException".
    #[error("parse error{}: {message}", offset.map(|o| format!(" at offset {o}")).unwrap_or_default())]
    Parse {
        message: String,
        offset: Option<u64>,
    },

    /// A texture-validation callback rejected a texture.
    #[error("invalid texture: {path}")]
    InvalidTexture { path: String },

    /// A setter was called on a loader while it is locked (mid-parse).
    #[error("loader is locked")]
    Locked,

    /// `load`/`write` was called before a file/stream/loader was set.
    #[error("not ready: {reason}")]
    NotReady { reason: String },

    /// An accessor was called on an optional field that is unset.
    #[error("not available: {what}")]
    NotAvailable { what: String },

    /// Text expected to be UTF-8 was not.
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// No recognised format sniffer matched the input.
    #[error("unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Error with additional context attached while propagating.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the unified [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Construct a parse error with no known offset.
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
            offset: None,
        }
    }

    /// Construct a parse error at a known byte offset.
    pub fn parse_at(message: impl Into<String>, offset: u64) -> Self {
        Error::Parse {
            message: message.into(),
            offset: Some(offset),
        }
    }

    /// Construct a not-ready error.
    pub fn not_ready(reason: impl Into<String>) -> Self {
        Error::NotReady {
            reason: reason.into(),
        }
    }

    /// Construct a not-available error.
    pub fn not_available(what: impl Into<String>) -> Self {
        Error::NotAvailable { what: what.into() }
    }

    /// Attach context, wrapping `self` as the source.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True if this is a malformed-input error (the spec's "LoaderException").
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Error::Parse { .. } | Error::UnsupportedFormat { .. })
    }
}

/// Extension trait for adding context to `Result<T, Error>`.
pub trait ResultExt<T> {
    /// Add context to an error, preserving it as the source.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context computed lazily, only on the error path.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_includes_offset() {
        let err = Error::parse_at("bad token", 42);
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn parse_error_without_offset_omits_at() {
        let err = Error::parse("bad token");
        assert!(!err.to_string().contains("at offset"));
    }

    #[test]
    fn with_context_preserves_source() {
        let err = Error::NotReady {
            reason: "no file set".into(),
        }
        .with_context("while opening mesh");
        assert!(err.to_string().contains("while opening mesh"));
        assert!(err.to_string().contains("no file set"));
    }

    #[test]
    fn result_ext_context() {
        let result: Result<()> = Err(Error::Locked);
        let with_ctx = result.context("loading PLY");
        assert!(with_ctx.unwrap_err().to_string().contains("loading PLY"));
    }

    #[test]
    fn is_parse_error_classification() {
        assert!(Error::parse("x").is_parse_error());
        assert!(!Error::Locked.is_parse_error());
    }
}
