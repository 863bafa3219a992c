//! Unified error type for subkeeper.
//!
//! Library code funnels its failures into [`Error`]. The variants separate
//! the taxonomy the pipeline cares about: bad input (skip the item), tool
//! failures (log captured output, mark the item failed) and I/O.

use std::fmt;

/// Unified error type covering the local failure modes of subkeeper.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested file or entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "file", "tool").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input or configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Structured data (tool JSON, file names) could not be parsed.
    #[error("Parse error [{what}]: {message}")]
    Parse {
        /// What was being parsed (e.g. "mkvmerge identification").
        what: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (mkvmerge, mkvextract) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description, usually the captured stderr.
        message: String,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Parse`].
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Whether this error means "skip the item and carry on" rather than
    /// a broken environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::Validation(_) | Error::Parse { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::parse("json", err.to_string())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("file", "/media/missing.mkv");
        assert_eq!(err.to_string(), "file not found: /media/missing.mkv");
        assert!(err.is_input_error());
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("mkvextract", "exit code 2");
        assert_eq!(err.to_string(), "Tool error [mkvextract]: exit code 2");
        assert!(!err.is_input_error());
    }

    #[test]
    fn parse_display() {
        let err = Error::parse("mkvmerge identification", "missing field `id`");
        assert_eq!(
            err.to_string(),
            "Parse error [mkvmerge identification]: missing field `id`"
        );
        assert!(err.is_input_error());
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn json_error_becomes_parse_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = Error::from(json_err);
        assert!(matches!(err, Error::Parse { .. }));
    }
}
