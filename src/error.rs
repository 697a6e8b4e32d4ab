//! Typed errors for source loading and merging.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ModuleNotFound,
    ModuleParseFailed,
    UnsupportedExtension,
    UnsupportedType,
    MissingParser,
}

/// Everything that can go wrong while loading or merging a source.
///
/// Only [`Error::MissingParser`] is fatal to a `merge` call: an unavailable
/// parser is a setup problem, not a data problem. Every other error is
/// reported through the monitor callback and the merge continues.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The target path does not exist.
    #[error("module not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// The file exists but its content failed to parse (or is not a
    /// mapping at the top level).
    #[error("failed to parse {}: {source}", .path.display())]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// No parser is registered for the file's extension.
    #[error("extension {extension:?} is not available")]
    UnsupportedExtension { extension: String },

    /// A merge source was neither a string nor a mapping.
    #[error("non-supported type: {type_name}, value: {value}")]
    UnsupportedType {
        type_name: &'static str,
        value: String,
    },

    /// A known optional format was requested but its parser is not
    /// compiled in.
    #[error("no parser available for {extension:?} files, enable the {feature:?} feature")]
    MissingParser {
        extension: String,
        feature: &'static str,
    },
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotFound { .. } => ErrorCode::ModuleNotFound,
            Error::ParseFailed { .. } => ErrorCode::ModuleParseFailed,
            Error::UnsupportedExtension { .. } => ErrorCode::UnsupportedExtension,
            Error::UnsupportedType { .. } => ErrorCode::UnsupportedType,
            Error::MissingParser { .. } => ErrorCode::MissingParser,
        }
    }

    /// Whether this error aborts the whole `merge` call instead of being
    /// reported and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::MissingParser { .. })
    }

    /// The file path involved, when there is one (used as the monitor
    /// label for load failures).
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::NotFound { path } | Error::ParseFailed { path, .. } => Some(path),
            _ => None,
        }
    }
}
