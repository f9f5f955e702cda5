//! Error types for field resolution, node assembly, and inventory collection.

use std::io;
use std::path::PathBuf;

use nodemap_api::ApiError;
use thiserror::Error;

/// A field path that cannot be interpreted.
///
/// Raised for malformed expressions and for paths whose steps do not fit the
/// shape of the record. A field that is simply missing is not an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("field path '{path}' has an empty segment")]
    EmptySegment { path: String },

    #[error("field path '{path}' has an unterminated '{open}'")]
    UnterminatedBracket { path: String, open: char },

    #[error("field path '{path}' has a non-numeric index '{index}'")]
    InvalidIndex { path: String, index: String },

    #[error("field path '{path}' contains invalid character '{character}'")]
    InvalidCharacter { path: String, character: char },

    #[error("field path '{path}' cannot step into '{segment}': value is {found}")]
    NotTraversable { path: String, segment: String, found: &'static str },
}

impl ResolutionError {
    pub fn path(&self) -> &str {
        match self {
            Self::EmptySegment { path }
            | Self::UnterminatedBracket { path, .. }
            | Self::InvalidIndex { path, .. }
            | Self::InvalidCharacter { path, .. }
            | Self::NotTraversable { path, .. } => path,
        }
    }
}

/// A rule that could not be evaluated against one record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("record '{record_id}': rule '{rule}' failed: {source}")]
pub struct MappingError {
    pub record_id: String,
    /// Configuration key of the failing rule.
    pub rule: String,
    #[source]
    pub source: ResolutionError,
}

/// Inventory collection for a scope did not complete.
///
/// Never fatal to a query: the scope contributes no records.
#[derive(Debug, Error)]
pub enum CollectionWarning {
    #[error("inventory listing for scope '{scope}' failed: {source}")]
    Api {
        scope: String,
        #[source]
        source: ApiError,
    },

    #[error("inventory listing for scope '{scope}' returned page token '{token}' twice in a row")]
    RepeatedPageToken { scope: String, token: String },

    #[error("inventory listing for scope '{scope}' was cancelled")]
    Cancelled { scope: String },
}

/// Failures of the asynchronous query handle.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query was cancelled")]
    Cancelled,

    #[error("query task ended without producing a result")]
    Aborted,

    #[error("async runtime error: {0}")]
    Runtime(#[from] io::Error),
}

/// A mapping configuration file that cannot be turned into a rule set.
#[derive(Debug, Error)]
pub enum MappingConfigError {
    #[error("failed to read mapping file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse mapping file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("mapping file {} must be a mapping of keys to values", path.display())]
    NotAMapping { path: PathBuf },

    #[error("mapping key '{key}' must have a scalar value")]
    NotFlat { key: String },
}
