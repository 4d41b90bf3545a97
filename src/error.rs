//! Error types for OpenAPI reference resolution and payload validation.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::resolver::UnresolvedRef;

/// Errors while parsing a `#/components/...` marker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkerError {
    #[error("reference '{marker}' does not point into #/components")]
    NotLocal { marker: String },

    #[error("reference '{marker}' is malformed: expected #/components/<category>/<name>")]
    Malformed { marker: String },

    #[error("reference '{marker}' has unknown category '{category}'")]
    UnknownCategory { marker: String, category: String },
}

/// Errors while loading or resolving a document.
#[derive(Debug, Error)]
pub enum ResolveError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Decode errors (exit code 2)
    #[error("input is neither valid JSON ({json}) nor valid YAML ({yaml})")]
    Decode {
        json: serde_json::Error,
        yaml: serde_yaml::Error,
    },

    #[error("cannot serialize document: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    // Resolution errors (exit code 2)
    #[error("path '{route}' uses reference '{marker}': {reason}")]
    PathRef {
        route: String,
        marker: String,
        reason: String,
    },

    #[error("circular reference: {}", chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    #[error("{} reference(s) left unresolved", refs.len())]
    Unresolved { refs: Vec<UnresolvedRef> },

    #[error("schema component '{name}' not found")]
    ComponentNotFound { name: String },
}

impl ResolveError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ResolveError::FileNotFound { .. } | ResolveError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            ResolveError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors during validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("no schema to validate against")]
    MissingSchema,

    #[error("no value to validate")]
    MissingInstance,

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Resolve(e) => e.exit_code(),
            ValidateError::MissingSchema | ValidateError::MissingInstance => 2,
            ValidateError::Invalid { .. } => 1,
        }
    }

    /// Violations carried by an `Invalid` error, empty otherwise.
    pub fn errors(&self) -> &[SchemaError] {
        match self {
            ValidateError::Invalid { errors } => errors,
            _ => &[],
        }
    }
}

/// Nature of a single constraint violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    TypeMismatch,
    NullValue,
    BelowMinimum,
    AboveMaximum,
    NotMultipleOf,
    TooShort,
    TooLong,
    PatternMismatch,
    InvalidPattern,
    EnumMismatch,
    TooFewItems,
    TooManyItems,
    DuplicateItems,
    MissingRequired,
    DisallowedProperty,
    TooFewProperties,
    TooManyProperties,
    UnsupportedType,
    UnresolvedReference,
    InvalidConstraint,
    DepthExceeded,
}

/// Single validation error with path context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    pub kind: ViolationKind,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "/: {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}
