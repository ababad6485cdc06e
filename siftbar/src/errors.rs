use std::borrow::Cow;

use thiserror::Error;

/// Top-level error type returned by filter-bar operations.
#[derive(Debug, Error)]
pub enum BarError {
    /// Validation failed for one or more fields; nothing was submitted.
    #[error("validation failed")]
    Validation(#[from] ValidationError),

    /// A cross-entity sub-lookup failed while compiling the expression.
    /// The whole apply is aborted; no partial filter is submitted.
    #[error("lookup against '{entity}' failed: {source}")]
    Lookup {
        entity: String,
        #[source]
        source: QueryError,
    },

    /// A field name was registered twice on the same bar.
    #[error("duplicate field '{name}'")]
    DuplicateField { name: String },

    /// The named field does not exist on this bar.
    #[error("unknown field '{name}'")]
    UnknownField { name: String },

    /// A resolution was written to a field that is not a reference field.
    #[error("field '{name}' is not a reference field")]
    NotReference { name: String },

    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

/// Error type for the remote query seam.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The service has no binding for the requested entity kind.
    #[error("no index bound for entity '{entity}'")]
    UnknownEntity { entity: String },

    /// A response could not be decoded into rows.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// The remote side is unreachable or rejected the request.
    #[error("service unavailable: {message}")]
    Unavailable { message: String },
}

/// Collection of validation issues found while preparing a submission.
#[derive(Debug, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Human-readable summary used for the blocking notification body.
    pub fn summary(&self) -> String {
        let parts: Vec<&str> = self.issues.iter().map(|issue| issue.message.as_str()).collect();
        parts.join("; ")
    }
}

/// Detailed validation failure for a single field or logical path.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}
