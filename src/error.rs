//! Template Guard error types.
//!
//! # Error Classification
//!
//! Errors fall into three classes:
//!
//! - **Fast reject**: [`GuardError::PayloadTooLarge`] is returned before any
//!   scanning happens. Callers must not sanitize or store the input.
//! - **Startup failures**: catalog construction errors (invalid pattern,
//!   duplicate rule, empty rule) and configuration errors. These never occur
//!   at request time once a catalog has been built.
//! - **Monitor lookups**: acknowledging an unknown or already-closed alert.
//!
//! Security *findings* are not errors. They are reported as
//! [`Violation`](crate::validator::Violation) and
//! [`Warning`](crate::validator::Warning) values inside a successful
//! [`ValidationResult`](crate::validator::ValidationResult).

use thiserror::Error;

use crate::catalog::ThreatCategory;

/// Template Guard errors.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Input exceeds the hard scan cap and was rejected without scanning.
    #[error("Payload too large: {size} bytes exceeds scan limit of {limit} bytes")]
    PayloadTooLarge {
        /// Size of the rejected input in bytes.
        size: usize,
        /// Configured scan limit in bytes.
        limit: usize,
    },

    /// A catalog rule pattern failed to compile.
    ///
    /// The full regex error is kept via `#[source]` so tooling can show the
    /// position of the syntax error.
    #[error("Invalid pattern for {category} rule `{pattern}`: {source}")]
    InvalidPattern {
        /// Category of the offending rule.
        category: ThreatCategory,
        /// Pattern source text.
        pattern: String,
        /// Underlying compile error.
        #[source]
        source: regex::Error,
    },

    /// Two rules share the same (category, pattern source) identity.
    #[error("Duplicate rule: {category} `{pattern}`")]
    DuplicateRule {
        /// Category of the duplicated rule.
        category: ThreatCategory,
        /// Pattern source text.
        pattern: String,
    },

    /// A rule was declared without anything to match.
    #[error("Empty rule: {0}")]
    EmptyRule(String),

    /// No alert with this id is tracked by the monitor.
    #[error("Alert not found: {0}")]
    AlertNotFound(String),

    /// The alert exists but is no longer open.
    #[error("Alert {id} is not open (status: {status})")]
    AlertNotOpen {
        /// Alert id.
        id: String,
        /// Current terminal status.
        status: String,
    },

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GuardError {
    /// True for errors raised while building a [`RuleCatalog`](crate::catalog::RuleCatalog).
    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            GuardError::InvalidPattern { .. }
                | GuardError::DuplicateRule { .. }
                | GuardError::EmptyRule(_)
        )
    }

    /// True for the pre-scan size rejection.
    pub fn is_payload_too_large(&self) -> bool {
        matches!(self, GuardError::PayloadTooLarge { .. })
    }
}

/// Result type alias for Template Guard operations
pub type Result<T> = std::result::Result<T, GuardError>;

impl From<toml::de::Error> for GuardError {
    fn from(err: toml::de::Error) -> Self {
        GuardError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for GuardError {
    fn from(err: toml::ser::Error) -> Self {
        GuardError::Config(err.to_string())
    }
}
