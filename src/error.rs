use std::time::Duration;
use thiserror::Error;

/// Errors raised while walking listings and inspecting articles
#[derive(Debug, Error)]
pub enum CheckError {
    /// A bounded wait expired before its condition held
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    /// The element handle no longer belongs to the current document
    #[error("stale element reference")]
    StaleElement,

    /// Expected site markup is absent
    #[error("page structure missing: {0}")]
    PageStructure(String),

    /// A driver command failed but the driver is still usable
    #[error("automation command failed: {0}")]
    Automation(String),

    /// The driver itself is unusable (crashed, disconnected, session lost)
    #[error("automation unusable: {0}")]
    Fatal(String),

    #[error("cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("report error: {0}")]
    Report(#[from] ReportError),
}

impl CheckError {
    /// Whether the error must abort the whole seed pass
    pub fn is_fatal(&self) -> bool {
        matches!(self, CheckError::Fatal(_) | CheckError::Cancelled)
    }

    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        CheckError::Timeout {
            what: what.into(),
            after,
        }
    }

    pub fn not_found(selector: impl Into<String>) -> Self {
        CheckError::ElementNotFound {
            selector: selector.into(),
        }
    }
}

/// Configuration and seed validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pattern {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("invalid seed URL: {0}")]
    InvalidSeed(String),

    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Errors raised while persisting a record batch
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for crawl operations
pub type Result<T> = std::result::Result<T, CheckError>;
