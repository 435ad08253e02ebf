use thiserror::Error;

use crate::step::Role;

/// Application-wide error types for gazette.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a page, feed or sitemap).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error (refused, reset, DNS).
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The URL is disallowed by the site's robots.txt.
    #[error("Blocked by robots.txt: {0}")]
    RobotsDisallowed(String),

    /// A feed or sitemap could not be decoded.
    #[error("Feed error: {0}")]
    FeedError(String),

    /// A filter or control step failed, so the whole document is unusable.
    #[error("{role} step '{step}' failed: {message}")]
    StepFailed {
        step: String,
        role: Role,
        message: String,
    },

    /// Context keys depend on each other in a loop.
    #[error("Cyclic dependency on context key '{0}'")]
    CyclicDependency(String),

    /// Invalid rule set, registry or crawl configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A document-level error annotated with the URL being processed.
    #[error("Failed to process {url}: {source}")]
    Document {
        url: String,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Wraps the error with the URL that was being processed.
    ///
    /// Already-annotated errors are returned unchanged.
    pub fn for_url(self, url: impl Into<String>) -> Self {
        match self {
            AppError::Document { .. } => self,
            other => AppError::Document {
                url: url.into(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, skipping URL annotations.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::Document { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self.root() {
            AppError::NetworkError(_) | AppError::Timeout(_) => true,
            AppError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }

    /// Returns true if this error is a configuration problem that must stop
    /// a crawl whatever the error handling mode is.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.root(),
            AppError::CyclicDependency(_) | AppError::ConfigError(_)
        )
    }
}

/// Error raised by a single computation step or context provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// The page lacks something the step needs.
    #[error("missing {0}")]
    Missing(String),

    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("cyclic dependency on context key '{0}'")]
    CyclicDependency(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("{0}")]
    Message(String),
}

impl StepError {
    pub fn missing(what: impl Into<String>) -> Self {
        StepError::Missing(what.into())
    }

    pub fn message(msg: impl Into<String>) -> Self {
        StepError::Message(msg.into())
    }
}

impl From<serde_json::Error> for StepError {
    fn from(e: serde_json::Error) -> Self {
        StepError::Serialization(e.to_string())
    }
}
