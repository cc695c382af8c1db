//! Error types for catalog E2E runs

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Element not found: {reference} (tried: {tried})")]
    ElementNotFound { reference: String, tried: String },

    #[error("Ambiguous match: {reference} resolved to {count} elements, expected exactly one")]
    AmbiguousMatch { reference: String, count: usize },

    #[error("Timeout after {elapsed:?} waiting for: {condition}")]
    WaitTimeout { condition: String, elapsed: Duration },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Unexpected {kind} dialog: {message}")]
    UnexpectedDialog { kind: String, message: String },

    #[error("Read-only violation on {field}: {detail}")]
    ReadOnlyViolation { field: String, detail: String },

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Browser failed to launch: {0}")]
    BrowserLaunch(String),

    #[error("Application unreachable at {url} after {attempts} attempts")]
    AppUnreachable { url: String, attempts: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Stable identifier used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            E2eError::ElementNotFound { .. } => "element_not_found",
            E2eError::AmbiguousMatch { .. } => "ambiguous_match",
            E2eError::WaitTimeout { .. } => "wait_timeout",
            E2eError::AuthenticationFailed { .. } => "authentication_failed",
            E2eError::UnexpectedDialog { .. } => "unexpected_dialog",
            E2eError::ReadOnlyViolation { .. } => "read_only_violation",
            E2eError::Driver(_) => "driver",
            E2eError::BrowserLaunch(_) => "browser_launch",
            E2eError::AppUnreachable { .. } => "app_unreachable",
            E2eError::InvalidConfig(_) => "invalid_config",
            E2eError::Io(_) => "io",
            E2eError::Json(_) => "json",
            E2eError::Yaml(_) => "yaml",
            E2eError::Http(_) => "http",
        }
    }

    /// Whether the error happened before the scenario itself could start
    /// (configuration, reachability, browser launch).
    pub fn is_harness_error(&self) -> bool {
        matches!(
            self,
            E2eError::BrowserLaunch(_)
                | E2eError::AppUnreachable { .. }
                | E2eError::InvalidConfig(_)
                | E2eError::Yaml(_)
        )
    }

    pub(crate) fn driver(err: impl std::fmt::Display) -> Self {
        E2eError::Driver(err.to_string())
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
