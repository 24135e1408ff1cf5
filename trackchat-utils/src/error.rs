//! Error types for trackchat
//!
//! Provides a unified error type used across all trackchat crates.

use std::path::PathBuf;

/// Main error type for trackchat operations
#[derive(Debug, thiserror::Error)]
pub enum TrackchatError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Browser / WebDriver Errors ===

    #[error("WebDriver request failed: {0}")]
    WebDriver(String),

    #[error("WebDriver command {command} returned {error}: {message}")]
    WebDriverCommand {
        command: String,
        error: String,
        message: String,
    },

    #[error("Timed out after {seconds}s waiting for {what}")]
    WaitTimeout { what: String, seconds: u64 },

    #[error("No browser session is open")]
    NoSession,

    // === Tracker Errors ===

    #[error("Login failed: {0}")]
    Login(String),

    #[error("Chat session lost: {0}")]
    SessionLost(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TrackchatError {
    /// Create a WebDriver transport error
    pub fn webdriver(msg: impl Into<String>) -> Self {
        Self::WebDriver(msg.into())
    }

    /// Create a login error
    pub fn login(msg: impl Into<String>) -> Self {
        Self::Login(msg.into())
    }

    /// Create a session-lost error
    pub fn session_lost(msg: impl Into<String>) -> Self {
        Self::SessionLost(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is worth another connection attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::WebDriver(_)
                | Self::WaitTimeout { .. }
                | Self::NoSession
                | Self::SessionLost(_)
                | Self::Io(_)
        )
    }
}

/// Result type alias using TrackchatError
pub type Result<T> = std::result::Result<T, TrackchatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackchatError::WaitTimeout {
            what: "#username".into(),
            seconds: 20,
        };
        assert_eq!(err.to_string(), "Timed out after 20s waiting for #username");
    }

    #[test]
    fn test_webdriver_command_display() {
        let err = TrackchatError::WebDriverCommand {
            command: "find element".into(),
            error: "no such element".into(),
            message: "Unable to locate element".into(),
        };
        assert!(err.to_string().contains("no such element"));
    }

    #[test]
    fn test_retryable() {
        assert!(TrackchatError::webdriver("connection refused").is_retryable());
        assert!(TrackchatError::session_lost("redirected to login").is_retryable());
        assert!(!TrackchatError::login("bad password").is_retryable());
        assert!(!TrackchatError::MissingSetting("tracker.url").is_retryable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: TrackchatError = io_err.into();
        assert!(matches!(err, TrackchatError::Io(_)));
    }
}
