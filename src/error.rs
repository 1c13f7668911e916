// src/error.rs

//! Unified error handling for the bot.

use std::fmt;

use thiserror::Error;

/// Result type alias for bot operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Why a platform rejected (or would reject) a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishFailure {
    /// Credentials missing, expired or refused
    Auth,
    /// Platform rate limit hit
    RateLimited,
    /// Post body or attachment rejected
    Payload,
    /// Network failure or unexpected response
    Transport,
}

impl PublishFailure {
    /// Classify an HTTP status returned by a platform API.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => Self::Auth,
            429 => Self::RateLimited,
            400 | 413 | 415 | 422 => Self::Payload,
            _ => Self::Transport,
        }
    }
}

impl fmt::Display for PublishFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auth => "auth",
            Self::RateLimited => "rate limited",
            Self::Payload => "payload",
            Self::Transport => "transport",
        };
        f.write_str(name)
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Queue times could not be fetched or parsed
    #[error("Fetch error for {source_url}: {message}")]
    Fetch { source_url: String, message: String },

    /// Time-series write rejected or store unreachable
    #[error("Store write error: {0}")]
    Write(String),

    /// Time-series query failed while building a chart
    #[error("Chart query error: {0}")]
    ChartQuery(String),

    /// Chart drawing or PNG encoding failed
    #[error("Chart render error: {0}")]
    Chart(String),

    /// A platform refused the post
    #[error("Publish error on {platform} ({kind}): {message}")]
    Publish {
        platform: String,
        kind: PublishFailure,
        message: String,
    },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error for the given source.
    pub fn fetch(source_url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            source_url: source_url.into(),
            message: message.to_string(),
        }
    }

    /// Create a store write error.
    pub fn write(message: impl fmt::Display) -> Self {
        Self::Write(message.to_string())
    }

    /// Create a chart query error.
    pub fn chart_query(message: impl fmt::Display) -> Self {
        Self::ChartQuery(message.to_string())
    }

    /// Create a chart render error.
    pub fn chart(message: impl fmt::Display) -> Self {
        Self::Chart(message.to_string())
    }

    /// Create a publish error for a platform.
    pub fn publish(
        platform: impl Into<String>,
        kind: PublishFailure,
        message: impl fmt::Display,
    ) -> Self {
        Self::Publish {
            platform: platform.into(),
            kind,
            message: message.to_string(),
        }
    }

    /// Whether this error belongs to the fetch stage.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        use reqwest::StatusCode;
        assert_eq!(
            PublishFailure::from_status(StatusCode::UNAUTHORIZED),
            PublishFailure::Auth
        );
        assert_eq!(
            PublishFailure::from_status(StatusCode::TOO_MANY_REQUESTS),
            PublishFailure::RateLimited
        );
        assert_eq!(
            PublishFailure::from_status(StatusCode::BAD_REQUEST),
            PublishFailure::Payload
        );
        assert_eq!(
            PublishFailure::from_status(StatusCode::BAD_GATEWAY),
            PublishFailure::Transport
        );
    }

    #[test]
    fn publish_error_message_names_platform() {
        let err = AppError::publish("bluesky", PublishFailure::RateLimited, "slow down");
        assert_eq!(
            err.to_string(),
            "Publish error on bluesky (rate limited): slow down"
        );
        assert!(!err.is_fetch());
    }
}
