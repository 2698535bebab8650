//! Error types for session and authentication operations

use bluelink_core::ConfigError;
use thiserror::Error;

use crate::scrape::ScrapeError;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, BluelinkError>;

/// Errors that can occur while authenticating or talking to a vehicle
#[derive(Error, Debug)]
pub enum BluelinkError {
    /// Invalid brand, region or language at construction
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// One authentication strategy could not produce a code
    #[error("Auth strategy {strategy} failed: {reason}")]
    AuthStrategy {
        strategy: &'static str,
        reason: String,
    },

    /// Every authentication strategy failed
    #[error("Login failed: {}", attempts.join("; "))]
    Login { attempts: Vec<String> },

    /// Backend did not return an access token
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// Control token could not be obtained
    #[error("PIN error: {0}")]
    Pin(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Backend answered with an unexpected status
    #[error("Server error {status} from {url}: {body}")]
    ServerError {
        status: u16,
        url: String,
        body: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Login page or redirect did not carry the expected artifact
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    /// Stamp header could not be computed
    #[error("Stamp generation failed: {0}")]
    Stamp(String),
}

impl BluelinkError {
    /// Failure of a single authentication strategy
    pub fn strategy(strategy: &'static str, reason: impl Into<String>) -> Self {
        Self::AuthStrategy {
            strategy,
            reason: reason.into(),
        }
    }

    /// Create a server error from status code, URL and body
    pub fn server_error(status: u16, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            url: url.into(),
            body: body.into(),
        }
    }
}
