//! Error types for the QRZ Logbook client.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
/// Error type for all QRZ Logbook client operations.
pub enum Error {
    /// Underlying HTTP client error (connect, timeout, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// HTTP response returned a non-success status with body.
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    /// `RESULT=AUTH` on a status request: the key has no logbook data subscription.
    #[error("QRZ XML Logbook Data subscription required")]
    SubscriptionRequired,
    /// `RESULT=AUTH` in the middle of a fetch.
    #[error("session expired")]
    SessionExpired,
    /// The service answered with a result other than `OK`.
    #[error("service error: {reason}")]
    Service { reason: String },
    /// Status answered `OK` without a callsign.
    #[error("no callsign in status response")]
    MissingCallsign,
    /// The operation was cancelled between requests.
    #[error("operation cancelled")]
    Cancelled,
    /// IO error when reading configuration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration file could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// True for the errors the user fixes on the QRZ side (subscription, session).
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::SubscriptionRequired | Error::SessionExpired)
    }
}

/// Result type for QRZ Logbook client operations.
pub type Result<T> = std::result::Result<T, Error>;
