//! Error types for quakewatch.
//!
//! Uses `thiserror` for library-style error definitions.

use thiserror::Error;

/// Errors that can occur in quakewatch operations.
#[derive(Error, Debug)]
pub enum QuakeError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Remote endpoint returned an error status
    #[error("HTTP error! Status: {status}")]
    Api { status: u16, message: String },

    /// Local store read or write failed
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Location could not be determined
    #[error("{0}")]
    Geolocation(String),

    /// The dashboard loop has stopped
    #[error("dashboard is not running")]
    DashboardClosed,
}
