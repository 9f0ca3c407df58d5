//! Error types for published spreadsheet fetching.

use thiserror::Error;

/// Errors that can occur while fetching a published sheet.
///
/// Every variant is fatal for the run: the catalog cannot be built from a
/// partial set of sheets.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching sheet {url}: {source}")]
    Network {
        /// The sheet URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching sheet {url}")]
    Timeout {
        /// The sheet URL that timed out.
        url: String,
    },

    /// The publishing endpoint answered with a non-success status.
    #[error("HTTP {status} fetching sheet {url}")]
    HttpStatus {
        /// The sheet URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The redirect could not be followed (missing/invalid Location or a second redirect).
    #[error("cannot follow redirect for sheet {url}: {reason}")]
    Redirect {
        /// The sheet URL that redirected.
        url: String,
        /// Why the redirect was rejected.
        reason: String,
    },

    /// The body could not be read as UTF-8 text.
    #[error("failed to read sheet body from {url}: {source}")]
    Body {
        /// The sheet URL.
        url: String,
        /// The underlying read error.
        #[source]
        source: reqwest::Error,
    },

    /// The sheet URL is malformed.
    #[error("invalid sheet URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl FetchError {
    /// Maps a reqwest send error to `Timeout` or `Network`.
    pub fn from_send(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a redirect error.
    pub fn redirect(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Redirect {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a body read error.
    pub fn body(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Body {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}
