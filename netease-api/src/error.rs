//! Error types for the Netease Cloud Music protocol client.

use thiserror::Error;

/// Errors that can occur when talking to the Netease API.
#[derive(Debug, Error)]
pub enum NeteaseError {
    /// HTTP transport error (connection refused, timeout, DNS or TLS failure).
    ///
    /// Never retried by the client; retry policy belongs to the caller.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server refused the request at the HTTP level (4xx/5xx) and the
    /// body carried no decodable API envelope.
    #[error("server refused request: HTTP {status}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
    },

    /// The response body could not be decrypted or parsed for the variant
    /// it was requested with.
    #[error("cannot decode response: {0}")]
    Decode(String),

    /// The API answered with a non-200 `code` in its JSON body.
    ///
    /// Common codes:
    /// - `301`: not logged in / cookie expired
    /// - `403`: access denied (VIP required or region-locked)
    /// - `-460`: cheating detected (request too frequent)
    #[error("API denied request (code {code}): {message}")]
    Denied {
        /// Netease API status code (not HTTP status).
        code: i64,
        /// Human-readable error message from the API.
        message: String,
    },

    /// The request succeeded but the resource is not obtainable
    /// (e.g. `url: null` for a track without copyright).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// File I/O error (session read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to (de)serialize a local JSON document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors (e.g. missing config directory).
    #[error("{0}")]
    Other(String),
}

/// Convenience alias for `Result<T, NeteaseError>`.
pub type Result<T> = std::result::Result<T, NeteaseError>;
