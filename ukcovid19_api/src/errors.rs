//! Error types for the API client.

/// Errors that can occur when making API requests.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An HTTP request failed (network error, timeout, or invalid URL).
    #[error("request failed")]
    RequestFailed,
    /// A page request returned a failure status, with a body snippet.
    #[error("request failed with status {status}")]
    UpstreamStatus { status: u16, body: String },
    /// A page body could not be decoded into the expected shape.
    #[error("malformed page body: {0}")]
    Decode(String),
    /// The caller cancelled the fetch before it completed.
    #[error("fetch cancelled")]
    Cancelled,
    /// The page guard tripped before the server signalled exhaustion.
    #[error("fetch exceeded the configured limit of {0} pages")]
    PageLimitExceeded(u32),
}
