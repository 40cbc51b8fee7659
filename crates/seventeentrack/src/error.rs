use thiserror::Error;

pub type Result<T> = std::result::Result<T, SeventeenTrackError>;

/// Errors returned by the 17track client
#[derive(Debug, Error)]
pub enum SeventeenTrackError {
    /// The API answered with a non-zero result code
    #[error("request failed: {0}")]
    Request(String),

    /// A tracking number the account does not know
    #[error("invalid tracking number: {0}")]
    InvalidTrackingNumber(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// An account call was made before a successful login
    #[error("not logged in")]
    NotLoggedIn,
}
