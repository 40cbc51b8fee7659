//! Errors raised while obtaining a logged-in client

use seventeentrack::SeventeenTrackError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The token was rejected
    #[error("invalid authentication")]
    Authentication,

    /// The entry data carries no token
    #[error("missing token")]
    MissingToken,

    #[error(transparent)]
    Api(#[from] SeventeenTrackError),
}
