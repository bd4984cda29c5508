use thiserror::Error;

#[derive(Error, Debug)]
pub enum TwitchError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Access token is invalid or expired")]
    InvalidToken,

    #[error("User \"{0}\" not found")]
    UserNotFound(String),

    #[error("Current user not found")]
    CurrentUserNotFound,

    #[error("Subscription already exists")]
    SubscriptionConflict,

    #[error("Twitch API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl From<TwitchError> for String {
    fn from(err: TwitchError) -> String {
        err.to_string()
    }
}
