//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("comms error: {0}")]
    Comms(String),

    /// Outbound call to the bot connector service failed.
    #[error("connector error: {0}")]
    Connector(String),

    /// Inbound request carried no valid bot-service credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Identity token could not be decoded.
    #[error("token error: {0}")]
    Token(String),

    #[error("state error: {0}")]
    State(String),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Connector(e.to_string())
    }
}
