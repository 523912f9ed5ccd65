use thiserror::Error;

#[derive(Error, Debug)]
pub enum PriceWatchError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Price API returned status {0}")]
    StatusError(reqwest::StatusCode),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Email address error: {0}")]
    AddressError(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    EmailBuildError(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    SmtpError(#[from] lettre::transport::smtp::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
