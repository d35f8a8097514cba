use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolapiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("message rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("invalid API secret")]
    InvalidKey,

    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, SolapiError>;
