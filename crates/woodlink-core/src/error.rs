use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum WoodlinkError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("기존의 고객 전화번호와 이름이 일치하지 않습니다. 고객센터에 문의해주세요.")]
    IdentityMismatch { phone: String },

    #[error("claim not found: {0}")]
    ClaimNotFound(Uuid),

    #[error("item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("workshop not found: {0}")]
    WorkshopNotFound(Uuid),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("review not found: {0}")]
    ReviewNotFound(Uuid),

    #[error("item already claimed: {0}")]
    ItemUnavailable(Uuid),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WoodlinkError>;
