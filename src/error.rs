#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unexpected option code: expected client identifier (61), got {0}")]
    UnexpectedOptionCode(u8),

    #[error("The given token was invalid for this store")]
    TokenAlreadyInvalid,

    #[error("The token was issued by a different store")]
    TokenForeign,

    #[error("The token was issued for a different client")]
    TokenClientMismatch,

    #[error("The token payload is not one this store issues")]
    TokenCorrupt,

    #[error("The underlying leases have changed")]
    ConcurrentUpdate,

    #[error("Token invalidated: {0}")]
    TokenInvalidated(#[source] Box<Error>),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// True for every error that spends the transaction token. Callers seeing
    /// one of these must restart from `lookup`.
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::TokenAlreadyInvalid
                | Self::TokenCorrupt
                | Self::ConcurrentUpdate
                | Self::TokenInvalidated(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
