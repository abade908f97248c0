use crate::store::StoreError;

/// Recoverable outcomes are typed; only store I/O is fatal for an operation.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Already friends")]
    AlreadyFriends,

    #[error("Friend request already pending")]
    AlreadyRequested,

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FeedError {
    /// Whether the caller can recover by adjusting its request, as opposed
    /// to a store failure that should surface as a generic retry-able error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FeedError::Store(_) | FeedError::Internal(_))
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
