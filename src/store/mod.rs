// Document store - isolates all persistence side effects
mod memory;
mod sqlite;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::sqlite::{create_pool, SqliteStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Flat string-keyed persistence with whole-value get/put semantics.
/// No atomicity across keys; every mutation is read-modify-write.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load the raw JSON string for a key, `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write the full value for a key (idempotent upsert).
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key; absent keys are a no-op.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Type alias for Arc-wrapped store (shared across repositories)
pub type DynDocumentStore = Arc<dyn DocumentStore>;

/// Read a typed document; a missing key reads as `None`.
pub async fn read_doc<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Read a collection document; a missing key reads as empty.
pub async fn read_collection<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    key: &str,
) -> Result<Vec<T>, StoreError> {
    Ok(read_doc(store, key).await?.unwrap_or_default())
}

/// Serialize and write a typed document.
pub async fn write_doc<T: Serialize>(
    store: &dyn DocumentStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw).await
}

/// Document key names. These are the external persisted format and must
/// match byte-for-byte what the UI layer reads.
pub mod keys {
    use crate::users::UserId;

    pub const USERS: &str = "users";
    pub const POSTS: &str = "posts";
    pub const CURRENT_USER: &str = "currentUser";
    pub const IS_LOGGED_IN: &str = "isLoggedIn";
    pub const LAST_LOGGED_IN_USER: &str = "lastLoggedInUser";

    /// Sentinel value stored under `isLoggedIn`.
    pub const LOGGED_IN_SENTINEL: &str = "true";

    /// Per-user friend adjacency list.
    pub fn friends(user_id: &UserId) -> String {
        format!("friends-{}", user_id)
    }

    /// Per-recipient friend request queue.
    pub fn friend_requests(user_id: &UserId) -> String {
        format!("friendRequests-{}", user_id)
    }
}
