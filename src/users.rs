// User directory - canonical account records
//
// The `users` document is the source of truth for every display field
// (username, avatar) that gets denormalized into posts, comments, friend
// lists and friend requests. Everything else in the crate re-derives those
// fields from here.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FeedError, FeedResult};
use crate::store::{self, keys, DynDocumentStore};
use crate::theme::ThemeOverride;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Canonical account record. Created at registration, mutated by profile
/// edits, never hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeOverride>,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Session summary of the active account, persisted under `currentUser`.
/// A cached copy of the directory's display fields, refreshed on every
/// feed load and after every profile edit so the current actor is never
/// stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeOverride>,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            avatar_url: user.avatar_url.clone(),
            cover_url: user.cover_url.clone(),
            theme: user.theme.clone(),
        }
    }
}

/// Registration input; the caller (form UI) has already collected it.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password: String,
}

pub struct UserDirectory {
    store: DynDocumentStore,
    bcrypt_cost: u32,
}

impl UserDirectory {
    pub fn new(store: DynDocumentStore) -> Self {
        Self {
            store,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub async fn list_users(&self) -> FeedResult<Vec<User>> {
        Ok(store::read_collection(self.store.as_ref(), keys::USERS).await?)
    }

    pub async fn get_user(&self, id: &UserId) -> FeedResult<Option<User>> {
        let users = self.list_users().await?;
        Ok(users.into_iter().find(|u| &u.id == id))
    }

    /// Replace the record if the id already exists, else append. If the
    /// updated user is the active session user, the session summary is
    /// rewritten too so subsequent reads of the current actor are fresh.
    pub async fn upsert_user(&self, user: &User) -> FeedResult<()> {
        let mut users = self.list_users().await?;
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(slot) => *slot = user.clone(),
            None => users.push(user.clone()),
        }
        store::write_doc(self.store.as_ref(), keys::USERS, &users).await?;

        if let Some(session) = self.session_user().await? {
            if session.id == user.id {
                self.write_session(&SessionUser::from(user)).await?;
            }
        }

        tracing::debug!(user_id = %user.id, "upserted user record");
        Ok(())
    }

    /// Create an account. Email uniqueness is case-sensitive, matching the
    /// behavior of the data this store may already contain.
    pub async fn register(&self, input: NewUser) -> FeedResult<User> {
        let email = input.email.trim().to_string();
        let username = input.username.trim().to_string();
        let password = input.password.trim();

        if email.is_empty() || username.is_empty() || password.is_empty() {
            return Err(FeedError::InvalidInput("all fields are required".into()));
        }
        if !email.contains('@') {
            return Err(FeedError::InvalidInput("malformed email".into()));
        }

        let mut users = self.list_users().await?;
        if users.iter().any(|u| u.email == email) {
            return Err(FeedError::AlreadyExists(format!("email {email}")));
        }

        let user = User {
            id: UserId::generate(),
            username,
            email,
            password_hash: hash_password(password, self.bcrypt_cost)?,
            avatar_url: None,
            cover_url: None,
            bio: None,
            theme: None,
            role: Role::User,
            created_at: Utc::now(),
        };

        users.push(user.clone());
        store::write_doc(self.store.as_ref(), keys::USERS, &users).await?;
        tracing::info!(user_id = %user.id, "registered account");
        Ok(user)
    }

    /// Verify credentials and open a session: writes the `currentUser`
    /// summary and the `isLoggedIn` sentinel. A failed match is reported
    /// as `NotFound` so the caller can show a generic message.
    pub async fn login(&self, email: &str, password: &str) -> FeedResult<SessionUser> {
        let email = email.trim();
        let password = password.trim();

        let users = self.list_users().await?;
        let found = users
            .iter()
            .find(|u| u.email == email && verify_password(password, &u.password_hash))
            .ok_or_else(|| FeedError::NotFound("no account matches those credentials".into()))?;

        let session = SessionUser::from(found);
        self.write_session(&session).await?;
        self.store
            .put(keys::IS_LOGGED_IN, keys::LOGGED_IN_SENTINEL)
            .await?;
        tracing::info!(user_id = %session.id, "session opened");
        Ok(session)
    }

    /// Close the session. The summary is kept for pre-fill; only the
    /// sentinel is removed, and the last account id is recorded.
    pub async fn logout(&self) -> FeedResult<()> {
        if let Some(session) = self.session_user().await? {
            store::write_doc(self.store.as_ref(), keys::LAST_LOGGED_IN_USER, &session.id).await?;
        }
        self.store.delete(keys::IS_LOGGED_IN).await?;
        tracing::info!("session closed");
        Ok(())
    }

    pub async fn is_logged_in(&self) -> FeedResult<bool> {
        Ok(self.store.get(keys::IS_LOGGED_IN).await?.as_deref() == Some(keys::LOGGED_IN_SENTINEL))
    }

    pub async fn session_user(&self) -> FeedResult<Option<SessionUser>> {
        Ok(store::read_doc(self.store.as_ref(), keys::CURRENT_USER).await?)
    }

    /// Re-resolve the session summary against the directory and write the
    /// fresh copy back, so screens loaded after a profile edit see the
    /// latest display fields. Returns the refreshed summary.
    pub async fn refresh_session(&self) -> FeedResult<Option<SessionUser>> {
        let Some(session) = self.session_user().await? else {
            return Ok(None);
        };
        let refreshed = match self.get_user(&session.id).await? {
            Some(latest) => SessionUser::from(&latest),
            None => session,
        };
        self.write_session(&refreshed).await?;
        Ok(Some(refreshed))
    }

    pub async fn change_password(&self, id: &UserId, old: &str, new: &str) -> FeedResult<()> {
        if old.is_empty() || new.is_empty() {
            return Err(FeedError::InvalidInput("all fields are required".into()));
        }

        let mut user = self
            .get_user(id)
            .await?
            .ok_or_else(|| FeedError::NotFound(format!("user {id}")))?;

        if !verify_password(old, &user.password_hash) {
            return Err(FeedError::InvalidInput("old password is incorrect".into()));
        }
        if new == old {
            return Err(FeedError::InvalidInput(
                "new password cannot be the same as old password".into(),
            ));
        }

        user.password_hash = hash_password(new, self.bcrypt_cost)?;
        self.upsert_user(&user).await
    }

    pub async fn change_email(&self, id: &UserId, new_email: &str) -> FeedResult<()> {
        let new_email = new_email.trim();
        if new_email.is_empty() || !new_email.contains('@') {
            return Err(FeedError::InvalidInput("malformed email".into()));
        }

        let users = self.list_users().await?;
        if users.iter().any(|u| &u.id != id && u.email == new_email) {
            return Err(FeedError::AlreadyExists(format!("email {new_email}")));
        }

        let mut user = users
            .into_iter()
            .find(|u| &u.id == id)
            .ok_or_else(|| FeedError::NotFound(format!("user {id}")))?;
        user.email = new_email.to_string();
        self.upsert_user(&user).await
    }

    pub async fn change_username(&self, id: &UserId, new_username: &str) -> FeedResult<()> {
        let new_username = new_username.trim();
        if new_username.is_empty() {
            return Err(FeedError::InvalidInput("username is required".into()));
        }

        let mut user = self
            .get_user(id)
            .await?
            .ok_or_else(|| FeedError::NotFound(format!("user {id}")))?;
        user.username = new_username.to_string();
        self.upsert_user(&user).await
    }

    async fn write_session(&self, session: &SessionUser) -> FeedResult<()> {
        store::write_doc(self.store.as_ref(), keys::CURRENT_USER, session).await?;
        Ok(())
    }
}

fn hash_password(password: &str, cost: u32) -> FeedResult<String> {
    bcrypt::hash(password, cost)
        .map_err(|e| FeedError::Internal(format!("password hash failed: {e}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn directory() -> UserDirectory {
        UserDirectory::new(Arc::new(MemoryStore::new())).with_bcrypt_cost(4) // bcrypt's minimum cost; the crate does not export MIN_COST
    }

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password: "hunter22".to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let dir = directory();
        let user = dir.register(new_user("ana@example.com", "ana")).await.unwrap();
        assert_ne!(user.password_hash, "hunter22");
        assert_eq!(user.role, Role::User);

        let session = dir.login("ana@example.com", "hunter22").await.unwrap();
        assert_eq!(session.id, user.id);
        assert_eq!(session.username, "ana");
        assert!(dir.is_logged_in().await.unwrap());
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let dir = directory();
        dir.register(new_user("ana@example.com", "ana")).await.unwrap();

        let result = dir.login("ana@example.com", "wrong").await;
        assert!(matches!(result, Err(FeedError::NotFound(_))));
        assert!(!dir.is_logged_in().await.unwrap());
    }

    #[tokio::test]
    async fn email_uniqueness_is_case_sensitive() {
        let dir = directory();
        dir.register(new_user("ana@example.com", "ana")).await.unwrap();

        let dup = dir.register(new_user("ana@example.com", "ana2")).await;
        assert!(matches!(dup, Err(FeedError::AlreadyExists(_))));

        // Different case is a different address in this store
        dir.register(new_user("Ana@example.com", "ana3")).await.unwrap();
        assert_eq!(dir.list_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn register_validates_input() {
        let dir = directory();
        assert!(matches!(
            dir.register(new_user("", "ana")).await,
            Err(FeedError::InvalidInput(_))
        ));
        assert!(matches!(
            dir.register(new_user("not-an-email", "ana")).await,
            Err(FeedError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn upsert_refreshes_active_session() {
        let dir = directory();
        let mut user = dir.register(new_user("ana@example.com", "ana")).await.unwrap();
        dir.login("ana@example.com", "hunter22").await.unwrap();

        user.username = "ana_renamed".to_string();
        user.avatar_url = Some("file:///ana.png".to_string());
        dir.upsert_user(&user).await.unwrap();

        let session = dir.session_user().await.unwrap().unwrap();
        assert_eq!(session.username, "ana_renamed");
        assert_eq!(session.avatar_url.as_deref(), Some("file:///ana.png"));
    }

    #[tokio::test]
    async fn upsert_does_not_touch_another_users_session() {
        let dir = directory();
        dir.register(new_user("ana@example.com", "ana")).await.unwrap();
        let mut bo = dir.register(new_user("bo@example.com", "bo")).await.unwrap();
        dir.login("ana@example.com", "hunter22").await.unwrap();

        bo.username = "bo_renamed".to_string();
        dir.upsert_user(&bo).await.unwrap();

        let session = dir.session_user().await.unwrap().unwrap();
        assert_eq!(session.username, "ana");
    }

    #[tokio::test]
    async fn refresh_session_picks_up_directory_changes() {
        let dir = directory();
        let mut user = dir.register(new_user("ana@example.com", "ana")).await.unwrap();
        dir.login("ana@example.com", "hunter22").await.unwrap();

        // Simulate a stale session: mutate the directory document directly
        user.username = "ana_new".to_string();
        let mut users = dir.list_users().await.unwrap();
        users[0] = user;
        store::write_doc(dir.store.as_ref(), keys::USERS, &users)
            .await
            .unwrap();

        let refreshed = dir.refresh_session().await.unwrap().unwrap();
        assert_eq!(refreshed.username, "ana_new");
        // And the persisted copy was repaired too
        let session = dir.session_user().await.unwrap().unwrap();
        assert_eq!(session.username, "ana_new");
    }

    #[tokio::test]
    async fn logout_removes_sentinel_and_records_last_user() {
        let dir = directory();
        let user = dir.register(new_user("ana@example.com", "ana")).await.unwrap();
        dir.login("ana@example.com", "hunter22").await.unwrap();
        dir.logout().await.unwrap();

        assert!(!dir.is_logged_in().await.unwrap());
        let last: Option<UserId> =
            store::read_doc(dir.store.as_ref(), keys::LAST_LOGGED_IN_USER)
                .await
                .unwrap();
        assert_eq!(last, Some(user.id));
        // Session summary survives for pre-fill
        assert!(dir.session_user().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn change_password_rules() {
        let dir = directory();
        let user = dir.register(new_user("ana@example.com", "ana")).await.unwrap();

        assert!(matches!(
            dir.change_password(&user.id, "wrong", "next1234").await,
            Err(FeedError::InvalidInput(_))
        ));
        assert!(matches!(
            dir.change_password(&user.id, "hunter22", "hunter22").await,
            Err(FeedError::InvalidInput(_))
        ));

        dir.change_password(&user.id, "hunter22", "next1234").await.unwrap();
        dir.login("ana@example.com", "next1234").await.unwrap();
    }

    #[tokio::test]
    async fn change_email_enforces_uniqueness_against_others() {
        let dir = directory();
        let ana = dir.register(new_user("ana@example.com", "ana")).await.unwrap();
        dir.register(new_user("bo@example.com", "bo")).await.unwrap();

        assert!(matches!(
            dir.change_email(&ana.id, "bo@example.com").await,
            Err(FeedError::AlreadyExists(_))
        ));

        // Re-saving your own address is fine
        dir.change_email(&ana.id, "ana@example.com").await.unwrap();
    }

    #[test]
    fn user_document_round_trips_camel_case() {
        let user = User {
            id: UserId::new("u1"),
            username: "ana".into(),
            email: "ana@example.com".into(),
            password_hash: "$2b$12$abc".into(),
            avatar_url: Some("file:///a.png".into()),
            cover_url: None,
            bio: None,
            theme: None,
            role: Role::Admin,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("\"passwordHash\""));
        assert!(json.contains("\"avatarUrl\""));
        assert!(json.contains("\"role\":\"admin\""));
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn legacy_user_documents_default_missing_fields() {
        let raw = r#"{
            "id": "1700000000000",
            "username": "legacy",
            "email": "legacy@example.com",
            "passwordHash": "plaintext-oops"
        }"#;
        let user: User = serde_json::from_str(raw).unwrap();
        assert_eq!(user.role, Role::User);
        assert_eq!(user.theme, None);
        assert_eq!(user.avatar_url, None);
    }
}
