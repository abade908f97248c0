// Friend graph - symmetric relation over two independent documents
//
// A friendship between A and B lives in two adjacency lists, `friends-A`
// and `friends-B`. The store has no multi-key atomicity, so the edge is
// written by one function whose per-side writes are idempotent: a crash
// between the two writes leaves a state that re-invoking repairs instead
// of duplicating.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FeedError, FeedResult};
use crate::store::{self, keys, DynDocumentStore};
use crate::users::{User, UserId};

/// One entry in a user's adjacency list. Username and avatar are cached
/// display fields; the directory is the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendEntry {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<&User> for FriendEntry {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

/// Pending request in the recipient's queue. At most one per ordered
/// (sender, recipient) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub from_id: UserId,
    pub from_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Relationship of an ordered (sender, recipient) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendshipStatus {
    None,
    Requested,
    Friends,
}

pub struct FriendGraph {
    store: DynDocumentStore,
}

impl FriendGraph {
    pub fn new(store: DynDocumentStore) -> Self {
        Self { store }
    }

    pub async fn friends_of(&self, user_id: &UserId) -> FeedResult<Vec<FriendEntry>> {
        Ok(store::read_collection(self.store.as_ref(), &keys::friends(user_id)).await?)
    }

    pub async fn requests_for(&self, user_id: &UserId) -> FeedResult<Vec<FriendRequest>> {
        Ok(store::read_collection(self.store.as_ref(), &keys::friend_requests(user_id)).await?)
    }

    pub async fn status(&self, from_id: &UserId, to_id: &UserId) -> FeedResult<FriendshipStatus> {
        if self
            .friends_of(from_id)
            .await?
            .iter()
            .any(|f| &f.id == to_id)
        {
            return Ok(FriendshipStatus::Friends);
        }
        if self
            .requests_for(to_id)
            .await?
            .iter()
            .any(|r| &r.from_id == from_id)
        {
            return Ok(FriendshipStatus::Requested);
        }
        Ok(FriendshipStatus::None)
    }

    /// Queue a request for the recipient. Fails before any write when the
    /// pair is already friends or already has a pending request.
    pub async fn send_friend_request(&self, from: &User, to_id: &UserId) -> FeedResult<()> {
        if &from.id == to_id {
            return Err(FeedError::InvalidInput(
                "cannot send a friend request to yourself".into(),
            ));
        }

        match self.status(&from.id, to_id).await? {
            FriendshipStatus::Friends => return Err(FeedError::AlreadyFriends),
            FriendshipStatus::Requested => return Err(FeedError::AlreadyRequested),
            FriendshipStatus::None => {}
        }

        let queue_key = keys::friend_requests(to_id);
        let mut queue: Vec<FriendRequest> =
            store::read_collection(self.store.as_ref(), &queue_key).await?;
        queue.push(FriendRequest {
            from_id: from.id.clone(),
            from_username: from.username.clone(),
            from_avatar: from.avatar_url.clone(),
            created_at: Utc::now(),
        });
        store::write_doc(self.store.as_ref(), &queue_key, &queue).await?;
        tracing::info!(from_id = %from.id, to_id = %to_id, "queued friend request");
        Ok(())
    }

    /// Accept the pending request from `from_id`. The friendship is
    /// written before the request is removed: if the process dies in
    /// between, the request is still queued and accepting again is a
    /// no-op on the friend lists.
    pub async fn accept_friend_request(&self, recipient: &User, from_id: &UserId) -> FeedResult<()> {
        let queue_key = keys::friend_requests(&recipient.id);
        let queue: Vec<FriendRequest> =
            store::read_collection(self.store.as_ref(), &queue_key).await?;
        if !queue.iter().any(|r| &r.from_id == from_id) {
            return Err(FeedError::NotFound(format!(
                "friend request from {from_id}"
            )));
        }

        let sender = self
            .lookup_user(from_id)
            .await?
            .ok_or_else(|| FeedError::NotFound(format!("user {from_id}")))?;

        self.write_friendship(recipient, &sender).await?;

        let remaining: Vec<FriendRequest> = queue
            .into_iter()
            .filter(|r| &r.from_id != from_id)
            .collect();
        store::write_doc(self.store.as_ref(), &queue_key, &remaining).await?;
        tracing::info!(recipient_id = %recipient.id, sender_id = %from_id, "accepted friend request");
        Ok(())
    }

    /// Remove the pending request only. Fire-and-forget: no friendship is
    /// created and the sender is not notified.
    pub async fn decline_friend_request(
        &self,
        recipient_id: &UserId,
        from_id: &UserId,
    ) -> FeedResult<()> {
        let queue_key = keys::friend_requests(recipient_id);
        let queue: Vec<FriendRequest> =
            store::read_collection(self.store.as_ref(), &queue_key).await?;
        let remaining: Vec<FriendRequest> = queue
            .iter()
            .filter(|r| &r.from_id != from_id)
            .cloned()
            .collect();
        if remaining.len() == queue.len() {
            return Err(FeedError::NotFound(format!(
                "friend request from {from_id}"
            )));
        }
        store::write_doc(self.store.as_ref(), &queue_key, &remaining).await?;
        tracing::info!(recipient_id = %recipient_id, sender_id = %from_id, "declined friend request");
        Ok(())
    }

    /// Write one logical edge as two key writes. Each side is skipped if
    /// the entry already exists, so re-invoking after a partial failure
    /// repairs the edge instead of duplicating it.
    pub async fn write_friendship(&self, a: &User, b: &User) -> FeedResult<()> {
        self.add_entry(&a.id, FriendEntry::from(b)).await?;
        self.add_entry(&b.id, FriendEntry::from(a)).await?;
        Ok(())
    }

    /// After a profile edit, repair the cached display fields inside every
    /// adjacency document that lists the user.
    pub async fn sync_profile_across_friends(&self, updated: &User) -> FeedResult<()> {
        for friend in self.friends_of(&updated.id).await? {
            let key = keys::friends(&friend.id);
            let mut list: Vec<FriendEntry> =
                store::read_collection(self.store.as_ref(), &key).await?;
            let mut changed = false;
            for entry in list.iter_mut().filter(|e| e.id == updated.id) {
                if entry.username != updated.username || entry.avatar_url != updated.avatar_url {
                    entry.username = updated.username.clone();
                    entry.avatar_url = updated.avatar_url.clone();
                    changed = true;
                }
            }
            if changed {
                store::write_doc(self.store.as_ref(), &key, &list).await?;
            }
        }
        Ok(())
    }

    async fn add_entry(&self, owner: &UserId, entry: FriendEntry) -> FeedResult<()> {
        let key = keys::friends(owner);
        let mut list: Vec<FriendEntry> =
            store::read_collection(self.store.as_ref(), &key).await?;
        if list.iter().any(|f| f.id == entry.id) {
            return Ok(());
        }
        list.push(entry);
        store::write_doc(self.store.as_ref(), &key, &list).await?;
        Ok(())
    }

    async fn lookup_user(&self, id: &UserId) -> FeedResult<Option<User>> {
        let users: Vec<User> = store::read_collection(self.store.as_ref(), keys::USERS).await?;
        Ok(users.into_iter().find(|u| &u.id == id))
    }
}
