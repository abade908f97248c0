// Post collection - append-mostly documents with denormalized author fields
//
// Author name/avatar are cached inside each post and comment for offline
// rendering, but the user directory stays the source of truth.
// `normalize_post` is the single authority for reconciling the two.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FeedError, FeedResult};
use crate::reactions::{ReactionMap, ReactionToggle};
use crate::store::{self, keys, DynDocumentStore};
use crate::theme::ThemeOverride;
use crate::users::{User, UserId};

/// Display identity for a post whose author no longer resolves.
pub const UNKNOWN_AUTHOR: &str = "Other User";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostId(pub String);

impl PostId {
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

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Embedded in a post; append-only, no edit or delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub author_id: UserId,
    pub author_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    /// Cached display fields; re-derived from the directory on load.
    pub author_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: ReactionMap,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// The author's theme at creation time, so the post renders the same
    /// even after the author changes theme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_snapshot: Option<ThemeOverride>,
}

/// Resolve the cached display fields against the directory. Fields are
/// overwritten with canonical values when the author exists; for an
/// unknown author the last-known cached values are left untouched.
/// Comments are resolved the same way. Returns whether anything changed.
pub fn normalize_post(post: &mut Post, users: &[User]) -> bool {
    let mut changed = false;

    if let Some(owner) = users.iter().find(|u| u.id == post.author_id) {
        if post.author_name != owner.username {
            post.author_name = owner.username.clone();
            changed = true;
        }
        if post.author_avatar != owner.avatar_url {
            post.author_avatar = owner.avatar_url.clone();
            changed = true;
        }
    }

    for comment in &mut post.comments {
        if let Some(owner) = users.iter().find(|u| u.id == comment.author_id) {
            if comment.author_name != owner.username {
                comment.author_name = owner.username.clone();
                changed = true;
            }
            if comment.author_avatar != owner.avatar_url {
                comment.author_avatar = owner.avatar_url.clone();
                changed = true;
            }
        }
    }

    changed
}

pub struct PostRepository {
    store: DynDocumentStore,
}

impl PostRepository {
    pub fn new(store: DynDocumentStore) -> Self {
        Self { store }
    }

    /// Full post collection, newest first.
    pub async fn list_posts(&self) -> FeedResult<Vec<Post>> {
        Ok(store::read_collection(self.store.as_ref(), keys::POSTS).await?)
    }

    pub async fn get_post(&self, id: &PostId) -> FeedResult<Option<Post>> {
        let posts = self.list_posts().await?;
        Ok(posts.into_iter().find(|p| &p.id == id))
    }

    /// Rewrite the whole collection. The store has no partial updates, so
    /// every mutation is read-modify-write over this document.
    pub async fn save_posts(&self, posts: &[Post]) -> FeedResult<()> {
        store::write_doc(self.store.as_ref(), keys::POSTS, &posts).await?;
        Ok(())
    }

    /// Create a post carrying the author's current display fields and a
    /// snapshot of their theme. The feed is newest-first, so new posts are
    /// prepended.
    pub async fn create_post(
        &self,
        author: &User,
        text: Option<String>,
        images: Vec<String>,
    ) -> FeedResult<Post> {
        let text = text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        if text.is_none() && images.is_empty() {
            return Err(FeedError::InvalidInput(
                "a post needs text or at least one image".into(),
            ));
        }

        let post = Post {
            id: PostId::generate(),
            author_id: author.id.clone(),
            author_name: author.username.clone(),
            author_avatar: author.avatar_url.clone(),
            text,
            images,
            created_at: Utc::now(),
            likes: ReactionMap::new(),
            comments: Vec::new(),
            theme_snapshot: author.theme.clone(),
        };

        let mut posts = self.list_posts().await?;
        posts.insert(0, post.clone());
        self.save_posts(&posts).await?;
        tracing::info!(post_id = %post.id, author_id = %post.author_id, "created post");
        Ok(post)
    }

    /// Append a comment with the author's current display fields.
    pub async fn add_comment(
        &self,
        post_id: &PostId,
        author: &User,
        text: &str,
    ) -> FeedResult<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FeedError::InvalidInput("comment text is empty".into()));
        }

        let mut posts = self.list_posts().await?;
        let post = posts
            .iter_mut()
            .find(|p| &p.id == post_id)
            .ok_or_else(|| FeedError::NotFound(format!("post {post_id}")))?;

        let comment = Comment {
            author_id: author.id.clone(),
            author_name: author.username.clone(),
            author_avatar: author.avatar_url.clone(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        post.comments.push(comment.clone());
        self.save_posts(&posts).await?;
        tracing::debug!(post_id = %post_id, author_id = %author.id, "added comment");
        Ok(comment)
    }

    /// Toggle the user's reaction on a post and persist the collection.
    pub async fn toggle_reaction(
        &self,
        post_id: &PostId,
        user_id: &UserId,
        emoji: &str,
    ) -> FeedResult<ReactionToggle> {
        let mut posts = self.list_posts().await?;
        let post = posts
            .iter_mut()
            .find(|p| &p.id == post_id)
            .ok_or_else(|| FeedError::NotFound(format!("post {post_id}")))?;

        let outcome = post.likes.toggle(user_id, emoji);
        self.save_posts(&posts).await?;
        tracing::debug!(post_id = %post_id, user_id = %user_id, ?outcome, "toggled reaction");
        Ok(outcome)
    }

    /// Remove a post. Privileged: only admins may delete.
    pub async fn delete_post(&self, post_id: &PostId, acting: &User) -> FeedResult<()> {
        if !acting.is_admin() {
            return Err(FeedError::NotAuthorized);
        }

        let mut posts = self.list_posts().await?;
        let before = posts.len();
        posts.retain(|p| &p.id != post_id);
        if posts.len() == before {
            return Err(FeedError::NotFound(format!("post {post_id}")));
        }
        self.save_posts(&posts).await?;
        tracing::info!(post_id = %post_id, admin_id = %acting.id, "deleted post");
        Ok(())
    }
}
