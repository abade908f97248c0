// Sync engine - orchestrates the repositories on every screen load
//
// Screens call these operations; the engine composes the user directory,
// post repository, friend graph and theme resolver over one shared store.
// All mutations run under a single in-process lock: the store only supports
// whole-value writes, so unserialized read-modify-write sequences to the
// same key would lose updates.
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{FeedError, FeedResult};
use crate::friends::{FriendEntry, FriendGraph, FriendRequest};
use crate::posts::{normalize_post, Post, PostId, PostRepository, UNKNOWN_AUTHOR};
use crate::reactions::ReactionToggle;
use crate::store::DynDocumentStore;
use crate::theme::{resolve_theme, Theme, ThemeOverride};
use crate::users::{NewUser, SessionUser, User, UserDirectory, UserId};

/// A post prepared for rendering: reactions grouped into display counts
/// and the theme cascade resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPost {
    pub post: Post,
    pub reactions: Vec<(String, usize)>,
    pub theme: Theme,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedView {
    pub viewer: Option<SessionUser>,
    pub posts: Vec<FeedPost>,
    pub friend_requests: Vec<FriendRequest>,
}

/// Display identity for a profile screen. Unknown ids render a placeholder
/// instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUser {
    pub id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
    pub cover_url: Option<String>,
    pub bio: Option<String>,
    pub theme: Option<ThemeOverride>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    pub user: ProfileUser,
    pub posts: Vec<FeedPost>,
    pub friends: Vec<FriendEntry>,
    pub theme: Theme,
}

pub struct SyncEngine {
    users: UserDirectory,
    posts: PostRepository,
    friends: FriendGraph,
    write_lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(store: DynDocumentStore) -> Self {
        Self {
            users: UserDirectory::new(Arc::clone(&store)),
            posts: PostRepository::new(Arc::clone(&store)),
            friends: FriendGraph::new(store),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(store: DynDocumentStore, config: &crate::config::Config) -> Self {
        let mut engine = Self::new(store);
        engine.users = engine.users.with_bcrypt_cost(config.auth.bcrypt_cost);
        engine
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn posts(&self) -> &PostRepository {
        &self.posts
    }

    pub fn friends(&self) -> &FriendGraph {
        &self.friends
    }

    // ----- session ---------------------------------------------------

    pub async fn register(&self, input: NewUser) -> FeedResult<User> {
        let _guard = self.write_lock.lock().await;
        self.users.register(input).await
    }

    pub async fn login(&self, email: &str, password: &str) -> FeedResult<SessionUser> {
        let _guard = self.write_lock.lock().await;
        self.users.login(email, password).await
    }

    pub async fn logout(&self) -> FeedResult<()> {
        let _guard = self.write_lock.lock().await;
        self.users.logout().await
    }

    // ----- feed -------------------------------------------------------

    /// Load the feed with read-repair: every post's cached author fields
    /// are re-resolved from the directory and the corrected collection is
    /// written back, so each load opportunistically fixes stale data for
    /// all future readers.
    pub async fn load_feed(&self) -> FeedResult<FeedView> {
        let _guard = self.write_lock.lock().await;

        // The session summary survives logout for pre-fill, so the
        // sentinel decides whether there is a viewer at all.
        let viewer = if self.users.is_logged_in().await? {
            self.users.refresh_session().await?
        } else {
            None
        };
        let users = self.users.list_users().await?;
        let mut posts = self.posts.list_posts().await?;

        let mut repaired = 0usize;
        for post in &mut posts {
            if normalize_post(post, &users) {
                repaired += 1;
            }
        }
        if repaired > 0 {
            self.posts.save_posts(&posts).await?;
            tracing::info!(repaired, "read-repair rewrote stale posts");
        }

        let feed_posts = posts
            .into_iter()
            .map(|post| self.render_post(post, &users, None))
            .collect();

        let friend_requests = match &viewer {
            Some(session) => self.enriched_requests(&session.id, &users).await?,
            None => Vec::new(),
        };

        Ok(FeedView {
            viewer,
            posts: feed_posts,
            friend_requests,
        })
    }

    /// Load a profile. An unknown id yields a placeholder identity so the
    /// screen renders instead of failing. The optional viewer override is
    /// the top theme layer.
    pub async fn load_profile(
        &self,
        user_id: &UserId,
        viewer_override: Option<&ThemeOverride>,
    ) -> FeedResult<ProfileView> {
        let users = self.users.list_users().await?;

        let user = match users.iter().find(|u| &u.id == user_id) {
            Some(found) => ProfileUser {
                id: found.id.clone(),
                username: found.username.clone(),
                avatar_url: found.avatar_url.clone(),
                cover_url: found.cover_url.clone(),
                bio: found.bio.clone(),
                theme: found.theme.clone(),
            },
            None => ProfileUser {
                id: user_id.clone(),
                username: UNKNOWN_AUTHOR.to_string(),
                avatar_url: None,
                cover_url: None,
                bio: None,
                theme: None,
            },
        };

        let mut posts = self.posts.list_posts().await?;
        posts.retain(|p| &p.author_id == user_id);
        for post in &mut posts {
            normalize_post(post, &users);
        }
        let feed_posts = posts
            .into_iter()
            .map(|post| self.render_post(post, &users, viewer_override))
            .collect();

        let friends = self.friends.friends_of(user_id).await?;

        let mut layers: Vec<&ThemeOverride> = Vec::new();
        if let Some(theme) = &user.theme {
            layers.push(theme);
        }
        if let Some(over) = viewer_override {
            layers.push(over);
        }
        let theme = resolve_theme(&layers);

        Ok(ProfileView {
            user,
            posts: feed_posts,
            friends,
            theme,
        })
    }

    pub async fn create_post(
        &self,
        text: Option<String>,
        images: Vec<String>,
    ) -> FeedResult<Post> {
        let _guard = self.write_lock.lock().await;
        let actor = self.current_actor().await?;
        self.posts.create_post(&actor, text, images).await
    }

    pub async fn add_comment(&self, post_id: &PostId, text: &str) -> FeedResult<()> {
        let _guard = self.write_lock.lock().await;
        let actor = self.current_actor().await?;
        self.posts.add_comment(post_id, &actor, text).await?;
        Ok(())
    }

    pub async fn toggle_reaction(
        &self,
        post_id: &PostId,
        emoji: &str,
    ) -> FeedResult<ReactionToggle> {
        let _guard = self.write_lock.lock().await;
        let actor = self.current_actor().await?;
        self.posts.toggle_reaction(post_id, &actor.id, emoji).await
    }

    pub async fn delete_post(&self, post_id: &PostId) -> FeedResult<()> {
        let _guard = self.write_lock.lock().await;
        let actor = self.current_actor().await?;
        self.posts.delete_post(post_id, &actor).await
    }

    // ----- friends ------------------------------------------------------

    pub async fn send_friend_request(&self, to_id: &UserId) -> FeedResult<()> {
        let _guard = self.write_lock.lock().await;
        let actor = self.current_actor().await?;
        self.friends.send_friend_request(&actor, to_id).await
    }

    pub async fn accept_friend_request(&self, from_id: &UserId) -> FeedResult<()> {
        let _guard = self.write_lock.lock().await;
        let actor = self.current_actor().await?;
        self.friends.accept_friend_request(&actor, from_id).await
    }

    pub async fn decline_friend_request(&self, from_id: &UserId) -> FeedResult<()> {
        let _guard = self.write_lock.lock().await;
        let actor = self.current_actor().await?;
        self.friends.decline_friend_request(&actor.id, from_id).await
    }

    // ----- profile --------------------------------------------------

    /// Persist a profile edit and propagate the new display fields: the
    /// session summary is refreshed and every friend list that caches
    /// this user is repaired.
    pub async fn update_user_profile(&self, user: &User) -> FeedResult<()> {
        let _guard = self.write_lock.lock().await;
        self.users.upsert_user(user).await?;
        self.friends.sync_profile_across_friends(user).await?;
        Ok(())
    }

    // ----- internals --------------------------------------------------

    /// Full directory record of the session user. Operations that mutate
    /// data act as this user; no session means `NotAuthorized`.
    async fn current_actor(&self) -> FeedResult<User> {
        if !self.users.is_logged_in().await? {
            return Err(FeedError::NotAuthorized);
        }
        let session = self
            .users
            .session_user()
            .await?
            .ok_or(FeedError::NotAuthorized)?;
        self.users
            .get_user(&session.id)
            .await?
            .ok_or_else(|| FeedError::NotFound(format!("user {}", session.id)))
    }

    /// Resolve the render theme for one post: system default, then the
    /// author's current theme, then the post's creation-time snapshot,
    /// then an optional viewer-scope override on top.
    fn render_post(
        &self,
        post: Post,
        users: &[User],
        viewer_override: Option<&ThemeOverride>,
    ) -> FeedPost {
        let author_theme = users
            .iter()
            .find(|u| u.id == post.author_id)
            .and_then(|u| u.theme.as_ref());

        let mut layers: Vec<&ThemeOverride> = Vec::new();
        if let Some(theme) = author_theme {
            layers.push(theme);
        }
        if let Some(snapshot) = &post.theme_snapshot {
            layers.push(snapshot);
        }
        if let Some(over) = viewer_override {
            layers.push(over);
        }
        let theme = resolve_theme(&layers);
        let reactions = post.likes.aggregate();

        FeedPost {
            post,
            reactions,
            theme,
        }
    }

    /// The viewer's request queue with missing avatars filled in from the
    /// directory (requests only cache what the sender had at send time).
    async fn enriched_requests(
        &self,
        recipient: &UserId,
        users: &[User],
    ) -> FeedResult<Vec<FriendRequest>> {
        let mut requests = self.friends.requests_for(recipient).await?;
        for request in &mut requests {
            if request.from_avatar.is_none() {
                if let Some(sender) = users.iter().find(|u| u.id == request.from_id) {
                    request.from_avatar = sender.avatar_url.clone();
                }
            }
        }
        Ok(requests)
    }
}
