//! Resolvers for the post graph.
//!
//! Every resolver is a plain function that receives the [`Feed`] it works
//! against and, where the caller's identity matters, a request [`Context`].
//! The transport layer maps them onto its schema.

mod posts;

pub use posts::{
    author, create_post, delete_post, likes_count, people_who_liked, post, post_added, posts,
    replies, replies_count, reply_added, reply_post, thread, viewer_has_liked,
};

use crate::config::FeedConfig;
use crate::error::{FeedError, Result};
use crate::pagination::PageFetcher;
use crate::source::{DataSource, LogTable, MemoryTable, WriteSource};
use crate::subscriptions::{Publisher, TopicRegistry};
use crate::types::{Account, Like, Post, UserId};
use std::path::Path;
use std::sync::Arc;

/// Request-scoped caller information.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Context {
    /// Authenticated account, if any.
    pub current_user: Option<UserId>,
}

impl Context {
    /// A request without a logged-in user.
    pub fn anonymous() -> Self {
        Self { current_user: None }
    }

    pub fn user(id: UserId) -> Self {
        Self {
            current_user: Some(id),
        }
    }

    /// The authenticated user, or [`FeedError::Unauthenticated`].
    pub fn require_user(&self) -> Result<UserId> {
        self.current_user.ok_or(FeedError::Unauthenticated)
    }
}

/// Everything the resolvers need: the tables, the page fetcher and the
/// publisher for live updates.
///
/// Cloning a `Feed` is cheap and every clone shares the same tables and
/// subscribers.
pub struct Feed<PS, AS, LS> {
    posts: Arc<PS>,
    accounts: Arc<AS>,
    likes: Arc<LS>,
    fetcher: PageFetcher,
    publisher: Publisher<Post>,
}

/// A feed backed by in-memory tables.
pub type MemoryFeed = Feed<MemoryTable<Post>, MemoryTable<Account>, MemoryTable<Like>>;

/// A feed backed by log tables on disk.
pub type DurableFeed = Feed<LogTable<Post>, LogTable<Account>, LogTable<Like>>;

impl<PS, AS, LS> Feed<PS, AS, LS>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    pub fn new(posts: Arc<PS>, accounts: Arc<AS>, likes: Arc<LS>, config: &FeedConfig) -> Self {
        let registry = Arc::new(TopicRegistry::with_config(config.subscription));
        Self {
            posts,
            accounts,
            likes,
            fetcher: PageFetcher::new(config.page),
            publisher: Publisher::new(registry),
        }
    }

    pub fn posts(&self) -> &Arc<PS> {
        &self.posts
    }

    pub fn accounts(&self) -> &Arc<AS> {
        &self.accounts
    }

    pub fn likes(&self) -> &Arc<LS> {
        &self.likes
    }

    pub fn fetcher(&self) -> &PageFetcher {
        &self.fetcher
    }

    pub fn publisher(&self) -> &Publisher<Post> {
        &self.publisher
    }

    pub fn registry(&self) -> &Arc<TopicRegistry<Post>> {
        self.publisher.registry()
    }
}

impl MemoryFeed {
    /// A feed over empty in-memory tables.
    pub fn in_memory(config: &FeedConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            Arc::new(MemoryTable::new()),
            Arc::new(MemoryTable::new()),
            Arc::new(MemoryTable::new()),
            config,
        ))
    }
}

impl DurableFeed {
    /// Open (or create) a feed whose tables live under `path`.
    ///
    /// Layout: `posts/`, `accounts/` and `likes/`, one log table each.
    pub fn open(path: impl AsRef<Path>, config: &FeedConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();
        let interval = config.log_sync_interval;

        let posts = LogTable::open_with_sync_interval(path.join("posts"), interval)?;
        let accounts = LogTable::open_with_sync_interval(path.join("accounts"), interval)?;
        let likes = LogTable::open_with_sync_interval(path.join("likes"), interval)?;

        tracing::info!(
            path = %path.display(),
            posts = posts.len(),
            accounts = accounts.len(),
            likes = likes.len(),
            "feed opened"
        );

        Ok(Self::new(
            Arc::new(posts),
            Arc::new(accounts),
            Arc::new(likes),
            config,
        ))
    }
}

impl<PS, AS, LS> Clone for Feed<PS, AS, LS> {
    fn clone(&self) -> Self {
        Self {
            posts: Arc::clone(&self.posts),
            accounts: Arc::clone(&self.accounts),
            likes: Arc::clone(&self.likes),
            fetcher: self.fetcher,
            publisher: self.publisher.clone(),
        }
    }
}
