//! # Feedline
//!
//! Data access and live updates for a social feed.
//!
//! ## Core Concepts
//!
//! - **Sources**: Tables of rows with stable, increasing ids, in memory or
//!   in an append-only log on disk
//! - **Filters**: Parameterized conditions over named row fields
//! - **Pagination**: Resumable pages addressed by opaque cursors
//! - **Subscriptions**: Topic fan-out to live listeners, each with its own
//!   predicate
//! - **Resolvers**: Post fields, queries and mutations over a [`Feed`]
//!
//! ## Example
//!
//! ```ignore
//! use feedline::{create_post, post_added, Context, FeedConfig, MemoryFeed, NewPost, RowId};
//!
//! let feed = MemoryFeed::in_memory(&FeedConfig::default())?;
//!
//! // Listen for new posts by user 1
//! let handle = post_added(&feed, Some(RowId(1)));
//!
//! // Create a post as user 1
//! let post = create_post(&feed, NewPost::new("Hello, world!"), &Context::user(RowId(1)))?;
//!
//! assert_eq!(handle.next_payload(Duration::from_secs(1)), Some(post));
//!
//! // Page through everything
//! let page = posts(&feed, &PaginationArgs::first(20), None)?;
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod pagination;
pub mod resolvers;
pub mod source;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use config::FeedConfig;
pub use error::{FeedError, Result};
pub use filter::{Condition, Filter, Op, Row, Value};
pub use pagination::{
    fetch_connection, Connection, Cursor, Edge, Page, PageFetcher, PageInfo, PageLimits,
    PaginationArgs,
};
pub use resolvers::{
    author, create_post, delete_post, likes_count, people_who_liked, post, post_added, posts,
    replies, replies_count, reply_added, reply_post, thread, viewer_has_liked, Context,
    DurableFeed, Feed, MemoryFeed,
};
pub use source::{DataSource, LogTable, MemoryTable, ScanRequest, WriteSource};
pub use subscriptions::{
    AcceptAll, DropReason, NewPostFilter, Predicate, PublishReport, Publisher, ReplyFilter,
    SubscriptionConfig, SubscriptionEvent, SubscriptionHandle, SubscriptionId, Topic,
    TopicRegistry,
};
pub use types::*;
