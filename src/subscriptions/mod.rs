//! Topic-based publish/subscribe for live feed updates.
//!
//! This module provides in-process fan-out of published payloads:
//! - [`TopicRegistry`] tracks which subscriptions listen on which topic
//! - [`Predicate`]s decide, per subscriber, whether a payload is delivered
//! - [`Publisher`] delivers to every matching subscriber without blocking
//!
//! Subscriptions have bounded buffers. A subscriber that falls too far
//! behind is dropped and receives a final [`SubscriptionEvent::Dropped`].
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(TopicRegistry::new());
//! let publisher = Publisher::new(Arc::clone(&registry));
//!
//! // Replies to post 7 only
//! let handle = registry.subscribe(Topic::NEW_REPLY, ReplyFilter { to_post: RowId(7) });
//!
//! publisher.publish(&Topic::NEW_REPLY, &reply);
//!
//! for post in handle.payloads() {
//!     println!("Got reply: {:?}", post);
//! }
//! ```

mod predicates;
mod publisher;
mod registry;
mod types;

pub use predicates::{AcceptAll, NewPostFilter, Predicate, ReplyFilter};
pub use publisher::{PublishReport, Publisher};
pub use registry::TopicRegistry;
pub use types::{
    DropReason, SubscriptionConfig, SubscriptionEvent, SubscriptionHandle, SubscriptionId, Topic,
};
