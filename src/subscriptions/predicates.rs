//! Per-subscription predicates.

use crate::error::Result;
use crate::types::{Post, PostId, UserId};
use serde::{Deserialize, Serialize};

/// Decides whether a published payload reaches one subscriber.
///
/// A predicate carries its subscription arguments as its own state. Errors
/// (and panics) are isolated to the subscription that raised them.
pub trait Predicate<P>: Send + Sync {
    fn matches(&self, payload: &P) -> Result<bool>;
}

impl<P, F> Predicate<P> for F
where
    F: Fn(&P) -> Result<bool> + Send + Sync,
{
    fn matches(&self, payload: &P) -> Result<bool> {
        self(payload)
    }
}

/// Accepts every payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl<P> Predicate<P> for AcceptAll {
    fn matches(&self, _payload: &P) -> Result<bool> {
        Ok(true)
    }
}

/// Arguments of a new top-level post subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPostFilter {
    /// Only posts by this author; every post when unset.
    pub from_user: Option<UserId>,
}

impl Predicate<Post> for NewPostFilter {
    fn matches(&self, post: &Post) -> Result<bool> {
        Ok(self.from_user.map_or(true, |user| post.user_id == user))
    }
}

/// Arguments of a new reply subscription. The parent is mandatory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyFilter {
    pub to_post: PostId,
}

impl Predicate<Post> for ReplyFilter {
    fn matches(&self, post: &Post) -> Result<bool> {
        Ok(post.reply_to == Some(self.to_post))
    }
}
