//! Core types for the feed layer.

use crate::filter::{Row, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Stable, strictly increasing identifier of a row within its source.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl RowId {
    pub fn next(self) -> Self {
        RowId(self.0 + 1)
    }
}

impl fmt::Debug for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowId({})", self.0)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RowId> for Value {
    fn from(id: RowId) -> Self {
        Value::Uint(id.0)
    }
}

/// Identifier of a post row.
pub type PostId = RowId;

/// Identifier of an account row.
pub type UserId = RowId;

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// A post in the feed. Replies are posts with `reply_to` set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Assigned by the source on insert.
    pub id: PostId,

    /// Author of the post.
    pub user_id: UserId,

    pub body: String,

    /// Parent post when this post is a reply.
    pub reply_to: Option<PostId>,

    pub created_at: Timestamp,
}

impl Post {
    /// Whether this post answers another one.
    pub fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }
}

impl Row for Post {
    fn id(&self) -> RowId {
        self.id
    }

    fn field(&self, name: &str) -> Value {
        match name {
            "id" => self.id.into(),
            "user_id" => self.user_id.into(),
            "body" => Value::Text(self.body.clone()),
            "reply_to" => self.reply_to.map(Value::from).unwrap_or(Value::Null),
            "created_at" => Value::Int(self.created_at.0),
            _ => Value::Null,
        }
    }
}

/// Input for creating a new post (before id, author and time are assigned).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewPost {
    pub body: String,
    pub reply_to: Option<PostId>,
}

impl NewPost {
    /// A top-level post.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            reply_to: None,
        }
    }

    /// A reply to `parent`.
    pub fn reply(body: impl Into<String>, parent: PostId) -> Self {
        Self {
            body: body.into(),
            reply_to: Some(parent),
        }
    }
}

/// Public account fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub created_at: Timestamp,
}

impl Row for Account {
    fn id(&self) -> RowId {
        self.id
    }

    fn field(&self, name: &str) -> Value {
        match name {
            "id" => self.id.into(),
            "username" => Value::Text(self.username.clone()),
            "display_name" => Value::Text(self.display_name.clone()),
            "created_at" => Value::Int(self.created_at.0),
            _ => Value::Null,
        }
    }
}

/// A user liking a post.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Like {
    pub id: RowId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub created_at: Timestamp,
}

impl Row for Like {
    fn id(&self) -> RowId {
        self.id
    }

    fn field(&self, name: &str) -> Value {
        match name {
            "id" => self.id.into(),
            "post_id" => self.post_id.into(),
            "user_id" => self.user_id.into(),
            "created_at" => Value::Int(self.created_at.0),
            _ => Value::Null,
        }
    }
}
