//! Subscription types for live feed updates.

use super::registry::TopicRegistry;
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Weak;
use std::time::Duration;

/// Name of a class of events.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(Cow<'static, str>);

impl Topic {
    /// A new top-level post was created.
    pub const NEW_POST: Topic = Topic(Cow::Borrowed("NEW_POST"));

    /// A new reply to an existing post was created.
    pub const NEW_REPLY: Topic = Topic(Cow::Borrowed("NEW_REPLY"));

    pub fn new(name: impl Into<String>) -> Self {
        Topic(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Topic({})", self.0)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Topic {
    fn from(name: &'static str) -> Self {
        Topic(Cow::Borrowed(name))
    }
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping the subscriber.
    /// Default: 1000
    pub buffer_size: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self { buffer_size: 1000 }
    }
}

/// Events delivered to a subscriber.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionEvent<P> {
    /// A published payload accepted by this subscription's predicate.
    Item { payload: P },

    /// The subscription was removed; no further events follow.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// The registry shut down.
    Closed,
}

/// Receiving end of a subscription.
///
/// Dropping the handle unsubscribes, so a transport that simply drops the
/// handle on disconnect leaves nothing registered.
pub struct SubscriptionHandle<P> {
    id: SubscriptionId,
    topic: Topic,
    receiver: Receiver<SubscriptionEvent<P>>,
    registry: Weak<TopicRegistry<P>>,
}

impl<P> SubscriptionHandle<P> {
    pub(crate) fn new(
        id: SubscriptionId,
        topic: Topic,
        receiver: Receiver<SubscriptionEvent<P>>,
        registry: Weak<TopicRegistry<P>>,
    ) -> Self {
        Self {
            id,
            topic,
            receiver,
            registry,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<SubscriptionEvent<P>, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<SubscriptionEvent<P>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<SubscriptionEvent<P>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Wait up to `timeout` for the next payload. Returns `None` on timeout,
    /// or once the subscription has been dropped.
    pub fn next_payload(&self, timeout: Duration) -> Option<P> {
        match self.receiver.recv_timeout(timeout) {
            Ok(SubscriptionEvent::Item { payload }) => Some(payload),
            _ => None,
        }
    }

    /// Blocking stream of payloads. Ends when the subscription is dropped.
    pub fn payloads(&self) -> impl Iterator<Item = P> + '_ {
        self.receiver.iter().map_while(|event| match event {
            SubscriptionEvent::Item { payload } => Some(payload),
            SubscriptionEvent::Dropped { .. } => None,
        })
    }

    /// Number of events waiting in the buffer.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Explicitly unsubscribe.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl<P> Drop for SubscriptionHandle<P> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}

impl<P> fmt::Debug for SubscriptionHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("pending", &self.receiver.len())
            .finish()
    }
}
