//! Topic registry: who listens to what.

use super::predicates::Predicate;
use super::types::{
    DropReason, SubscriptionConfig, SubscriptionEvent, SubscriptionHandle, SubscriptionId, Topic,
};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Result of offering one event to a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    Sent,
    /// Buffer is full; the subscriber is not keeping up.
    Full,
    /// The receiving end is gone.
    Disconnected,
    /// The subscription was removed and its drop notice already sent.
    Closed,
}

/// Internal subscription state.
pub(crate) struct Subscription<P> {
    pub(crate) id: SubscriptionId,
    pub(crate) topic: Topic,
    predicate: Box<dyn Predicate<P>>,
    sender: Sender<SubscriptionEvent<P>>,
    buffer_size: usize,
    /// Serializes sends. Holds `true` once the drop notice has gone out.
    send_gate: Mutex<bool>,
    delivered: AtomicU64,
}

impl<P> Subscription<P> {
    /// Evaluate this subscription's predicate.
    pub(crate) fn matches(&self, payload: &P) -> crate::error::Result<bool> {
        self.predicate.matches(payload)
    }

    /// Offer a payload without blocking.
    ///
    /// The channel holds one slot beyond `buffer_size`, reserved for the
    /// drop notice, so an overflowing subscriber still learns why it went
    /// away. The length check and the send happen under `send_gate`, so
    /// concurrent publishers cannot fill the reserved slot.
    pub(crate) fn try_deliver(&self, payload: P) -> Delivery {
        let closed = self.send_gate.lock();
        if *closed {
            return Delivery::Closed;
        }
        if self.sender.len() >= self.buffer_size {
            return Delivery::Full;
        }
        match self.sender.try_send(SubscriptionEvent::Item { payload }) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                Delivery::Sent
            }
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Disconnected(_)) => Delivery::Disconnected,
        }
    }

    /// Send the final event. Fails only if the receiver is gone.
    fn notify_dropped(&self, reason: DropReason) {
        let mut closed = self.send_gate.lock();
        if *closed {
            return;
        }
        *closed = true;
        let _ = self.sender.try_send(SubscriptionEvent::Dropped { reason });
    }

    pub(crate) fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

struct RegistryState<P> {
    /// Subscriptions grouped by topic. A topic key exists only while it has
    /// at least one subscriber.
    topics: HashMap<Topic, HashMap<SubscriptionId, Arc<Subscription<P>>>>,
    /// Subscription id to topic, for removal by id.
    index: HashMap<SubscriptionId, Topic>,
}

impl<P> RegistryState<P> {
    fn remove(&mut self, id: SubscriptionId) -> Option<Arc<Subscription<P>>> {
        let topic = self.index.remove(&id)?;
        let subs = self.topics.get_mut(&topic)?;
        let removed = subs.remove(&id);
        if subs.is_empty() {
            self.topics.remove(&topic);
        }
        removed
    }
}

/// Maps topics to their live subscriptions.
///
/// Mutation is serialized by a lock; publishing works on a snapshot taken
/// under a short read lock, so a slow delivery never holds up
/// subscribe/unsubscribe.
pub struct TopicRegistry<P> {
    state: RwLock<RegistryState<P>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    /// Config applied by [`TopicRegistry::subscribe`].
    default_config: SubscriptionConfig,
}

impl<P: Send + 'static> TopicRegistry<P> {
    /// Create a new registry with the default subscription config.
    pub fn new() -> Self {
        Self::with_config(SubscriptionConfig::default())
    }

    pub fn with_config(default_config: SubscriptionConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                topics: HashMap::new(),
                index: HashMap::new(),
            }),
            next_id: AtomicU64::new(1),
            default_config,
        }
    }

    /// Register a subscription on `topic` with the registry's default config.
    pub fn subscribe(
        self: &Arc<Self>,
        topic: Topic,
        predicate: impl Predicate<P> + 'static,
    ) -> SubscriptionHandle<P> {
        self.subscribe_with(topic, predicate, self.default_config)
    }

    /// Register a subscription on `topic`.
    ///
    /// Returns a handle for receiving events. Dropping the handle
    /// unsubscribes.
    pub fn subscribe_with(
        self: &Arc<Self>,
        topic: Topic,
        predicate: impl Predicate<P> + 'static,
        config: SubscriptionConfig,
    ) -> SubscriptionHandle<P> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let buffer_size = config.buffer_size.max(1);
        let (sender, receiver) = bounded(buffer_size + 1);

        let subscription = Arc::new(Subscription {
            id,
            topic: topic.clone(),
            predicate: Box::new(predicate),
            sender,
            buffer_size,
            send_gate: Mutex::new(false),
            delivered: AtomicU64::new(0),
        });

        {
            let mut state = self.state.write();
            state
                .topics
                .entry(topic.clone())
                .or_default()
                .insert(id, subscription);
            state.index.insert(id, topic.clone());
        }

        tracing::debug!(subscription_id = id.0, topic = %topic, buffer_size, "subscription created");

        SubscriptionHandle::new(id, topic, receiver, Arc::downgrade(self))
    }
}

impl<P> TopicRegistry<P> {
    /// Unsubscribe and clean up.
    ///
    /// Idempotent: unknown or already-removed ids are a no-op. Returns
    /// whether a subscription was removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.remove(id, DropReason::Unsubscribed)
    }

    /// Remove a subscription, telling its receiver why (best effort).
    pub(crate) fn remove(&self, id: SubscriptionId, reason: DropReason) -> bool {
        let removed = self.state.write().remove(id);
        match removed {
            Some(sub) => {
                sub.notify_dropped(reason);
                tracing::debug!(
                    subscription_id = id.0,
                    topic = %sub.topic,
                    delivered = sub.delivered(),
                    reason = ?reason,
                    "subscription removed"
                );
                true
            }
            None => false,
        }
    }

    /// Remove a subscription whose receiver is already gone.
    pub(crate) fn forget(&self, id: SubscriptionId) -> bool {
        if self.state.write().remove(id).is_some() {
            tracing::debug!(subscription_id = id.0, "subscription receiver disconnected");
            return true;
        }
        false
    }

    /// Current subscriptions on `topic`. The lock is released before the
    /// snapshot is returned.
    pub(crate) fn snapshot(&self, topic: &Topic) -> Vec<Arc<Subscription<P>>> {
        let state = self.state.read();
        let mut subs: Vec<Arc<Subscription<P>>> = state
            .topics
            .get(topic)
            .map(|subs| subs.values().cloned().collect())
            .unwrap_or_default();
        subs.sort_by_key(|s| s.id);
        subs
    }

    /// Drop every subscription, e.g. on shutdown.
    pub fn close_all(&self) {
        let removed: Vec<Arc<Subscription<P>>> = {
            let mut state = self.state.write();
            state.index.clear();
            state
                .topics
                .drain()
                .flat_map(|(_, subs)| subs.into_values())
                .collect()
        };
        for sub in &removed {
            sub.notify_dropped(DropReason::Closed);
        }
        tracing::debug!(removed = removed.len(), "registry closed");
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.state.read().index.len()
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.state.read().topics.len()
    }

    /// Ids subscribed to `topic`, ascending.
    pub fn subscribers_on(&self, topic: &Topic) -> Vec<SubscriptionId> {
        let mut ids: Vec<SubscriptionId> = self
            .state
            .read()
            .topics
            .get(topic)
            .map(|subs| subs.keys().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.state.read().index.contains_key(&id)
    }
}

impl<P: Send + 'static> Default for TopicRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::predicates::AcceptAll;
    use std::time::Duration;

    fn registry() -> Arc<TopicRegistry<u32>> {
        Arc::new(TopicRegistry::new())
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let registry = registry();

        let handle = registry.subscribe(Topic::NEW_POST, AcceptAll);
        assert_eq!(registry.subscription_count(), 1);
        assert_eq!(registry.subscribers_on(&Topic::NEW_POST), vec![handle.id()]);

        assert!(registry.unsubscribe(handle.id()));
        assert_eq!(registry.subscription_count(), 0);
        assert_eq!(registry.topic_count(), 0);

        let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(
            event,
            SubscriptionEvent::Dropped {
                reason: DropReason::Unsubscribed
            }
        );
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let registry = registry();
        let a = registry.subscribe(Topic::NEW_POST, AcceptAll);
        let b = registry.subscribe(Topic::NEW_POST, AcceptAll);

        assert!(registry.unsubscribe(a.id()));
        assert!(!registry.unsubscribe(a.id()));
        assert!(!registry.unsubscribe(SubscriptionId(9999)));

        assert!(registry.contains(b.id()));
        assert_eq!(registry.subscription_count(), 1);
    }

    #[test]
    fn test_drop_handle_unsubscribes() {
        let registry = registry();
        let handle = registry.subscribe(Topic::NEW_REPLY, AcceptAll);
        let id = handle.id();

        drop(handle);
        assert!(!registry.contains(id));
        assert_eq!(registry.topic_count(), 0);
    }

    #[test]
    fn test_empty_topics_pruned() {
        let registry = registry();
        let a = registry.subscribe(Topic::NEW_POST, AcceptAll);
        let b = registry.subscribe(Topic::NEW_REPLY, AcceptAll);
        assert_eq!(registry.topic_count(), 2);

        a.unsubscribe();
        assert_eq!(registry.topic_count(), 1);
        b.unsubscribe();
        assert_eq!(registry.topic_count(), 0);
    }

    #[test]
    fn test_handle_outlives_registry() {
        let registry = registry();
        let handle = registry.subscribe(Topic::NEW_POST, AcceptAll);
        drop(registry);

        // The channel is closed and dropping the handle is a no-op.
        assert!(handle.recv_timeout(Duration::from_millis(10)).is_err());
        drop(handle);
    }

    #[test]
    fn test_close_all() {
        let registry = registry();
        let a = registry.subscribe(Topic::NEW_POST, AcceptAll);
        let b = registry.subscribe(Topic::NEW_REPLY, AcceptAll);

        registry.close_all();
        assert_eq!(registry.subscription_count(), 0);
        for handle in [&a, &b] {
            let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
            assert_eq!(
                event,
                SubscriptionEvent::Dropped {
                    reason: DropReason::Closed
                }
            );
        }
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = registry();
        let handle = registry.subscribe(Topic::NEW_POST, AcceptAll);

        let snapshot = registry.snapshot(&Topic::NEW_POST);
        registry.unsubscribe(handle.id());

        // Delivering to a removed subscription neither panics nor blocks.
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].try_deliver(1), Delivery::Closed);
    }

    #[test]
    fn test_concurrent_overflow_keeps_drop_notice() {
        use std::sync::Barrier;
        use std::thread;

        for _ in 0..50 {
            let registry = registry();
            let handle = registry.subscribe_with(
                Topic::NEW_POST,
                AcceptAll,
                SubscriptionConfig { buffer_size: 2 },
            );
            let sub = Arc::clone(&registry.snapshot(&Topic::NEW_POST)[0]);
            let barrier = Arc::new(Barrier::new(4));

            let senders: Vec<_> = (0..4u32)
                .map(|n| {
                    let sub = Arc::clone(&sub);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        sub.try_deliver(n)
                    })
                })
                .collect();
            let outcomes: Vec<Delivery> = senders.into_iter().map(|t| t.join().unwrap()).collect();

            // Never more items than the buffer, whatever the interleaving.
            assert_eq!(outcomes.iter().filter(|d| **d == Delivery::Sent).count(), 2);
            assert!(registry.remove(handle.id(), DropReason::BufferOverflow));
            assert_eq!(sub.try_deliver(9), Delivery::Closed);

            let events: Vec<_> = std::iter::from_fn(|| handle.try_recv().ok()).collect();
            assert_eq!(events.len(), 3);
            assert_eq!(
                events.last(),
                Some(&SubscriptionEvent::Dropped {
                    reason: DropReason::BufferOverflow
                })
            );
        }
    }
}
