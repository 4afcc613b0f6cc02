//! Fan-out of published payloads to matching subscribers.

use super::registry::{Delivery, TopicRegistry};
use super::types::{DropReason, SubscriptionId, Topic};
use crate::error::FeedError;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// What happened to one published payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscriptions on the topic when the snapshot was taken.
    pub candidates: usize,
    /// Predicates that accepted the payload.
    pub matched: usize,
    /// Payloads placed in a subscriber buffer.
    pub delivered: usize,
    /// Predicates that declined the payload.
    pub rejected: usize,
    /// Predicates that failed or panicked.
    pub predicate_errors: usize,
    /// Subscribers removed for overflowing or disconnecting.
    pub dropped: usize,
}

/// Publishes payloads to the subscribers of a [`TopicRegistry`].
pub struct Publisher<P> {
    registry: Arc<TopicRegistry<P>>,
}

impl<P> Clone for Publisher<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<P: Clone + Send + 'static> Publisher<P> {
    pub fn new(registry: Arc<TopicRegistry<P>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<TopicRegistry<P>> {
        &self.registry
    }

    /// Deliver `payload` to every subscription on `topic` whose predicate
    /// accepts it.
    ///
    /// Never blocks and never fails: a full subscriber is dropped, a
    /// failing predicate is logged and skipped, and delivery to everyone else
    /// carries on.
    pub fn publish(&self, topic: &Topic, payload: &P) -> PublishReport {
        let subscriptions = self.registry.snapshot(topic);
        let mut report = PublishReport {
            candidates: subscriptions.len(),
            ..Default::default()
        };
        if subscriptions.is_empty() {
            tracing::trace!(topic = %topic, "published with no subscribers");
            return report;
        }

        let mut overflowed: Vec<SubscriptionId> = Vec::new();
        let mut disconnected: Vec<SubscriptionId> = Vec::new();

        for sub in &subscriptions {
            let verdict = catch_unwind(AssertUnwindSafe(|| sub.matches(payload)))
                .unwrap_or_else(|panic| Err(FeedError::PredicateError(panic_message(&*panic))));

            match verdict {
                Ok(true) => {
                    report.matched += 1;
                    match sub.try_deliver(payload.clone()) {
                        Delivery::Sent => report.delivered += 1,
                        Delivery::Full => overflowed.push(sub.id),
                        Delivery::Disconnected => disconnected.push(sub.id),
                        Delivery::Closed => {}
                    }
                }
                Ok(false) => report.rejected += 1,
                Err(error) => {
                    report.predicate_errors += 1;
                    tracing::warn!(
                        subscription_id = sub.id.0,
                        topic = %topic,
                        error = %error,
                        "subscription predicate failed; skipping subscriber"
                    );
                }
            }
        }

        for id in overflowed {
            tracing::warn!(subscription_id = id.0, topic = %topic, "dropping slow subscriber");
            if self.registry.remove(id, DropReason::BufferOverflow) {
                report.dropped += 1;
            }
        }
        for id in disconnected {
            if self.registry.forget(id) {
                report.dropped += 1;
            }
        }

        tracing::trace!(
            topic = %topic,
            candidates = report.candidates,
            delivered = report.delivered,
            dropped = report.dropped,
            "published"
        );

        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("predicate panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("predicate panicked: {}", message)
    } else {
        "predicate panicked".to_string()
    }
}
