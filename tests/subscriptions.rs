//! Fan-out behaviour under real threads.

use feedline::{
    AcceptAll, DropReason, FeedError, NewPostFilter, Post, Publisher, ReplyFilter, Result, RowId,
    SubscriptionConfig, SubscriptionEvent, Timestamp, Topic, TopicRegistry,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn setup() -> (Arc<TopicRegistry<Post>>, Publisher<Post>) {
    let registry = Arc::new(TopicRegistry::new());
    let publisher = Publisher::new(Arc::clone(&registry));
    (registry, publisher)
}

/// Show warnings (predicate failures, dropped subscribers) in test output.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

fn post(id: u64, user: u64, reply_to: Option<u64>) -> Post {
    Post {
        id: RowId(id),
        user_id: RowId(user),
        body: format!("post {}", id),
        reply_to: reply_to.map(RowId),
        created_at: Timestamp(0),
    }
}

#[test]
fn test_reply_reaches_only_its_thread() {
    let (registry, publisher) = setup();
    let seven = registry.subscribe(Topic::NEW_REPLY, ReplyFilter { to_post: RowId(7) });
    let eight = registry.subscribe(Topic::NEW_REPLY, ReplyFilter { to_post: RowId(8) });

    let report = publisher.publish(&Topic::NEW_REPLY, &post(20, 1, Some(7)));
    assert_eq!(report.delivered, 1);
    assert_eq!(report.rejected, 1);

    assert_eq!(
        seven.next_payload(Duration::from_millis(100)).map(|p| p.id),
        Some(RowId(20))
    );
    assert!(eight.try_recv().is_err());
}

#[test]
fn test_new_post_filter_by_author() {
    let (registry, publisher) = setup();
    let everyone = registry.subscribe(Topic::NEW_POST, NewPostFilter::default());
    let only_two = registry.subscribe(
        Topic::NEW_POST,
        NewPostFilter {
            from_user: Some(RowId(2)),
        },
    );

    for (id, user) in [(1, 1), (2, 2), (3, 1), (4, 2)] {
        publisher.publish(&Topic::NEW_POST, &post(id, user, None));
    }

    assert_eq!(everyone.pending(), 4);
    let got: Vec<u64> = std::iter::from_fn(|| only_two.next_payload(Duration::from_millis(10)))
        .map(|p| p.id.0)
        .collect();
    assert_eq!(got, vec![2, 4]);
}

#[test]
fn test_erroring_predicate_does_not_starve_others() {
    init_tracing();
    let (registry, publisher) = setup();
    let _broken = registry.subscribe(Topic::NEW_POST, |_: &Post| -> Result<bool> {
        Err(FeedError::PredicateError("lookup failed".into()))
    });
    let _panicky = registry.subscribe(Topic::NEW_POST, |p: &Post| -> Result<bool> {
        if p.id.0 % 2 == 0 {
            panic!("even ids upset this predicate");
        }
        Ok(true)
    });
    let healthy = registry.subscribe(Topic::NEW_POST, AcceptAll);

    for id in 1..=4 {
        let report = publisher.publish(&Topic::NEW_POST, &post(id, 1, None));
        assert!(report.delivered >= 1);
    }

    assert_eq!(healthy.pending(), 4);
    assert_eq!(registry.subscription_count(), 3);
}

#[test]
fn test_undrained_subscriber_does_not_block_others() {
    init_tracing();
    let (registry, publisher) = setup();
    let stuck = registry.subscribe_with(
        Topic::NEW_POST,
        AcceptAll,
        SubscriptionConfig { buffer_size: 4 },
    );
    let live = registry.subscribe(Topic::NEW_POST, AcceptAll);

    let consumer = thread::spawn(move || {
        let mut received = Vec::new();
        while received.len() < 100 {
            match live.next_payload(Duration::from_secs(5)) {
                Some(post) => received.push(post.id.0),
                None => break,
            }
        }
        received
    });

    let started = Instant::now();
    for id in 1..=100 {
        publisher.publish(&Topic::NEW_POST, &post(id, 1, None));
    }
    assert!(started.elapsed() < Duration::from_secs(5));

    let received = consumer.join().unwrap();
    assert_eq!(received, (1..=100).collect::<Vec<_>>());

    // The stuck subscriber was cut loose and told why.
    let events: Vec<_> = std::iter::from_fn(|| stuck.try_recv().ok()).collect();
    assert_eq!(events.len(), 5);
    assert_eq!(
        events.last(),
        Some(&SubscriptionEvent::Dropped {
            reason: DropReason::BufferOverflow
        })
    );
    assert!(!registry.contains(stuck.id()));
}

#[test]
fn test_subscribe_and_unsubscribe_while_publishing() {
    let (registry, publisher) = setup();
    let stop = Arc::new(AtomicBool::new(false));

    let publishing = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut published = 0u64;
            loop {
                published += 1;
                publisher.publish(&Topic::NEW_POST, &post(published, 1, None));
                if stop.load(Ordering::Relaxed) {
                    break published;
                }
            }
        })
    };

    let churners: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..200 {
                    let handle = registry.subscribe(Topic::NEW_POST, AcceptAll);
                    let _ = handle.try_recv();
                    if handle.id().0 % 2 == 0 {
                        registry.unsubscribe(handle.id());
                        registry.unsubscribe(handle.id());
                    }
                }
            })
        })
        .collect();

    for churner in churners {
        churner.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    assert!(publishing.join().unwrap() > 0);

    // Every handle was dropped, so nothing is left behind.
    assert_eq!(registry.subscription_count(), 0);
    assert_eq!(registry.topic_count(), 0);
}

#[test]
fn test_order_preserved_per_subscriber() {
    let (registry, publisher) = setup();
    let handle = registry.subscribe(Topic::NEW_POST, AcceptAll);

    let producer = thread::spawn(move || {
        for id in 1..=500 {
            publisher.publish(&Topic::NEW_POST, &post(id, 1, None));
        }
    });
    producer.join().unwrap();

    let ids: Vec<u64> = std::iter::from_fn(|| handle.try_recv().ok())
        .filter_map(|event| match event {
            SubscriptionEvent::Item { payload } => Some(payload.id.0),
            SubscriptionEvent::Dropped { .. } => None,
        })
        .collect();
    assert_eq!(ids, (1..=500).collect::<Vec<_>>());
}

#[test]
fn test_dropping_handle_on_disconnect() {
    let (registry, publisher) = setup();
    let handle = registry.subscribe(Topic::NEW_REPLY, ReplyFilter { to_post: RowId(1) });

    // The transport goes away on another thread.
    thread::spawn(move || drop(handle)).join().unwrap();

    let report = publisher.publish(&Topic::NEW_REPLY, &post(2, 1, Some(1)));
    assert_eq!(report.candidates, 0);
    assert_eq!(registry.topic_count(), 0);
}
