//! Scaling tests with synthetic 50k+ row tables.
//!
//! Tests various shapes and measures performance of key operations:
//! - Table population (memory and log)
//! - Restart/replay from log
//! - Paginated walks, filtered and unfiltered
//! - Fan-out to many subscribers

use feedline::{
    fetch_connection, AcceptAll, DataSource, Filter, LogTable, MemoryTable, NewPostFilter,
    PaginationArgs, Post, Publisher, ReplyFilter, RowId, Timestamp, Topic, TopicRegistry,
    WriteSource,
};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;

const ROW_COUNT: usize = 50_000;

/// Timing helper
struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    fn report(&self) {
        println!("  {} took {:.2}ms", self.name, self.elapsed_ms());
    }

    fn report_with_count(&self, count: usize) {
        let ms = self.elapsed_ms();
        let per_item = if count > 0 { ms / count as f64 } else { 0.0 };
        println!(
            "  {} took {:.2}ms ({} items, {:.4}ms/item, {:.0} items/sec)",
            self.name,
            ms,
            count,
            per_item,
            if ms > 0.0 { count as f64 / (ms / 1000.0) } else { 0.0 }
        );
    }
}

fn populate<S: WriteSource<Post>>(table: &S, count: usize) {
    for i in 0..count {
        // Every tenth post is a reply to post 1.
        let reply_to = if i > 0 && i % 10 == 0 { Some(RowId(1)) } else { None };
        table
            .insert_with(|id| Post {
                id,
                user_id: RowId((i % 100) as u64),
                body: format!("Post body for item {}", i),
                reply_to,
                created_at: Timestamp(1_700_000_000 + i as i64),
            })
            .unwrap();
    }
}

fn walk<S: DataSource<Post>>(source: &S, filter: &Filter, page_size: i32) -> usize {
    let mut seen = 0;
    let mut last = None;
    let mut args = PaginationArgs::first(page_size);
    loop {
        let page = fetch_connection(source, filter, &args).unwrap();
        for post in page.nodes() {
            assert!(last.map_or(true, |prev| post.id > prev));
            last = Some(post.id);
        }
        seen += page.len();
        if !page.page_info.has_next_page {
            break;
        }
        args.after = page.page_info.end_cursor.map(String::from);
    }
    seen
}

// =============================================================================
// Test: 50k rows in memory
// =============================================================================

#[test]
fn test_scaling_50k_memory_walk() {
    println!("\n=== 50k Rows, Memory Table ===");

    let table = MemoryTable::new();
    let timer = Timer::new("Insert 50k posts");
    populate(&table, ROW_COUNT);
    timer.report_with_count(ROW_COUNT);

    let timer = Timer::new("Walk all rows, 50 per page");
    let seen = walk(&table, &Filter::all(), 50);
    timer.report_with_count(seen);
    assert_eq!(seen, ROW_COUNT);

    let timer = Timer::new("Walk replies to post 1");
    let replies = walk(&table, &Filter::all().eq("reply_to", RowId(1)), 50);
    timer.report_with_count(replies);
    assert_eq!(replies, (ROW_COUNT - 1) / 10);

    let timer = Timer::new("Walk one author");
    let by_author = walk(&table, &Filter::all().eq("user_id", RowId(42)), 25);
    timer.report_with_count(by_author);
    assert_eq!(by_author, ROW_COUNT / 100);

    println!("  ✓ Memory walk test passed");
}

// =============================================================================
// Test: 50k rows in a log table, with replay
// =============================================================================

#[test]
fn test_scaling_50k_log_replay() {
    println!("\n=== 50k Rows, Log Table ===");

    let dir = TempDir::new().unwrap();

    {
        let table: LogTable<Post> = LogTable::open(dir.path()).unwrap();
        let timer = Timer::new("Append 50k posts");
        populate(&table, ROW_COUNT);
        timer.report_with_count(ROW_COUNT);

        let timer = Timer::new("Delete every 1000th post");
        for id in (1000..=ROW_COUNT as u64).step_by(1000) {
            assert!(table.delete(RowId(id)).unwrap());
        }
        timer.report();

        let timer = Timer::new("Sync to disk");
        table.sync().unwrap();
        timer.report();
        println!("  Log size: {} bytes", table.log_size());
    }

    let timer = Timer::new("Reopen table (replay log)");
    let table: LogTable<Post> = LogTable::open(dir.path()).unwrap();
    timer.report();
    assert_eq!(table.len(), ROW_COUNT - ROW_COUNT / 1000);

    let timer = Timer::new("Walk all rows after replay");
    let seen = walk(&table, &Filter::all(), 50);
    timer.report_with_count(seen);
    assert_eq!(seen, ROW_COUNT - ROW_COUNT / 1000);

    let timer = Timer::new("Random access 1000 rows");
    for i in (0..ROW_COUNT).step_by(50) {
        let id = RowId(i as u64 + 1);
        let row = table.get(id).unwrap();
        assert_eq!(row.is_some(), id.0 % 1000 != 0);
    }
    timer.report_with_count(1000);

    println!("  ✓ Log replay test passed");
}

// =============================================================================
// Test: fan-out to many subscribers
// =============================================================================

#[test]
fn test_scaling_fan_out() {
    println!("\n=== Fan-out to 2k Subscribers ===");

    let registry = Arc::new(TopicRegistry::new());
    let publisher = Publisher::new(Arc::clone(&registry));

    let timer = Timer::new("Subscribe 2k listeners");
    let mut handles = Vec::new();
    for i in 0..1000u64 {
        handles.push(registry.subscribe(
            Topic::NEW_POST,
            NewPostFilter {
                from_user: Some(RowId(i % 10)),
            },
        ));
        handles.push(registry.subscribe(Topic::NEW_REPLY, ReplyFilter { to_post: RowId(i) }));
    }
    let everyone = registry.subscribe(Topic::NEW_POST, AcceptAll);
    timer.report_with_count(handles.len() + 1);
    assert_eq!(registry.topic_count(), 2);

    let timer = Timer::new("Publish 500 posts");
    let mut delivered = 0;
    for i in 0..500u64 {
        let post = Post {
            id: RowId(i + 1),
            user_id: RowId(i % 10),
            body: format!("post {}", i),
            reply_to: None,
            created_at: Timestamp(0),
        };
        delivered += publisher.publish(&Topic::NEW_POST, &post).delivered;
    }
    timer.report_with_count(delivered);

    // Each post reaches the 100 listeners for its author plus the catch-all.
    assert_eq!(delivered, 500 * 101);
    assert_eq!(everyone.pending(), 500);

    let timer = Timer::new("Publish 500 replies");
    let mut delivered = 0;
    for i in 0..500u64 {
        let reply = Post {
            id: RowId(1000 + i),
            user_id: RowId(1),
            body: format!("reply {}", i),
            reply_to: Some(RowId(i)),
            created_at: Timestamp(0),
        };
        delivered += publisher.publish(&Topic::NEW_REPLY, &reply).delivered;
    }
    timer.report_with_count(delivered);
    assert_eq!(delivered, 500);

    let timer = Timer::new("Drop all handles");
    drop(handles);
    drop(everyone);
    timer.report();
    assert_eq!(registry.subscription_count(), 0);

    println!("  ✓ Fan-out test passed");
}
