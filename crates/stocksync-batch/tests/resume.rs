//! Interrupted runs resumed from an on-disk checkpoint.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use stocksync_batch::{
    load_cursor, run_batch, save_cursor, BatchSettings, CheckpointStore, CursorProgress,
    FileCheckpointStore, ItemOutcome, Page, PageOptions, PageWalker, ProgressTracker, Retriable,
    RetryPolicy,
};

#[derive(Debug)]
struct Rejected;

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("rejected")
    }
}

impl Retriable for Rejected {
    fn is_retriable(&self) -> bool {
        false
    }
}

fn no_pauses() -> BatchSettings {
    BatchSettings {
        item_delay: Duration::ZERO,
        batch_size: 2,
        batch_pause: Duration::ZERO,
        failure_pause: Duration::ZERO,
        concurrency: 1,
        retry: RetryPolicy::none(),
    }
}

#[tokio::test]
async fn rerun_only_touches_items_that_did_not_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCheckpointStore::new(dir.path());
    let skus: Vec<String> = ["158616P", "Y328465", "AS-S"].iter().map(|s| (*s).to_owned()).collect();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let tracker = ProgressTracker::open(&store, "inventory-set-test", false).unwrap();
    let log = Arc::clone(&seen);
    let first = run_batch(&skus, &no_pauses(), Some(tracker), String::clone, move |sku: &String| {
        let sku = sku.clone();
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(sku.clone());
            if sku == "Y328465" {
                Err(Rejected)
            } else {
                Ok(ItemOutcome::Updated)
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(first.updated, 2);
    assert_eq!(first.errored, 1);
    assert!(!first.checkpoint_cleared);
    assert!(store.load("inventory-set-test").unwrap().is_some());

    seen.lock().unwrap().clear();
    let tracker = ProgressTracker::open(&store, "inventory-set-test", false).unwrap();
    let log = Arc::clone(&seen);
    let second = run_batch(&skus, &no_pauses(), Some(tracker), String::clone, move |sku: &String| {
        let sku = sku.clone();
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(sku);
            Ok::<_, Rejected>(ItemOutcome::Updated)
        }
    })
    .await
    .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["Y328465".to_owned()]);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.updated, 1);
    assert!(second.checkpoint_cleared);
    assert!(store.load("inventory-set-test").unwrap().is_none());
}

#[tokio::test]
async fn cursor_walk_resumes_after_last_saved_page() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCheckpointStore::new(dir.path());
    let options = PageOptions {
        max_pages: None,
        page_delay: Duration::ZERO,
        retry: RetryPolicy::none(),
    };
    let fetch = |cursor: Option<String>| async move {
        let page = match cursor.as_deref() {
            None => Page::new(vec![1, 2], Some("c1".to_owned())),
            Some("c1") => Page::new(vec![3, 4], Some("c2".to_owned())),
            Some("c2") => Page::last(vec![5]),
            Some(other) => panic!("unexpected cursor {other}"),
        };
        Ok::<_, Rejected>(page)
    };

    // First process handles one page and stops.
    let mut progress = load_cursor(&store, "tag-low-stock-test", false).unwrap();
    let mut walker = PageWalker::resume_from(progress.cursor.clone(), options);
    let page = walker.next_page(fetch).await.unwrap().unwrap();
    progress.total_fetched += page.items.len();
    progress.cursor = walker.cursor().map(str::to_owned);
    save_cursor(&store, "tag-low-stock-test", &progress).unwrap();

    let resumed = load_cursor(&store, "tag-low-stock-test", false).unwrap();
    assert_eq!(
        resumed,
        CursorProgress {
            cursor: Some("c1".to_owned()),
            total_fetched: 2,
            had_failures: false,
        }
    );

    let mut walker = PageWalker::resume_from(resumed.cursor, options);
    let mut rest = Vec::new();
    while let Some(page) = walker.next_page(fetch).await.unwrap() {
        rest.extend(page.items);
    }
    assert_eq!(rest, vec![3, 4, 5]);
    assert!(walker.is_done());

    let fresh = load_cursor(&store, "tag-low-stock-test", true).unwrap();
    assert_eq!(fresh, CursorProgress::default());
}
