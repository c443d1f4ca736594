use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use super::*;
use crate::checkpoint::{Checkpoint, CheckpointStore, MemoryCheckpointStore};

#[derive(Debug)]
enum MutationError {
    RateLimited,
    Rejected(&'static str),
}

impl Display for MutationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationError::RateLimited => write!(f, "429 Too Many Requests"),
            MutationError::Rejected(msg) => write!(f, "rejected: {msg}"),
        }
    }
}

impl Retriable for MutationError {
    fn is_retriable(&self) -> bool {
        matches!(self, MutationError::RateLimited)
    }
}

fn instant() -> BatchSettings {
    BatchSettings {
        item_delay: Duration::ZERO,
        batch_size: 2,
        batch_pause: Duration::ZERO,
        failure_pause: Duration::ZERO,
        concurrency: 1,
        retry: RetryPolicy::fixed(2, Duration::ZERO),
    }
}

fn skus(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

#[tokio::test]
async fn outcomes_add_up_to_submitted() {
    let items = skus(&["A", "B", "C", "D", "E"]);
    let report = run_batch(&items, &instant(), None, String::clone, |sku: &String| {
        let result = match sku.as_str() {
            "A" => Ok(ItemOutcome::Updated),
            "B" => Ok(ItemOutcome::Unchanged),
            "C" => Ok(ItemOutcome::NotFound),
            "D" => Err(MutationError::Rejected("quantity must be positive")),
            _ => Ok(ItemOutcome::Updated),
        };
        std::future::ready(result)
    })
    .await
    .unwrap();

    assert_eq!(report.submitted, 5);
    assert_eq!(report.updated, 2);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.not_found, 1);
    assert_eq!(report.errored, 1);
    assert_eq!(report.succeeded() + report.failed(), report.submitted);
    assert_eq!(
        report.failures,
        vec![
            ItemFailure {
                id: "C".to_owned(),
                reason: "not found".to_owned()
            },
            ItemFailure {
                id: "D".to_owned(),
                reason: "rejected: quantity must be positive".to_owned()
            },
        ]
    );
}

#[tokio::test]
async fn failing_item_does_not_stop_the_run() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let items = skus(&["A", "B", "C"]);
    let seen = Arc::clone(&calls);
    let report = run_batch(&items, &instant(), None, String::clone, move |sku: &String| {
        seen.lock().unwrap().push(sku.clone());
        let result = if sku == "B" {
            Err(MutationError::RateLimited)
        } else {
            Ok(ItemOutcome::Updated)
        };
        std::future::ready(result)
    })
    .await
    .unwrap();

    // B is tried once plus two retries before being given up on.
    assert_eq!(*calls.lock().unwrap(), skus(&["A", "B", "B", "B", "C"]));
    assert_eq!(report.updated, 2);
    assert_eq!(report.errored, 1);
}

#[tokio::test]
async fn resumes_only_unfinished_items() {
    let store = MemoryCheckpointStore::new();
    store
        .save(
            "inventory-set",
            &Checkpoint::Items {
                results: [("A".to_owned(), true), ("B".to_owned(), false)]
                    .into_iter()
                    .collect(),
                last_update_time: chrono::Utc::now(),
            },
        )
        .unwrap();

    let processed = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&processed);
    let tracker = ProgressTracker::open(&store, "inventory-set", false).unwrap();
    let items = skus(&["A", "B", "C"]);
    let report = run_batch(&items, &instant(), Some(tracker), String::clone, move |sku: &String| {
        seen.lock().unwrap().push(sku.clone());
        std::future::ready(Ok::<_, MutationError>(ItemOutcome::Updated))
    })
    .await
    .unwrap();

    assert_eq!(*processed.lock().unwrap(), skus(&["B", "C"]));
    assert_eq!(report.skipped, 1);
    assert_eq!(report.submitted, 2);
    assert!(report.checkpoint_cleared);
    assert!(store.load("inventory-set").unwrap().is_none());
}

#[tokio::test]
async fn checkpoint_is_kept_when_something_failed() {
    let store = MemoryCheckpointStore::new();
    let tracker = ProgressTracker::open(&store, "run", false).unwrap();
    let items = skus(&["A", "B", "C"]);
    let report = run_batch(&items, &instant(), Some(tracker), String::clone, |sku: &String| {
        let result = if sku == "B" {
            Ok(ItemOutcome::NotFound)
        } else {
            Ok::<_, MutationError>(ItemOutcome::Updated)
        };
        std::future::ready(result)
    })
    .await
    .unwrap();

    assert!(!report.checkpoint_cleared);
    let Some(Checkpoint::Items { results, .. }) = store.load("run").unwrap() else {
        panic!("expected an item checkpoint");
    };
    let expected: HashMap<&str, bool> = [("A", true), ("B", false), ("C", true)].into_iter().collect();
    for (sku, ok) in expected {
        assert_eq!(results.get(sku), Some(&ok), "sku {sku}");
    }
}

#[tokio::test(start_paused = true)]
async fn paces_items_batches_and_failures() {
    let settings = BatchSettings {
        item_delay: Duration::from_millis(500),
        batch_size: 2,
        batch_pause: Duration::from_secs(30),
        failure_pause: Duration::from_secs(60),
        concurrency: 1,
        retry: RetryPolicy::none(),
    };
    let items = skus(&["A", "B", "C"]);
    let started = tokio::time::Instant::now();
    run_batch(&items, &settings, None, String::clone, |sku: &String| {
        let result = if sku == "A" {
            Err(MutationError::Rejected("bad"))
        } else {
            Ok(ItemOutcome::Updated)
        };
        std::future::ready(result)
    })
    .await
    .unwrap();

    // A fails (60s), item delay before B (0.5s), batch pause before C (30s).
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_millis(90_500) && elapsed < Duration::from_millis(91_500),
        "unexpected pacing: {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_groups_run_together() {
    let settings = BatchSettings {
        item_delay: Duration::from_millis(500),
        batch_size: 10,
        concurrency: 5,
        ..instant()
    };
    let in_flight = Arc::new(AtomicU32::new(0));
    let peak = Arc::new(AtomicU32::new(0));
    let items: Vec<String> = (0..10).map(|n| format!("SKU-{n}")).collect();
    let (f, p) = (Arc::clone(&in_flight), Arc::clone(&peak));
    let report = run_batch(&items, &settings, None, String::clone, move |_sku: &String| {
        let (f, p) = (Arc::clone(&f), Arc::clone(&p));
        async move {
            let now = f.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            f.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, MutationError>(ItemOutcome::Updated)
        }
    })
    .await
    .unwrap();

    assert_eq!(report.updated, 10);
    assert_eq!(peak.load(Ordering::SeqCst), 5);
}
