//! Rate-limit-aware batch plumbing shared by every sync job: retry with
//! back-off, cursor pagination, paced mutation and resumable checkpoints.

pub mod checkpoint;
pub mod mutator;
pub mod paging;
pub mod retry;

pub use checkpoint::{
    load_cursor, save_cursor, Checkpoint, CheckpointError, CheckpointStore, CursorProgress,
    FileCheckpointStore, MemoryCheckpointStore, ProgressTracker,
};
pub use mutator::{run_batch, BatchReport, BatchSettings, ItemFailure, ItemOutcome};
pub use paging::{fetch_all_pages, Page, PageOptions, PageWalker};
pub use retry::{retry_with_backoff, Backoff, Retriable, RetryPolicy};
