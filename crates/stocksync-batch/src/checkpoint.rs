//! Resumable progress for long-running jobs.
//!
//! A [`Checkpoint`] is either a page cursor (for jobs that walk a catalog) or
//! a per-identifier success map (for jobs driven by an input list). It lives
//! in a [`CheckpointStore`] under a run id, is overwritten after every batch,
//! and is deleted once a run completes without failures.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Checkpoint {
    Cursor {
        last_page_info: Option<String>,
        total_fetched: usize,
        /// Some item on an already processed page failed.
        #[serde(default)]
        had_failures: bool,
        last_update_time: DateTime<Utc>,
    },
    Items {
        results: BTreeMap<String, bool>,
        last_update_time: DateTime<Utc>,
    },
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("invalid run id {0:?}: use letters, digits, '-', '_' or '.'")]
    InvalidRunId(String),

    #[error("checkpoint I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint {} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize checkpoint for run {run_id}: {source}")]
    Serialize {
        run_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Persistence for checkpoints, keyed by run id.
pub trait CheckpointStore: Send + Sync {
    /// Returns `Ok(None)` when no checkpoint exists for `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the stored checkpoint cannot be read.
    fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Replaces any previous checkpoint for `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the checkpoint cannot be written.
    fn save(&self, run_id: &str, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Removing a missing checkpoint is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if an existing checkpoint cannot be removed.
    fn delete(&self, run_id: &str) -> Result<(), CheckpointError>;
}

/// One JSON file per run at `<dir>/<run_id>.json`.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// # Errors
    ///
    /// Returns [`CheckpointError::InvalidRunId`] for ids that could escape
    /// the checkpoint directory.
    pub fn path_for(&self, run_id: &str) -> Result<PathBuf, CheckpointError> {
        validate_run_id(run_id)?;
        Ok(self.dir.join(format!("{run_id}.json")))
    }
}

fn validate_run_id(run_id: &str) -> Result<(), CheckpointError> {
    let ok = !run_id.is_empty()
        && !run_id.starts_with('.')
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(CheckpointError::InvalidRunId(run_id.to_owned()))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = self.path_for(run_id)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CheckpointError::Io { path, source }),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| CheckpointError::Corrupt { path, source })
    }

    fn save(&self, run_id: &str, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let path = self.path_for(run_id)?;
        let body = serde_json::to_vec_pretty(checkpoint).map_err(|source| CheckpointError::Serialize {
            run_id: run_id.to_owned(),
            source,
        })?;

        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| CheckpointError::Io { path, source }
        };

        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;
        // Readers only ever see a complete file.
        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).map_err(io_err(&temp_path))?;
        file.write_all(&body).map_err(io_err(&temp_path))?;
        file.sync_all().map_err(io_err(&temp_path))?;
        fs::rename(&temp_path, &path).map_err(io_err(&path))?;
        Ok(())
    }

    fn delete(&self, run_id: &str) -> Result<(), CheckpointError> {
        let path = self.path_for(run_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CheckpointError::Io { path, source }),
        }
    }
}

/// Process-local store, used by dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    inner: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(run_id).cloned())
    }

    fn save(&self, run_id: &str, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.insert(run_id.to_owned(), checkpoint.clone());
        Ok(())
    }

    fn delete(&self, run_id: &str) -> Result<(), CheckpointError> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.remove(run_id);
        Ok(())
    }
}

/// Per-identifier progress for list-driven jobs.
pub struct ProgressTracker<'s> {
    store: &'s dyn CheckpointStore,
    run_id: String,
    results: BTreeMap<String, bool>,
    dirty: bool,
}

impl std::fmt::Debug for ProgressTracker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("run_id", &self.run_id)
            .field("results", &self.results)
            .finish_non_exhaustive()
    }
}

impl<'s> ProgressTracker<'s> {
    /// Loads the checkpoint for `run_id`, or starts empty.
    ///
    /// With `fresh` any existing checkpoint is discarded first. A cursor
    /// checkpoint under the same run id is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the store cannot be read or cleared.
    pub fn open(
        store: &'s dyn CheckpointStore,
        run_id: impl Into<String>,
        fresh: bool,
    ) -> Result<Self, CheckpointError> {
        let run_id = run_id.into();
        if fresh {
            store.delete(&run_id)?;
        }
        let results = match store.load(&run_id)? {
            Some(Checkpoint::Items { results, last_update_time }) => {
                let done = results.values().filter(|ok| **ok).count();
                tracing::info!(
                    run_id = %run_id,
                    done,
                    recorded = results.len(),
                    saved_at = %last_update_time,
                    "resuming from checkpoint"
                );
                results
            }
            Some(Checkpoint::Cursor { .. }) => {
                tracing::warn!(run_id = %run_id, "ignoring cursor checkpoint for item-driven run");
                BTreeMap::new()
            }
            None => BTreeMap::new(),
        };
        Ok(Self {
            store,
            run_id,
            results,
            dirty: false,
        })
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// `true` only for identifiers that previously succeeded.
    #[must_use]
    pub fn is_done(&self, id: &str) -> bool {
        self.results.get(id).copied().unwrap_or(false)
    }

    pub fn record(&mut self, id: &str, success: bool) {
        self.results.insert(id.to_owned(), success);
        self.dirty = true;
    }

    #[must_use]
    pub fn results(&self) -> &BTreeMap<String, bool> {
        &self.results
    }

    /// Persists pending changes; a no-op when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the store write fails.
    pub fn flush(&mut self) -> Result<(), CheckpointError> {
        if !self.dirty {
            return Ok(());
        }
        self.store.save(
            &self.run_id,
            &Checkpoint::Items {
                results: self.results.clone(),
                last_update_time: Utc::now(),
            },
        )?;
        self.dirty = false;
        Ok(())
    }

    /// Deletes the checkpoint when every recorded identifier succeeded,
    /// otherwise saves it. Returns `true` when the checkpoint was cleared.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the store write or delete fails.
    pub fn finish(mut self) -> Result<bool, CheckpointError> {
        if self.results.values().all(|ok| *ok) {
            self.store.delete(&self.run_id)?;
            tracing::info!(run_id = %self.run_id, "run complete, checkpoint cleared");
            Ok(true)
        } else {
            self.dirty = true;
            self.flush()?;
            let failed = self.results.values().filter(|ok| !**ok).count();
            tracing::info!(run_id = %self.run_id, failed, "checkpoint kept for re-run");
            Ok(false)
        }
    }
}

/// Saved position of a cursor-driven job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorProgress {
    pub cursor: Option<String>,
    pub total_fetched: usize,
    /// Sticky across resumes; cleared only when the walk restarts.
    pub had_failures: bool,
}

/// Loads a cursor checkpoint, discarding it first when `fresh`.
///
/// # Errors
///
/// Returns [`CheckpointError`] if the store cannot be read or cleared.
pub fn load_cursor(
    store: &dyn CheckpointStore,
    run_id: &str,
    fresh: bool,
) -> Result<CursorProgress, CheckpointError> {
    if fresh {
        store.delete(run_id)?;
    }
    match store.load(run_id)? {
        Some(Checkpoint::Cursor {
            last_page_info,
            total_fetched,
            had_failures,
            last_update_time,
        }) => {
            tracing::info!(
                run_id,
                total_fetched,
                had_failures,
                saved_at = %last_update_time,
                "resuming from cursor checkpoint"
            );
            Ok(CursorProgress {
                cursor: last_page_info,
                total_fetched,
                had_failures,
            })
        }
        Some(Checkpoint::Items { .. }) => {
            tracing::warn!(run_id, "ignoring item checkpoint for cursor-driven run");
            Ok(CursorProgress::default())
        }
        None => Ok(CursorProgress::default()),
    }
}

/// Overwrites the cursor checkpoint for `run_id`.
///
/// # Errors
///
/// Returns [`CheckpointError`] if the store write fails.
pub fn save_cursor(
    store: &dyn CheckpointStore,
    run_id: &str,
    progress: &CursorProgress,
) -> Result<(), CheckpointError> {
    store.save(
        run_id,
        &Checkpoint::Cursor {
            last_page_info: progress.cursor.clone(),
            total_fetched: progress.total_fetched,
            had_failures: progress.had_failures,
            last_update_time: Utc::now(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(pairs: &[(&str, bool)]) -> Checkpoint {
        Checkpoint::Items {
            results: pairs.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect(),
            last_update_time: Utc::now(),
        }
    }

    #[test]
    fn file_store_round_trips_and_deletes() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("nested"));
        assert!(store.load("run-1").unwrap().is_none());

        let cp = items(&[("A", true), ("B", false)]);
        store.save("run-1", &cp).unwrap();
        assert_eq!(store.load("run-1").unwrap(), Some(cp));
        assert!(dir.path().join("nested/run-1.json").exists());
        assert!(!dir.path().join("nested/run-1.json.tmp").exists());

        store.delete("run-1").unwrap();
        assert!(store.load("run-1").unwrap().is_none());
        store.delete("run-1").unwrap();
    }

    #[test]
    fn file_store_overwrites_previous_checkpoint() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        store.save("r", &items(&[("A", false)])).unwrap();
        store.save("r", &items(&[("A", true)])).unwrap();
        match store.load("r").unwrap() {
            Some(Checkpoint::Items { results, .. }) => assert_eq!(results.get("A"), Some(&true)),
            other => panic!("unexpected checkpoint: {other:?}"),
        }
    }

    #[test]
    fn file_store_reports_corrupt_json() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let store = FileCheckpointStore::new(dir.path());
        assert!(matches!(store.load("bad"), Err(CheckpointError::Corrupt { .. })));
    }

    #[test]
    fn run_ids_cannot_escape_the_directory() {
        let store = FileCheckpointStore::new("/tmp/stocksync");
        for bad in ["", "../etc/passwd", "a/b", ".hidden"] {
            assert!(
                matches!(store.path_for(bad), Err(CheckpointError::InvalidRunId(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(store.path_for("inventory-set-3f2a9c01b7de").is_ok());
    }

    #[test]
    fn checkpoint_json_is_tagged_by_kind() {
        let cp = Checkpoint::Cursor {
            last_page_info: Some("eyJsYXN0X2lkIjo2fQ".to_owned()),
            total_fetched: 250,
            had_failures: false,
            last_update_time: Utc::now(),
        };
        let value = serde_json::to_value(&cp).unwrap();
        assert_eq!(value["kind"], "cursor");
        assert_eq!(value["last_page_info"], "eyJsYXN0X2lkIjo2fQ");
        assert_eq!(value["total_fetched"], 250);
    }

    #[test]
    fn tracker_skips_only_successful_ids() {
        let store = MemoryCheckpointStore::new();
        store.save("run", &items(&[("A", true), ("B", false)])).unwrap();
        let tracker = ProgressTracker::open(&store, "run", false).unwrap();
        assert!(tracker.is_done("A"));
        assert!(!tracker.is_done("B"));
        assert!(!tracker.is_done("C"));
    }

    #[test]
    fn fresh_tracker_discards_existing_checkpoint() {
        let store = MemoryCheckpointStore::new();
        store.save("run", &items(&[("A", true)])).unwrap();
        let tracker = ProgressTracker::open(&store, "run", true).unwrap();
        assert!(!tracker.is_done("A"));
        assert!(store.load("run").unwrap().is_none());
    }

    #[test]
    fn finish_clears_checkpoint_only_when_everything_succeeded() {
        let store = MemoryCheckpointStore::new();
        let mut tracker = ProgressTracker::open(&store, "ok", false).unwrap();
        tracker.record("A", true);
        tracker.flush().unwrap();
        assert!(store.load("ok").unwrap().is_some());
        assert!(tracker.finish().unwrap());
        assert!(store.load("ok").unwrap().is_none());

        let mut tracker = ProgressTracker::open(&store, "partial", false).unwrap();
        tracker.record("A", true);
        tracker.record("B", false);
        assert!(!tracker.finish().unwrap());
        match store.load("partial").unwrap() {
            Some(Checkpoint::Items { results, .. }) => {
                assert_eq!(results.get("A"), Some(&true));
                assert_eq!(results.get("B"), Some(&false));
            }
            other => panic!("expected kept item checkpoint, got {other:?}"),
        }
    }

    #[test]
    fn cursor_progress_round_trips() {
        let store = MemoryCheckpointStore::new();
        assert_eq!(load_cursor(&store, "tag", false).unwrap(), CursorProgress::default());
        let progress = CursorProgress {
            cursor: Some("abc".to_owned()),
            total_fetched: 100,
            had_failures: true,
        };
        save_cursor(&store, "tag", &progress).unwrap();
        assert_eq!(load_cursor(&store, "tag", false).unwrap(), progress);
        assert_eq!(load_cursor(&store, "tag", true).unwrap(), CursorProgress::default());
    }

    #[test]
    fn cursor_checkpoint_without_failure_flag_loads_as_clean() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("tag.json"),
            r#"{"kind":"cursor","last_page_info":"c1","total_fetched":5,"last_update_time":"2024-05-01T12:00:00Z"}"#,
        )
        .unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let progress = load_cursor(&store, "tag", false).unwrap();
        assert_eq!(progress.cursor.as_deref(), Some("c1"));
        assert!(!progress.had_failures);
    }
}
