//! Cursor-driven pagination over any page-fetch function.
//!
//! A fetch function receives the cursor for the page to load (`None` for the
//! first page) and returns a [`Page`] carrying the records and the cursor of
//! the following page. Iteration ends when a page comes back without a next
//! cursor. Every page request goes through [`retry_with_backoff`] so 429s and
//! transient transport errors are waited out instead of aborting the walk.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::retry::{retry_with_backoff, Retriable, RetryPolicy};

/// One page of results plus the cursor for the next page, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        let next_cursor = next_cursor.filter(|c| !c.is_empty());
        Self { items, next_cursor }
    }

    #[must_use]
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageOptions {
    /// Stop after this many pages even if more are available.
    pub max_pages: Option<usize>,
    /// Pause between consecutive page requests.
    pub page_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            max_pages: None,
            page_delay: Duration::from_secs(1),
            retry: RetryPolicy::fixed(10, Duration::from_secs(10)),
        }
    }
}

/// Walks pages one at a time, remembering where it is.
///
/// Used directly by jobs that checkpoint their cursor between pages;
/// [`fetch_all_pages`] drives it to exhaustion for everything else.
#[derive(Debug)]
pub struct PageWalker {
    options: PageOptions,
    cursor: Option<String>,
    pages_fetched: usize,
    exhausted: bool,
}

impl PageWalker {
    #[must_use]
    pub fn new(options: PageOptions) -> Self {
        Self::resume_from(None, options)
    }

    /// Starts from a saved cursor instead of the first page.
    #[must_use]
    pub fn resume_from(cursor: Option<String>, options: PageOptions) -> Self {
        Self {
            options,
            cursor,
            pages_fetched: 0,
            exhausted: false,
        }
    }

    /// Cursor of the next page to request. `None` before the first page or
    /// once the walk is finished.
    #[must_use]
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    #[must_use]
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.exhausted
    }

    /// Fetches the next page, or returns `Ok(None)` when there is nothing
    /// left (no next cursor, or the page cap was reached).
    ///
    /// # Errors
    ///
    /// Returns the fetch error when it is not retriable or retries run out.
    /// The walker stays at the failed cursor so the caller may try again.
    pub async fn next_page<T, E, F, Fut>(&mut self, mut fetch_page: F) -> Result<Option<Page<T>>, E>
    where
        E: Retriable + Display,
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
    {
        if self.exhausted {
            return Ok(None);
        }
        if let Some(max) = self.options.max_pages {
            if self.pages_fetched >= max {
                tracing::info!(max_pages = max, "page cap reached, stopping early");
                self.exhausted = true;
                return Ok(None);
            }
        }
        if self.pages_fetched > 0 && !self.options.page_delay.is_zero() {
            tokio::time::sleep(self.options.page_delay).await;
        }

        let requested = self.cursor.clone();
        let page = retry_with_backoff(&self.options.retry, || fetch_page(requested.clone())).await?;
        self.pages_fetched += 1;

        match page.next_cursor.as_deref() {
            Some(next) if requested.as_deref() == Some(next) => {
                tracing::warn!(cursor = next, "next cursor repeats the current one, stopping");
                self.cursor = None;
                self.exhausted = true;
            }
            Some(next) => self.cursor = Some(next.to_owned()),
            None => {
                self.cursor = None;
                self.exhausted = true;
            }
        }

        tracing::debug!(
            page = self.pages_fetched,
            records = page.items.len(),
            has_next = !self.exhausted,
            "fetched page"
        );
        Ok(Some(page))
    }
}

/// Fetches every page starting at `start` and concatenates the records in
/// page order.
///
/// # Errors
///
/// Returns the first fetch error that survives retrying; records fetched
/// before it are discarded.
pub async fn fetch_all_pages<T, E, F, Fut>(
    start: Option<String>,
    options: PageOptions,
    mut fetch_page: F,
) -> Result<Vec<T>, E>
where
    E: Retriable + Display,
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut walker = PageWalker::resume_from(start, options);
    let mut all = Vec::new();
    while let Some(page) = walker.next_page(&mut fetch_page).await? {
        all.extend(page.items);
    }
    tracing::info!(
        pages = walker.pages_fetched(),
        records = all.len(),
        "pagination complete"
    );
    Ok(all)
}
