use crate::types::{Paper, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod arxiv;
pub mod openreview;

pub use arxiv::ArxivSource;
pub use openreview::OpenReviewSource;

/// A remote paper catalog that can be queried over a bounded time window.
///
/// Implementations issue whatever paging the remote API needs internally;
/// callers see one window, one result list. The windowed fetcher layers
/// sub-window partitioning, retries and cross-window dedup on top of this.
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Human-readable name used in logs and status reporting.
    fn source_name(&self) -> &str;

    /// Fetch every paper in `categories` whose submission date falls within
    /// `[start, end)`, up to `limit` records.
    async fn fetch_window(
        &self,
        categories: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Paper>>;
}
