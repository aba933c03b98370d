use crate::config::FetchConfig;
use crate::sources::PaperSource;
use crate::types::{FetchOutcome, Paper, PipelineError, Result};
use backoff::{backoff::Backoff, ExponentialBackoff};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bounded retry with exponential backoff around one fallible async call.
///
/// Returns the first success, or the last error once `max_attempts` is
/// exhausted.
pub async fn retry_with_backoff<T, F, Fut>(
    max_attempts: u32,
    initial_delay: Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = ExponentialBackoff {
        current_interval: initial_delay,
        initial_interval: initial_delay,
        max_interval: initial_delay * 32,
        multiplier: 2.0,
        max_elapsed_time: None,
        ..Default::default()
    };

    let mut last_error = None;
    for attempt in 1..=max_attempts.max(1) {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("Attempt {}/{} failed: {}", attempt, max_attempts, e);
                last_error = Some(e);
                if attempt < max_attempts {
                    if let Some(delay) = backoff.next_backoff() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| PipelineError::General("retry invoked with zero attempts".to_string())))
}

/// A half-open time slice of the overall fetch range, sized to stay under
/// the remote API's per-request result cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Partition `[now - max_days_old, now)` into sub-windows, most recent
/// first. Window length is chosen so that the expected result volume of one
/// sub-request stays under the per-request cap; a range that fits in a
/// single request yields exactly one window.
pub fn plan_windows(
    now: DateTime<Utc>,
    max_days_old: u32,
    category_count: usize,
    config: &FetchConfig,
) -> Vec<SubWindow> {
    let per_day = config.papers_per_day_per_category * category_count.max(1);
    let window_days = (config.max_results_per_request / per_day.max(1)).max(1) as i64;

    let range_start = now - ChronoDuration::days(max_days_old as i64);
    let mut windows = Vec::new();
    let mut end = now;
    while end > range_start {
        let start = (end - ChronoDuration::days(window_days)).max(range_start);
        windows.push(SubWindow { start, end });
        end = start;
    }
    windows
}

/// Wraps a [`PaperSource`] with sub-window batching, bounded retries and
/// cross-window dedup.
pub struct WindowedFetcher<S: PaperSource> {
    source: S,
    config: FetchConfig,
}

impl<S: PaperSource> WindowedFetcher<S> {
    pub fn new(source: S, config: FetchConfig) -> Self {
        Self { source, config }
    }

    /// Fetch the full `max_days_old` range for `categories`.
    ///
    /// Sub-windows are requested sequentially from most recent to oldest.
    /// A sub-window that keeps failing after retries is skipped and counted,
    /// leaving a logged gap; only when every sub-window is lost does the
    /// fetch as a whole fail.
    pub async fn fetch(&self, categories: &[String], max_days_old: u32) -> Result<FetchOutcome> {
        let now = Utc::now();
        let windows = plan_windows(now, max_days_old, categories.len(), &self.config);
        let total_windows = windows.len();
        info!(
            source = self.source.source_name(),
            total_windows, max_days_old, "Planned windowed fetch"
        );

        let mut seen: HashSet<String> = HashSet::new();
        let mut papers: Vec<Paper> = Vec::new();
        let mut skipped_windows = 0usize;

        for (index, window) in windows.iter().enumerate() {
            let result = retry_with_backoff(
                self.config.max_retries,
                Duration::from_secs(self.config.retry_delay_seconds),
                || {
                    self.source.fetch_window(
                        categories,
                        window.start,
                        window.end,
                        self.config.max_results_per_request,
                    )
                },
            )
            .await;

            match result {
                Ok(batch) => {
                    let mut new_in_window = 0usize;
                    for paper in batch {
                        // Items straddle window boundaries when their
                        // updated date falls into a newer window.
                        if seen.insert(paper.id.clone()) {
                            papers.push(paper);
                            new_in_window += 1;
                        }
                    }
                    debug!(
                        window = index + 1,
                        total_windows, new_in_window, "Sub-window fetched"
                    );
                }
                Err(e) => {
                    skipped_windows += 1;
                    warn!(
                        window = index + 1,
                        total_windows,
                        "Skipping sub-window {} .. {} after exhausted retries: {}",
                        window.start,
                        window.end,
                        e
                    );
                }
            }

            if index + 1 < total_windows {
                tokio::time::sleep(Duration::from_secs(self.config.request_gap_seconds)).await;
            }
        }

        if skipped_windows == total_windows {
            return Err(PipelineError::FetchFailed(format!(
                "all {} sub-windows failed for source {}",
                total_windows,
                self.source.source_name()
            )));
        }

        info!(
            source = self.source.source_name(),
            fetched = papers.len(),
            skipped_windows,
            total_windows,
            "Windowed fetch complete"
        );
        Ok(FetchOutcome {
            papers,
            skipped_windows,
            total_windows,
        })
    }
}
