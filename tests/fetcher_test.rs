use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use paper_digest::config::FetchConfig;
use paper_digest::fetcher::{plan_windows, retry_with_backoff};
use paper_digest::types::{Paper, PipelineError, Result};
use paper_digest::{PaperSource, WindowedFetcher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

fn test_config() -> FetchConfig {
    FetchConfig {
        user_agent: "test".to_string(),
        max_results_per_request: 600,
        papers_per_day_per_category: 20,
        max_retries: 2,
        retry_delay_seconds: 0,
        request_gap_seconds: 0,
        timeout_seconds: 5,
        run_timeout_seconds: 60,
    }
}

fn paper(id: &str, published: DateTime<Utc>) -> Paper {
    Paper {
        id: id.to_string(),
        title: format!("Paper {}", id),
        abstract_text: "An abstract.".to_string(),
        authors: vec!["Author".to_string()],
        categories: vec!["cs.LG".to_string()],
        primary_category: Some("cs.LG".to_string()),
        published,
        updated: None,
        link: format!("https://arxiv.org/abs/{}", id),
        pdf_url: None,
    }
}

/// Source double: one canned response (or failure) per expected call, and a
/// log of the windows actually requested.
struct ScriptedSource {
    responses: Mutex<Vec<Result<Vec<Paper>>>>,
    requested: std::sync::Arc<Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>>,
}

impl ScriptedSource {
    fn new(responses: Vec<Result<Vec<Paper>>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requested: std::sync::Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn request_log(&self) -> std::sync::Arc<Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>> {
        self.requested.clone()
    }
}

#[async_trait]
impl PaperSource for ScriptedSource {
    fn source_name(&self) -> &str {
        "scripted"
    }

    async fn fetch_window(
        &self,
        _categories: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<Paper>> {
        self.requested.lock().unwrap().push((start, end));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(Vec::new());
        }
        responses.remove(0)
    }
}

#[test]
fn window_plan_covers_the_range_without_gaps() {
    let now = Utc::now();
    let config = test_config();
    // 600 results per request / 20 papers per day = 30-day windows, so a
    // 200-day range needs 7 of them.
    let windows = plan_windows(now, 200, 1, &config);
    assert_eq!(windows.len(), 7);
    assert_eq!(windows[0].end, now);
    for pair in windows.windows(2) {
        assert_eq!(pair[0].start, pair[1].end);
    }
    assert_eq!(
        windows.last().unwrap().start,
        now - ChronoDuration::days(200)
    );
}

#[test]
fn short_ranges_collapse_to_a_single_window() {
    let now = Utc::now();
    let windows = plan_windows(now, 7, 1, &test_config());
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].start, now - ChronoDuration::days(7));
    assert_eq!(windows[0].end, now);
}

#[test]
fn many_categories_shrink_the_window() {
    let now = Utc::now();
    // 600 / (20 * 10 categories) = 3-day windows.
    let windows = plan_windows(now, 9, 10, &test_config());
    assert_eq!(windows.len(), 3);
}

#[tokio::test]
async fn duplicate_ids_across_windows_are_kept_once() {
    let _ = tracing_subscriber::fmt().try_init();
    let now = Utc::now();
    let boundary_paper = paper("arxiv:2401.0001", now - ChronoDuration::days(29));

    let source = ScriptedSource::new(vec![
        Ok(vec![
            boundary_paper.clone(),
            paper("arxiv:2401.0002", now - ChronoDuration::days(3)),
        ]),
        Ok(vec![boundary_paper.clone()]),
    ]);
    let fetcher = WindowedFetcher::new(source, test_config());

    let outcome = fetcher.fetch(&["cs.LG".to_string()], 60).await.unwrap();
    assert_eq!(outcome.total_windows, 2);
    assert_eq!(outcome.skipped_windows, 0);
    assert_eq!(outcome.papers.len(), 2);
}

#[tokio::test]
async fn a_failed_window_is_skipped_and_counted() {
    let _ = tracing_subscriber::fmt().try_init();
    let now = Utc::now();

    let source = ScriptedSource::new(vec![
        Ok(vec![paper("arxiv:2401.0001", now - ChronoDuration::days(1))]),
        // Both attempts at the second window fail.
        Err(PipelineError::FetchFailed("boom".to_string())),
        Err(PipelineError::FetchFailed("boom".to_string())),
        Ok(vec![paper("arxiv:2401.0003", now - ChronoDuration::days(65))]),
    ]);
    let fetcher = WindowedFetcher::new(source, test_config());

    let outcome = fetcher.fetch(&["cs.LG".to_string()], 90).await.unwrap();
    assert_eq!(outcome.total_windows, 3);
    assert_eq!(outcome.skipped_windows, 1);
    assert_eq!(outcome.papers.len(), 2);
}

#[tokio::test]
async fn all_windows_failing_is_fatal() {
    let _ = tracing_subscriber::fmt().try_init();
    let failures: Vec<Result<Vec<Paper>>> = (0..10)
        .map(|_| Err(PipelineError::FetchFailed("down".to_string())))
        .collect();
    let fetcher = WindowedFetcher::new(ScriptedSource::new(failures), test_config());

    let err = fetcher
        .fetch(&["cs.LG".to_string()], 60)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::FetchFailed(_)));
}

#[tokio::test]
async fn windows_are_requested_newest_first() {
    let source = ScriptedSource::new(Vec::new());
    let log = source.request_log();
    let fetcher = WindowedFetcher::new(source, test_config());

    let outcome = fetcher.fetch(&["cs.LG".to_string()], 90).await.unwrap();
    assert_eq!(outcome.total_windows, 3);

    let requested = log.lock().unwrap();
    assert_eq!(requested.len(), 3);
    for pair in requested.windows(2) {
        assert!(pair[0].1 > pair[1].1);
    }
}

#[tokio::test]
async fn retry_returns_first_success() {
    let attempts = AtomicU32::new(0);
    let result: Result<u32> = retry_with_backoff(3, Duration::from_millis(1), || {
        let n = attempts.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 2 {
                Err(PipelineError::FetchFailed("transient".to_string()))
            } else {
                Ok(42)
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_surfaces_the_last_error_when_exhausted() {
    let attempts = AtomicU32::new(0);
    let result: Result<u32> = retry_with_backoff(2, Duration::from_millis(1), || {
        attempts.fetch_add(1, Ordering::SeqCst);
        async { Err(PipelineError::FetchFailed("still down".to_string())) }
    })
    .await;

    assert!(matches!(result, Err(PipelineError::FetchFailed(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
