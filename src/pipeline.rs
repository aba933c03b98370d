use crate::config::AppConfig;
use crate::digest::{DigestBuilder, DigestTransport};
use crate::feed::FeedEmitter;
use crate::fetcher::WindowedFetcher;
use crate::filter::PaperFilter;
use crate::history::HistoryStore;
use crate::ledger::DeliveryLedger;
use crate::scorer::Scorer;
use crate::sources::PaperSource;
use crate::types::{PipelineError, Result, RunReport, RunStatus};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// End-to-end run: fetch, filter, rank, emit the feed artifact, append
/// history, then deliver the digest and record the delivery.
///
/// Persistence (feed and history) happens before delivery, and the ledger
/// is only written after the transport reports success. A failed send
/// therefore leaves the papers eligible for the next run instead of losing
/// them.
pub struct Pipeline<S: PaperSource> {
    config: AppConfig,
    fetcher: WindowedFetcher<S>,
    ledger: Arc<dyn DeliveryLedger>,
    history: Arc<HistoryStore>,
    transport: Arc<dyn DigestTransport>,
    is_running: Arc<AtomicBool>,
}

/// Clears the busy flag on drop, so the flag is released even when the run
/// future is cancelled mid-flight.
struct RunningGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl<S: PaperSource> Pipeline<S> {
    pub fn new(
        config: AppConfig,
        source: S,
        ledger: Arc<dyn DeliveryLedger>,
        history: Arc<HistoryStore>,
        transport: Arc<dyn DigestTransport>,
    ) -> Self {
        let fetcher = WindowedFetcher::new(source, config.fetch.clone());
        Self {
            config,
            fetcher,
            ledger,
            history,
            transport,
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Executes one run. A second call while a run is in flight fails fast
    /// with [`PipelineError::Busy`] instead of queuing.
    pub async fn run(&self) -> Result<RunReport> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Run requested while another run is in progress");
            return Err(PipelineError::Busy);
        }
        let _guard = RunningGuard {
            flag: Arc::clone(&self.is_running),
        };

        let result = self.run_inner().await;
        if let Err(e) = &result {
            error!("Run failed: {}", e);
        }
        result
    }

    async fn run_inner(&self) -> Result<RunReport> {
        let criteria = self.config.criteria.clone();
        let now = Utc::now();

        let outcome = tokio::time::timeout(
            Duration::from_secs(self.config.fetch.run_timeout_seconds),
            self.fetcher
                .fetch(&criteria.categories, criteria.max_days_old),
        )
        .await
        .map_err(|_| {
            PipelineError::FetchFailed(format!(
                "fetch exceeded {} seconds",
                self.config.fetch.run_timeout_seconds
            ))
        })??;
        let fetched = outcome.papers.len();

        let filter = PaperFilter::new(criteria.clone());
        let matches = filter.apply(&outcome.papers, now);

        let scorer = Scorer::new(self.config.weights.clone());
        let ranked = scorer.rank(matches, &criteria, now);
        info!(fetched, matched = ranked.len(), "Papers filtered and ranked");

        let emitter = FeedEmitter::new(self.config.feed.clone());
        let output_file = emitter.write(&ranked, &criteria).await?;
        let output_file = output_file.to_string_lossy().into_owned();

        let history_id = self
            .history
            .append(&criteria, &ranked, Some(&output_file))
            .await?;

        let fresh = self.ledger.filter_new(ranked.clone()).await?;
        if fresh.is_empty() {
            info!("No undelivered papers; skipping digest");
            return Ok(RunReport {
                status: RunStatus::Success,
                fetched,
                matched: ranked.len(),
                delivered: 0,
                skipped_windows: outcome.skipped_windows,
                history_id,
                output_file: Some(output_file),
            });
        }

        // With delivery disabled the ledger stays untouched, so these papers
        // go out with the first digest once delivery is enabled.
        if !self.config.digest.enabled {
            info!(
                pending = fresh.len(),
                "Digest delivery disabled; leaving papers unrecorded"
            );
            return Ok(RunReport {
                status: RunStatus::Success,
                fetched,
                matched: ranked.len(),
                delivered: 0,
                skipped_windows: outcome.skipped_windows,
                history_id,
                output_file: Some(output_file),
            });
        }

        let message = DigestBuilder::new(self.config.digest.clone()).build(&fresh);
        match self.transport.send(&message).await {
            Ok(()) => {
                let ids: Vec<String> = fresh.iter().map(|m| m.paper.id.clone()).collect();
                self.ledger.record_delivered(&ids).await?;
                info!(delivered = fresh.len(), "Digest delivered");
                Ok(RunReport {
                    status: RunStatus::Success,
                    fetched,
                    matched: ranked.len(),
                    delivered: fresh.len(),
                    skipped_windows: outcome.skipped_windows,
                    history_id,
                    output_file: Some(output_file),
                })
            }
            Err(e) => {
                // Send failed, ledger untouched: the same papers come back
                // as fresh next run.
                warn!("Digest delivery failed, will retry next run: {}", e);
                Ok(RunReport {
                    status: RunStatus::Partial,
                    fetched,
                    matched: ranked.len(),
                    delivered: 0,
                    skipped_windows: outcome.skipped_windows,
                    history_id,
                    output_file: Some(output_file),
                })
            }
        }
    }
}
