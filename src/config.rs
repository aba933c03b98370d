use crate::types::{DateRange, FilterCriteria, PipelineError, Result, ScoreWeights};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Tuning for the windowed source fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Hard per-request result cap of the remote API.
    pub max_results_per_request: usize,
    /// Expected catalog volume, used to size sub-windows so a single
    /// sub-request stays under the per-request cap.
    pub papers_per_day_per_category: usize,
    /// Attempts per sub-window before it is skipped.
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    /// Politeness delay between successive sub-requests.
    pub request_gap_seconds: u64,
    pub timeout_seconds: u64,
    /// Overall budget for the fetch stage of one run.
    pub run_timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "paper-digest/0.1".to_string(),
            max_results_per_request: 2000,
            papers_per_day_per_category: 20,
            max_retries: 3,
            retry_delay_seconds: 3,
            request_gap_seconds: 3,
            timeout_seconds: 30,
            run_timeout_seconds: 1800,
        }
    }
}

/// Feed artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub title: String,
    pub description: String,
    pub link: String,
    pub output_dir: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: "Personalized arXiv Papers".to_string(),
            description: "Automatically filtered papers based on your research interests"
                .to_string(),
            link: "https://arxiv.org".to_string(),
            output_dir: "output".to_string(),
        }
    }
}

/// Email digest settings. Transport mechanics live behind the
/// [`crate::digest::DigestTransport`] seam, so there is no SMTP detail here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    pub enabled: bool,
    pub subject_prefix: String,
    /// Display taxonomy: section name -> keyword list. A paper lands in the
    /// first section whose keywords match; unmatched papers fall back to
    /// "Other". Ordered map so sections render deterministically.
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            subject_prefix: "[paper-digest]".to_string(),
            categories: BTreeMap::new(),
        }
    }
}

/// Top-level application configuration with typed, validated fields and a
/// documented default for everything optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub criteria: FilterCriteria,
    #[serde(default)]
    pub weights: ScoreWeights,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,
    #[serde(default = "default_history_path")]
    pub history_path: String,
}

fn default_ledger_path() -> String {
    "data/ledger.db".to_string()
}

fn default_history_path() -> String {
    "data/history.db".to_string()
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        info!(
            keywords = config.criteria.keywords.len(),
            categories = config.criteria.categories.len(),
            "Loaded configuration from {}",
            path.display()
        );
        Ok(config)
    }

    /// Validate hard constraints; soft mistakes (an out-of-range month, a
    /// blank keyword) degrade to their documented defaults with a warning.
    pub fn validate(&mut self) -> Result<()> {
        if self.criteria.max_days_old == 0 || self.criteria.max_days_old > 365 {
            return Err(PipelineError::Config(format!(
                "max_days_old must be within 1..=365, got {}",
                self.criteria.max_days_old
            )));
        }
        if self.criteria.max_results == 0 {
            return Err(PipelineError::Config(
                "max_results must be at least 1".to_string(),
            ));
        }
        if self.fetch.max_results_per_request == 0 {
            return Err(PipelineError::Config(
                "max_results_per_request must be at least 1".to_string(),
            ));
        }
        if self.fetch.papers_per_day_per_category == 0 {
            return Err(PipelineError::Config(
                "papers_per_day_per_category must be at least 1".to_string(),
            ));
        }
        url::Url::parse(&self.feed.link)?;

        let before = self.criteria.keywords.len();
        self.criteria.keywords.retain(|k| !k.trim().is_empty());
        if self.criteria.keywords.len() != before {
            warn!("Dropped {} blank keywords", before - self.criteria.keywords.len());
        }

        if let Some(range) = self.criteria.date_range {
            let cleaned = sanitize_date_range(range);
            if cleaned.is_empty() {
                warn!("date_range is empty after validation, ignoring");
                self.criteria.date_range = None;
            } else {
                self.criteria.date_range = Some(cleaned);
            }
        }

        // High-value keywords must be a subset of the keyword list to have
        // any effect; stray entries are dropped rather than rejected.
        let keywords_lower: Vec<String> = self
            .criteria
            .keywords
            .iter()
            .map(|k| k.to_lowercase())
            .collect();
        self.criteria
            .high_value_keywords
            .retain(|k| keywords_lower.contains(&k.to_lowercase()));

        Ok(())
    }
}

fn sanitize_date_range(range: DateRange) -> DateRange {
    let mut cleaned = range;
    if let Some(month) = cleaned.month {
        if !(1..=12).contains(&month) {
            warn!(month, "date_range.month out of range, ignoring");
            cleaned.month = None;
        }
    }
    if let Some(year) = cleaned.year {
        if !(1991..=9999).contains(&year) {
            warn!(year, "date_range.year out of range, ignoring");
            cleaned.year = None;
        }
    }
    cleaned
}
