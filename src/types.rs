use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw paper record as fetched from a source catalog.
///
/// Immutable once fetched: filtering and scoring never write back onto this
/// struct, annotations go on [`MatchedPaper`] instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paper {
    /// Stable, source-namespaced identifier, e.g. `arxiv:2401.01234v1` or
    /// `openreview:aBcD123`.
    pub id: String,
    pub title: String,
    pub abstract_text: String,
    /// Ordered author names. Affiliation extraction is best effort and the
    /// list may be empty for some conference records.
    pub authors: Vec<String>,
    /// Primary category first, then secondary tags.
    pub categories: Vec<String>,
    pub primary_category: Option<String>,
    pub published: DateTime<Utc>,
    pub updated: Option<DateTime<Utc>>,
    /// Link to the abstract / landing page.
    pub link: String,
    /// Direct link to the full text, when the source provides one.
    pub pdf_url: Option<String>,
}

impl Paper {
    /// The timestamp used for recency decisions: the newer of published and
    /// updated.
    pub fn effective_date(&self) -> DateTime<Utc> {
        match self.updated {
            Some(updated) if updated > self.published => updated,
            _ => self.published,
        }
    }
}

/// Optional exact-period constraint: if both year and month are given only
/// that month matches; a single field leaves the other unconstrained.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DateRange {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl DateRange {
    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.month.is_none()
    }
}

/// Per-run filter configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Phrase keywords matched against title + abstract. Empty means every
    /// paper passes (with an empty matched-keyword list).
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Subset of `keywords` that counts double in scoring.
    #[serde(default)]
    pub high_value_keywords: Vec<String>,
    /// Category tags; empty means no category restriction.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Maximum paper age in days, 1..=365.
    #[serde(default = "default_max_days_old")]
    pub max_days_old: u32,
    /// Optional exact year/month constraint, applied in addition to the
    /// recency window.
    #[serde(default)]
    pub date_range: Option<DateRange>,
    /// Cap on the ranked result list.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

pub(crate) fn default_max_days_old() -> u32 {
    30
}

pub(crate) fn default_max_results() -> usize {
    100
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            high_value_keywords: Vec::new(),
            categories: Vec::new(),
            max_days_old: default_max_days_old(),
            date_range: None,
            max_results: default_max_results(),
        }
    }
}

/// A paper that passed filtering, annotated with what matched and how it
/// scored. Lives inside a [`HistoryRecord`] or an ephemeral feed, never
/// persisted standalone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedPaper {
    pub paper: Paper,
    /// Which configured keywords matched. Empty only when the keyword list
    /// itself was empty.
    pub matched_keywords: Vec<String>,
    /// Higher is more relevant.
    pub score: f64,
}

/// Weights for the scoring sub-components. Every field is optional in
/// configuration; missing entries fall back to these documented defaults
/// rather than failing the run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Constant floor so every matched paper scores above zero.
    #[serde(default = "ScoreWeights::default_base")]
    pub base: f64,
    /// Keyword-match strength, high-value keywords counting double.
    #[serde(default = "ScoreWeights::default_keyword")]
    pub keyword: f64,
    /// Linear recency decay over the configured window.
    #[serde(default = "ScoreWeights::default_recency")]
    pub recency: f64,
    /// Collaboration signal: more authors, higher score, saturating.
    #[serde(default = "ScoreWeights::default_authors")]
    pub authors: f64,
    /// Abstract-detail proxy based on abstract length, saturating.
    #[serde(default = "ScoreWeights::default_abstract")]
    pub abstract_length: f64,
}

impl ScoreWeights {
    pub(crate) fn default_base() -> f64 {
        0.1
    }
    pub(crate) fn default_keyword() -> f64 {
        0.4
    }
    pub(crate) fn default_recency() -> f64 {
        0.3
    }
    pub(crate) fn default_authors() -> f64 {
        0.2
    }
    pub(crate) fn default_abstract() -> f64 {
        0.1
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            base: Self::default_base(),
            keyword: Self::default_keyword(),
            recency: Self::default_recency(),
            authors: Self::default_authors(),
            abstract_length: Self::default_abstract(),
        }
    }
}

/// Immutable snapshot of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub criteria: FilterCriteria,
    pub papers: Vec<MatchedPaper>,
    /// Path of the feed artifact produced by the run, if any.
    pub output_file: Option<String>,
}

/// Outcome of a windowed fetch: the deduplicated raw set plus how many
/// sub-windows had to be skipped after exhausting retries.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub papers: Vec<Paper>,
    pub skipped_windows: usize,
    pub total_windows: usize,
}

/// Overall status of a completed run. A failed run surfaces as an error, so
/// a report only ever carries these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Success,
    /// Feed and history were produced but the digest could not be delivered;
    /// the undelivered papers stay out of the ledger and retry next run.
    Partial,
}

/// What a run reports back to the caller, so "no new papers" can be told
/// apart from "fetch degraded".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub fetched: usize,
    pub matched: usize,
    pub delivered: usize,
    pub skipped_windows: usize,
    pub history_id: String,
    pub output_file: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run not found: {id}")]
    RunNotFound { id: String },

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Digest delivery failed: {0}")]
    Delivery(String),

    #[error("A pipeline run is already in flight")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
