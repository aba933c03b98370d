use crate::types::{FilterCriteria, Paper};
use chrono::{DateTime, Datelike, Duration, Utc};
use tracing::debug;

/// Decides whether a paper's dates satisfy the criteria. Swappable so the
/// interaction between the rolling recency cutoff and an exact year/month
/// range can be changed in one place.
pub type DatePolicy = fn(&Paper, &FilterCriteria, DateTime<Utc>) -> bool;

/// Default policy: the recency cutoff and the exact year/month range are
/// both applied. Recency looks at the newer of published/updated; the
/// year/month range is checked against the published date only.
pub fn conjunctive_date_policy(paper: &Paper, criteria: &FilterCriteria, now: DateTime<Utc>) -> bool {
    let cutoff = now - Duration::days(criteria.max_days_old as i64);
    if paper.effective_date() < cutoff {
        return false;
    }

    if let Some(range) = &criteria.date_range {
        if let Some(year) = range.year {
            if paper.published.year() != year {
                return false;
            }
        }
        if let Some(month) = range.month {
            if paper.published.month() != month {
                return false;
            }
        }
    }
    true
}

/// Keyword, category and date filter over a fetched batch.
pub struct PaperFilter {
    criteria: FilterCriteria,
    date_policy: DatePolicy,
}

impl PaperFilter {
    pub fn new(criteria: FilterCriteria) -> Self {
        Self {
            criteria,
            date_policy: conjunctive_date_policy,
        }
    }

    pub fn with_date_policy(mut self, policy: DatePolicy) -> Self {
        self.date_policy = policy;
        self
    }

    /// Returns the papers that pass all criteria, each paired with the
    /// keywords that matched it. An empty keyword list disables the keyword
    /// constraint; an empty category list disables the category constraint.
    pub fn apply(&self, papers: &[Paper], now: DateTime<Utc>) -> Vec<(Paper, Vec<String>)> {
        let mut matched = Vec::new();
        for paper in papers {
            if !(self.date_policy)(paper, &self.criteria, now) {
                continue;
            }
            if !self.matches_category(paper) {
                continue;
            }
            let keywords = self.matched_keywords(paper);
            if keywords.is_empty() && !self.criteria.keywords.is_empty() {
                continue;
            }
            matched.push((paper.clone(), keywords));
        }
        debug!(
            input = papers.len(),
            matched = matched.len(),
            "Filter applied"
        );
        matched
    }

    fn matches_category(&self, paper: &Paper) -> bool {
        if self.criteria.categories.is_empty() {
            return true;
        }
        paper.categories.iter().any(|c| {
            self.criteria
                .categories
                .iter()
                .any(|wanted| wanted.eq_ignore_ascii_case(c))
        })
    }

    /// Case-insensitive whole-phrase search over title and abstract.
    /// Returned keywords keep the casing they were configured with.
    pub fn matched_keywords(&self, paper: &Paper) -> Vec<String> {
        let haystack = format!("{} {}", paper.title, paper.abstract_text).to_lowercase();
        self.criteria
            .keywords
            .iter()
            .filter(|kw| haystack.contains(&kw.to_lowercase()))
            .cloned()
            .collect()
    }
}
