use crate::types::{FilterCriteria, MatchedPaper, Paper, ScoreWeights};
use chrono::{DateTime, Utc};
use tracing::debug;

const AUTHOR_SATURATION: usize = 5;
const ABSTRACT_SATURATION: usize = 1500;

/// Multi-factor relevance scorer. Every sub-score is normalized to [0, 1]
/// before its weight is applied, so the total stays within the sum of the
/// weights regardless of input.
pub struct Scorer {
    weights: ScoreWeights,
}

impl Scorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn score(
        &self,
        paper: &Paper,
        matched_keywords: &[String],
        criteria: &FilterCriteria,
        now: DateTime<Utc>,
    ) -> f64 {
        let w = &self.weights;
        w.base
            + w.keyword * keyword_strength(matched_keywords, criteria)
            + w.recency * recency_score(paper, criteria.max_days_old, now)
            + w.authors * author_score(paper)
            + w.abstract_length * abstract_score(paper)
    }

    /// Score every matched paper, sort by descending score with newer
    /// publication breaking ties, and truncate to `criteria.max_results`.
    pub fn rank(
        &self,
        matches: Vec<(Paper, Vec<String>)>,
        criteria: &FilterCriteria,
        now: DateTime<Utc>,
    ) -> Vec<MatchedPaper> {
        let mut ranked: Vec<MatchedPaper> = matches
            .into_iter()
            .map(|(paper, matched_keywords)| {
                let score = self.score(&paper, &matched_keywords, criteria, now);
                MatchedPaper {
                    paper,
                    matched_keywords,
                    score,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.paper.published.cmp(&a.paper.published))
        });
        ranked.truncate(criteria.max_results);
        debug!(ranked = ranked.len(), "Papers ranked");
        ranked
    }
}

/// Share of the configured keyword weight that matched. High-value keywords
/// carry twice the weight of ordinary ones, in both numerator and
/// denominator.
pub fn keyword_strength(matched: &[String], criteria: &FilterCriteria) -> f64 {
    if criteria.keywords.is_empty() {
        return 0.0;
    }
    let weight_of = |kw: &str| -> f64 {
        if criteria
            .high_value_keywords
            .iter()
            .any(|h| h.eq_ignore_ascii_case(kw))
        {
            2.0
        } else {
            1.0
        }
    };
    let total: f64 = criteria.keywords.iter().map(|k| weight_of(k)).sum();
    let hit: f64 = matched.iter().map(|k| weight_of(k)).sum();
    (hit / total).clamp(0.0, 1.0)
}

/// Linear decay from 1.0 at zero age to 0.0 at the recency cutoff. Dates in
/// the future are treated as age zero.
pub fn recency_score(paper: &Paper, max_days_old: u32, now: DateTime<Utc>) -> f64 {
    if max_days_old == 0 {
        return 0.0;
    }
    let age = now - paper.effective_date();
    let age_days = (age.num_seconds().max(0) as f64) / 86_400.0;
    (1.0 - age_days / max_days_old as f64).clamp(0.0, 1.0)
}

fn author_score(paper: &Paper) -> f64 {
    paper.authors.len().min(AUTHOR_SATURATION) as f64 / AUTHOR_SATURATION as f64
}

fn abstract_score(paper: &Paper) -> f64 {
    paper.abstract_text.chars().count().min(ABSTRACT_SATURATION) as f64
        / ABSTRACT_SATURATION as f64
}
