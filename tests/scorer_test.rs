use chrono::{Duration, Utc};
use paper_digest::scorer::{keyword_strength, recency_score};
use paper_digest::types::{FilterCriteria, Paper, ScoreWeights};
use paper_digest::Scorer;

fn paper(id: &str, days_old: i64, author_count: usize, abstract_len: usize) -> Paper {
    Paper {
        id: id.to_string(),
        title: format!("Paper {}", id),
        abstract_text: "x".repeat(abstract_len),
        authors: (0..author_count).map(|i| format!("Author {}", i)).collect(),
        categories: vec!["cs.LG".to_string()],
        primary_category: Some("cs.LG".to_string()),
        published: Utc::now() - Duration::days(days_old),
        updated: None,
        link: format!("https://arxiv.org/abs/{}", id),
        pdf_url: None,
    }
}

fn criteria(keywords: &[&str], high_value: &[&str]) -> FilterCriteria {
    FilterCriteria {
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        high_value_keywords: high_value.iter().map(|s| s.to_string()).collect(),
        ..FilterCriteria::default()
    }
}

#[test]
fn high_value_keywords_count_double() {
    let c = criteria(&["alpha", "beta", "gamma"], &["alpha"]);
    // Total weight 4 (2 + 1 + 1).
    let none = keyword_strength(&[], &c);
    let plain = keyword_strength(&["beta".to_string()], &c);
    let high = keyword_strength(&["alpha".to_string()], &c);
    let all = keyword_strength(
        &["alpha".to_string(), "beta".to_string(), "gamma".to_string()],
        &c,
    );

    assert_eq!(none, 0.0);
    assert!((plain - 0.25).abs() < 1e-9);
    assert!((high - 0.5).abs() < 1e-9);
    assert!((all - 1.0).abs() < 1e-9);
}

#[test]
fn recency_decays_linearly_and_clamps() {
    let now = Utc::now();
    let fresh = paper("fresh", 0, 1, 100);
    let halfway = paper("half", 15, 1, 100);
    let stale = paper("stale", 60, 1, 100);

    assert!((recency_score(&fresh, 30, now) - 1.0).abs() < 1e-3);
    assert!((recency_score(&halfway, 30, now) - 0.5).abs() < 1e-3);
    assert_eq!(recency_score(&stale, 30, now), 0.0);
}

#[test]
fn future_dates_score_as_brand_new() {
    let now = Utc::now();
    let mut early_listing = paper("future", 0, 1, 100);
    early_listing.published = now + Duration::days(2);

    let score = recency_score(&early_listing, 30, now);
    assert!((score - 1.0).abs() < 1e-9);
}

#[test]
fn total_score_stays_within_weight_sum() {
    let weights = ScoreWeights::default();
    let scorer = Scorer::new(weights);
    let c = criteria(&["alpha"], &[]);
    let best = paper("best", 0, 10, 5000);

    let score = scorer.score(&best, &["alpha".to_string()], &c, Utc::now());
    let max = weights.base + weights.keyword + weights.recency + weights.authors + weights.abstract_length;
    assert!(score <= max + 1e-9);
    assert!(score > weights.base);
}

#[test]
fn ranking_orders_by_score_then_recency_and_truncates() {
    let scorer = Scorer::new(ScoreWeights::default());
    let mut c = criteria(&["alpha", "beta"], &[]);
    c.max_results = 2;
    let now = Utc::now();

    // Same keyword match, same authors and abstract, different ages.
    let strong = (paper("strong", 1, 3, 800), vec!["alpha".to_string(), "beta".to_string()]);
    let weak_new = (paper("weak-new", 1, 3, 800), vec!["alpha".to_string()]);
    let weak_old = (paper("weak-old", 5, 3, 800), vec!["alpha".to_string()]);

    let ranked = scorer.rank(vec![weak_old, strong, weak_new], &c, now);
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].paper.id, "strong");
    assert_eq!(ranked[1].paper.id, "weak-new");
    assert!(ranked[0].score >= ranked[1].score);
}

#[test]
fn identical_scores_break_ties_by_newer_publication() {
    let scorer = Scorer::new(ScoreWeights {
        base: 1.0,
        keyword: 0.0,
        recency: 0.0,
        authors: 0.0,
        abstract_length: 0.0,
    });
    let c = criteria(&["alpha"], &[]);

    let older = (paper("older", 9, 1, 100), vec!["alpha".to_string()]);
    let newer = (paper("newer", 2, 1, 100), vec!["alpha".to_string()]);

    let ranked = scorer.rank(vec![older, newer], &c, Utc::now());
    assert_eq!(ranked[0].paper.id, "newer");
    assert_eq!(ranked[1].paper.id, "older");
}
