use chrono::{Duration, Utc};
use paper_digest::config::FeedConfig;
use paper_digest::feed::{decode_description, encode_description, keyword_slug, FeedEmitter};
use paper_digest::types::{FilterCriteria, MatchedPaper, Paper};

fn matched(id: &str, title: &str, abstract_text: &str) -> MatchedPaper {
    MatchedPaper {
        paper: Paper {
            id: format!("arxiv:{}", id),
            title: title.to_string(),
            abstract_text: abstract_text.to_string(),
            authors: vec!["Ada Lovelace".to_string(), "Charles Babbage".to_string()],
            categories: vec!["cs.LG".to_string(), "stat.ML".to_string()],
            primary_category: Some("cs.LG".to_string()),
            published: Utc::now() - Duration::days(2),
            updated: None,
            link: format!("https://arxiv.org/abs/{}", id),
            pdf_url: Some(format!("https://arxiv.org/pdf/{}.pdf", id)),
        },
        matched_keywords: vec!["neural network".to_string()],
        score: 0.73,
    }
}

#[test]
fn description_round_trips() {
    let item = matched("2401.0001", "A Title", "First paragraph.\n\nSecond paragraph.");
    let decoded = decode_description(&encode_description(&item));

    assert_eq!(decoded.categories, item.paper.categories);
    assert_eq!(decoded.matched_keywords, item.matched_keywords);
    assert_eq!(decoded.authors, item.paper.authors);
    assert_eq!(decoded.abstract_text, "First paragraph.\n\nSecond paragraph.");
}

#[test]
fn decoding_plain_text_yields_only_an_abstract() {
    let decoded = decode_description("Just a bare abstract with no headers.");
    assert!(decoded.categories.is_empty());
    assert!(decoded.matched_keywords.is_empty());
    assert!(decoded.authors.is_empty());
    assert_eq!(decoded.abstract_text, "Just a bare abstract with no headers.");
}

#[test]
fn rendered_feed_parses_and_preserves_metadata() {
    let emitter = FeedEmitter::new(FeedConfig::default());
    let items = vec![matched(
        "2401.0001",
        "Attention & Beyond <improved>",
        "We study attention.",
    )];

    let xml = emitter.render(&items);
    let feed = feed_rs::parser::parse(xml.as_bytes()).unwrap();

    assert_eq!(feed.entries.len(), 1);
    let entry = &feed.entries[0];
    assert_eq!(
        entry.title.as_ref().unwrap().content,
        "Attention & Beyond <improved>"
    );
    assert_eq!(entry.id, "arxiv:2401.0001");

    let description = entry.summary.as_ref().unwrap().content.clone();
    let decoded = decode_description(&description);
    assert_eq!(decoded.matched_keywords, vec!["neural network".to_string()]);
    assert_eq!(
        decoded.authors,
        vec!["Ada Lovelace".to_string(), "Charles Babbage".to_string()]
    );
    assert_eq!(decoded.abstract_text, "We study attention.");
}

#[test]
fn items_carry_the_pdf_link_as_an_enclosure() {
    let emitter = FeedEmitter::new(FeedConfig::default());
    let with_pdf = matched("2401.0001", "T", "A");
    let mut without_pdf = matched("2401.0002", "U", "B");
    without_pdf.paper.pdf_url = None;

    let xml = emitter.render(&[with_pdf, without_pdf]);
    assert!(xml.contains(
        "<enclosure url=\"https://arxiv.org/pdf/2401.0001.pdf\" length=\"0\" type=\"application/pdf\"/>"
    ));
    assert_eq!(xml.matches("<enclosure").count(), 1);

    // Still a well-formed feed for downstream readers.
    let feed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
    assert_eq!(feed.entries.len(), 2);
}

#[test]
fn empty_run_still_renders_a_valid_channel() {
    let emitter = FeedEmitter::new(FeedConfig::default());
    let xml = emitter.render(&[]);
    let feed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
    assert!(feed.entries.is_empty());
    assert!(feed.title.is_some());
}

#[tokio::test]
async fn written_artifact_lands_in_the_output_dir_with_keyword_name() {
    let _ = tracing_subscriber::fmt().try_init();
    let dir = tempfile::tempdir().unwrap();
    let emitter = FeedEmitter::new(FeedConfig {
        output_dir: dir.path().to_str().unwrap().to_string(),
        ..FeedConfig::default()
    });
    let criteria = FilterCriteria {
        keywords: vec!["graph neural network".to_string()],
        ..FilterCriteria::default()
    };

    let path = emitter
        .write(&[matched("2401.0001", "T", "A")], &criteria)
        .await
        .unwrap();

    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.ends_with(".xml"));
    assert!(name.contains("graph-neural-network"));
    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(contents.contains("<rss version=\"2.0\">"));
}

#[test]
fn keyword_slug_is_filesystem_safe() {
    assert_eq!(keyword_slug(&[]), "all");
    assert_eq!(
        keyword_slug(&["graph neural network".to_string()]),
        "graph-neural-network"
    );
    let slug = keyword_slug(&[
        "a/b:c".to_string(),
        "d e".to_string(),
        "f".to_string(),
        "ignored".to_string(),
    ]);
    assert!(!slug.contains('/'));
    assert!(!slug.contains(':'));
    assert!(!slug.contains(' '));
    assert!(slug.len() <= 40);
}
