use crate::config::DigestConfig;
use crate::feed::escape_xml;
use crate::types::{MatchedPaper, Result};
use async_trait::async_trait;
use chrono::Utc;

const MAX_LISTED_AUTHORS: usize = 5;
const MAX_ABSTRACT_CHARS: usize = 500;
const FALLBACK_SECTION: &str = "Other";

/// A rendered digest, ready for whatever transport carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMessage {
    pub subject: String,
    pub html_body: String,
}

/// Carries a rendered digest to its recipients. The pipeline treats a send
/// failure as retriable: nothing is marked delivered, so the next run
/// re-sends the same papers.
#[async_trait]
pub trait DigestTransport: Send + Sync {
    async fn send(&self, message: &DigestMessage) -> Result<()>;
}

/// Groups ranked papers into the configured topic sections and renders the
/// digest HTML.
pub struct DigestBuilder {
    config: DigestConfig,
}

impl DigestBuilder {
    pub fn new(config: DigestConfig) -> Self {
        Self { config }
    }

    /// Section for one paper: the first configured topic (in section-name
    /// order) whose keyword list intersects the paper's matched keywords,
    /// falling back to "Other".
    pub fn classify(&self, item: &MatchedPaper) -> String {
        for (section, keywords) in &self.config.categories {
            let hit = item.matched_keywords.iter().any(|m| {
                keywords.iter().any(|k| k.eq_ignore_ascii_case(m))
            });
            if hit {
                return section.clone();
            }
        }
        FALLBACK_SECTION.to_string()
    }

    pub fn build(&self, items: &[MatchedPaper]) -> DigestMessage {
        let subject = format!(
            "{} {} new paper{} - {}",
            self.config.subject_prefix,
            items.len(),
            if items.len() == 1 { "" } else { "s" },
            Utc::now().format("%Y-%m-%d")
        );

        // Preserve ranking order inside each section; sections appear in
        // configured order with the fallback last.
        let mut sections: Vec<(String, Vec<&MatchedPaper>)> = self
            .config
            .categories
            .keys()
            .map(|name| (name.clone(), Vec::new()))
            .collect();
        sections.push((FALLBACK_SECTION.to_string(), Vec::new()));
        for item in items {
            let section = self.classify(item);
            if let Some((_, bucket)) = sections.iter_mut().find(|(name, _)| *name == section) {
                bucket.push(item);
            }
        }

        let mut html = String::from("<html><body>\n");
        html.push_str(&format!(
            "<h1>{} papers matched today</h1>\n",
            items.len()
        ));
        for (section, bucket) in &sections {
            if bucket.is_empty() {
                continue;
            }
            html.push_str(&format!(
                "<h2>{} ({})</h2>\n<ul>\n",
                escape_xml(section),
                bucket.len()
            ));
            for item in bucket {
                html.push_str(&render_item(item));
            }
            html.push_str("</ul>\n");
        }
        html.push_str("</body></html>\n");

        DigestMessage {
            subject,
            html_body: html,
        }
    }
}

fn render_item(item: &MatchedPaper) -> String {
    let mut authors: Vec<String> = item
        .paper
        .authors
        .iter()
        .take(MAX_LISTED_AUTHORS)
        .cloned()
        .collect();
    if item.paper.authors.len() > MAX_LISTED_AUTHORS {
        authors.push(format!(
            "and {} more",
            item.paper.authors.len() - MAX_LISTED_AUTHORS
        ));
    }

    let mut abstract_text: String = item
        .paper
        .abstract_text
        .chars()
        .take(MAX_ABSTRACT_CHARS)
        .collect();
    if item.paper.abstract_text.chars().count() > MAX_ABSTRACT_CHARS {
        abstract_text.push('…');
    }

    format!(
        "<li><a href=\"{}\"><b>{}</b></a><br>\n\
         {}<br>\n\
         <i>Matched: {} (score {:.2})</i><br>\n\
         {}</li>\n",
        escape_xml(&item.paper.link),
        escape_xml(&item.paper.title),
        escape_xml(&authors.join(", ")),
        escape_xml(&item.matched_keywords.join(", ")),
        item.score,
        escape_xml(&abstract_text)
    )
}

/// Transport for deployments without a digest recipient: logs the subject
/// and reports success, so the papers are still marked delivered.
pub struct NullTransport;

#[async_trait]
impl DigestTransport for NullTransport {
    async fn send(&self, message: &DigestMessage) -> Result<()> {
        tracing::info!(subject = %message.subject, "No digest transport wired; dropping message");
        Ok(())
    }
}
