use crate::sources::PaperSource;
use crate::types::{Paper, PipelineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://export.arxiv.org/api/query";

/// Source backed by the arXiv query API, which speaks Atom.
pub struct ArxivSource {
    client: Client,
    base_url: String,
    /// Page size for the `start`/`max_results` paging of a single window.
    page_size: usize,
    /// Politeness delay between successive page requests.
    request_gap: Duration,
}

impl ArxivSource {
    pub fn new(user_agent: &str, timeout_seconds: u64, request_gap_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_seconds))
            .gzip(true)
            .build()
            .map_err(PipelineError::Http)?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 100,
            request_gap: Duration::from_secs(request_gap_seconds),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn search_query(categories: &[String], start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        let cats = categories
            .iter()
            .map(|c| format!("cat:{}", c))
            .collect::<Vec<_>>()
            .join(" OR ");
        format!(
            "({}) AND submittedDate:[{} TO {}]",
            cats,
            start.format("%Y%m%d%H%M"),
            end.format("%Y%m%d%H%M")
        )
    }
}

#[async_trait]
impl PaperSource for ArxivSource {
    fn source_name(&self) -> &str {
        "arxiv"
    }

    async fn fetch_window(
        &self,
        categories: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Paper>> {
        if categories.is_empty() {
            return Err(PipelineError::Config(
                "arXiv fetch requires at least one category".to_string(),
            ));
        }

        let search_query = Self::search_query(categories, start, end);
        let mut papers = Vec::new();
        let mut offset = 0usize;

        while papers.len() < limit {
            let page = self.page_size.min(limit - papers.len());
            debug!(
                offset,
                page, "Requesting arXiv window {} .. {}", start, end
            );

            let response = self
                .client
                .get(&self.base_url)
                .query(&[
                    ("search_query", search_query.as_str()),
                    ("sortBy", "submittedDate"),
                    ("sortOrder", "descending"),
                    ("start", &offset.to_string()),
                    ("max_results", &page.to_string()),
                ])
                .send()
                .await?
                .error_for_status()?;

            let body = response.text().await?;
            let (entries, raw_count) = parse_atom_page(&body)?;
            papers.extend(entries);

            // A short page means the window is exhausted. Judged on the raw
            // entry count: a full page that happens to contain unusable
            // entries must not end the window early.
            if raw_count < page {
                break;
            }
            offset += raw_count;

            tokio::time::sleep(self.request_gap).await;
        }

        info!(
            count = papers.len(),
            "Fetched arXiv window {} .. {}", start, end
        );
        Ok(papers)
    }
}

/// Parse one Atom page of arXiv API results. Returns the converted papers
/// and the raw entry count of the page, which drives pagination even when
/// some entries are unusable.
pub fn parse_atom_page(content: &str) -> Result<(Vec<Paper>, usize)> {
    let feed = feed_rs::parser::parse(content.as_bytes())
        .map_err(|e| PipelineError::Parse(format!("Failed to parse arXiv response: {}", e)))?;

    let raw_count = feed.entries.len();
    let mut papers = Vec::new();
    for entry in feed.entries {
        match entry_to_paper(entry) {
            Some(paper) => papers.push(paper),
            None => warn!("Skipping arXiv entry without a usable date or link"),
        }
    }
    Ok((papers, raw_count))
}

fn entry_to_paper(entry: feed_rs::model::Entry) -> Option<Paper> {
    // Entry ids look like http://arxiv.org/abs/2401.01234v1; the trailing
    // segment is the versioned short id.
    let link = entry.id.clone();
    let short_id = entry.id.rsplit('/').next()?.to_string();
    if short_id.is_empty() {
        return None;
    }

    let title = entry
        .title
        .map(|t| normalize_whitespace(&t.content))
        .unwrap_or_else(|| "Untitled".to_string());
    let abstract_text = entry
        .summary
        .map(|s| normalize_whitespace(&s.content))
        .unwrap_or_default();

    let authors: Vec<String> = entry.authors.into_iter().map(|a| a.name).collect();
    let categories: Vec<String> = entry.categories.into_iter().map(|c| c.term).collect();
    let primary_category = categories.first().cloned();

    let published = entry.published.map(|d| d.with_timezone(&Utc))?;
    let updated = entry.updated.map(|d| d.with_timezone(&Utc));

    let pdf_url = entry
        .links
        .iter()
        .find(|l| {
            l.title.as_deref() == Some("pdf")
                || l.media_type.as_deref() == Some("application/pdf")
        })
        .map(|l| l.href.clone())
        .or_else(|| Some(format!("https://arxiv.org/pdf/{}.pdf", short_id)));

    Some(Paper {
        id: format!("arxiv:{}", short_id),
        title,
        abstract_text,
        authors,
        categories,
        primary_category,
        published,
        updated,
        link,
        pdf_url,
    })
}

/// arXiv wraps titles and abstracts over multiple indented lines.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
