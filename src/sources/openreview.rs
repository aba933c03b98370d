use crate::sources::PaperSource;
use crate::types::{Paper, PipelineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api2.openreview.net";

/// Source backed by the OpenReview notes API for a single conference venue.
///
/// Conference papers carry the venue id as their category tag; they are
/// ranked independently of arXiv papers, no cross-source ordering is
/// attempted.
pub struct OpenReviewSource {
    client: Client,
    base_url: String,
    venue_id: String,
    conference_name: String,
    page_size: usize,
    request_gap: Duration,
}

impl OpenReviewSource {
    pub fn new(
        venue_id: impl Into<String>,
        conference_name: impl Into<String>,
        user_agent: &str,
        timeout_seconds: u64,
        request_gap_seconds: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_seconds))
            .gzip(true)
            .build()
            .map_err(PipelineError::Http)?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            venue_id: venue_id.into(),
            conference_name: conference_name.into(),
            page_size: 1000,
            request_gap: Duration::from_secs(request_gap_seconds),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PaperSource for OpenReviewSource {
    fn source_name(&self) -> &str {
        "openreview"
    }

    async fn fetch_window(
        &self,
        _categories: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Paper>> {
        let mut papers = Vec::new();
        let mut offset = 0usize;

        while papers.len() < limit {
            debug!(offset, venue = %self.venue_id, "Requesting OpenReview notes");

            let body = self
                .client
                .get(format!("{}/notes", self.base_url))
                .query(&[
                    ("content.venueid", self.venue_id.as_str()),
                    ("limit", &self.page_size.to_string()),
                    ("offset", &offset.to_string()),
                ])
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;

            let (page, count) = parse_notes_page(&body, &self.venue_id, &self.conference_name)?;
            for paper in page {
                // The notes endpoint is not windowed, so the window is
                // applied here on the note creation time.
                if paper.published >= start && paper.published < end {
                    papers.push(paper);
                }
            }

            if count < self.page_size {
                break;
            }
            offset += count;
            tokio::time::sleep(self.request_gap).await;
        }

        info!(
            count = papers.len(),
            venue = %self.venue_id,
            "Fetched OpenReview window {} .. {}",
            start,
            end
        );
        Ok(papers)
    }
}

/// Parse one page of the notes endpoint. Returns the converted papers and
/// the raw note count of the page, which drives pagination even when some
/// notes are unusable.
pub fn parse_notes_page(
    json: &str,
    venue_id: &str,
    conference_name: &str,
) -> Result<(Vec<Paper>, usize)> {
    let response: NotesResponse = serde_json::from_str(json)?;
    let count = response.notes.len();
    let papers = response
        .notes
        .into_iter()
        .filter_map(|note| note_to_paper(note, venue_id, conference_name))
        .collect();
    Ok((papers, count))
}

#[derive(Debug, Deserialize)]
struct NotesResponse {
    #[serde(default)]
    notes: Vec<Note>,
}

#[derive(Debug, Deserialize)]
struct Note {
    id: String,
    /// Creation and modification times in epoch milliseconds.
    cdate: Option<i64>,
    mdate: Option<i64>,
    content: NoteContent,
}

/// OpenReview API v2 wraps every content field in `{"value": ...}`.
#[derive(Debug, Deserialize, Default)]
struct NoteContent {
    title: Option<ValueField<String>>,
    #[serde(rename = "abstract")]
    abstract_text: Option<ValueField<String>>,
    authors: Option<ValueField<Vec<String>>>,
}

#[derive(Debug, Deserialize)]
struct ValueField<T> {
    value: T,
}

fn note_to_paper(note: Note, venue_id: &str, conference_name: &str) -> Option<Paper> {
    let published = epoch_ms_to_datetime(note.cdate?)?;
    let updated = note.mdate.and_then(epoch_ms_to_datetime);

    let title = note
        .content
        .title
        .map(|t| t.value)
        .unwrap_or_else(|| "Untitled".to_string());
    let abstract_text = note.content.abstract_text.map(|a| a.value).unwrap_or_default();
    let authors = note.content.authors.map(|a| a.value).unwrap_or_default();

    Some(Paper {
        id: format!("openreview:{}", note.id),
        title,
        abstract_text,
        authors,
        categories: vec![venue_id.to_string(), conference_name.to_string()],
        primary_category: Some(venue_id.to_string()),
        published,
        updated,
        link: format!("https://openreview.net/forum?id={}", note.id),
        pdf_url: Some(format!("https://openreview.net/pdf?id={}", note.id)),
    })
}

fn epoch_ms_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
