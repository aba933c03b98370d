use crate::config::FeedConfig;
use crate::types::{FilterCriteria, MatchedPaper, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;

const CATEGORIES_HEADER: &str = "Categories: ";
const KEYWORDS_HEADER: &str = "Matched keywords: ";
const AUTHORS_HEADER: &str = "Authors: ";

/// Structured metadata carried through an item description. Feed readers
/// show it as plain text; the pipeline can reconstruct it losslessly with
/// [`decode_description`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedDescription {
    pub categories: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub authors: Vec<String>,
    pub abstract_text: String,
}

/// Renders the conventional description block: three labelled header
/// paragraphs followed by the abstract.
pub fn encode_description(item: &MatchedPaper) -> String {
    format!(
        "{}{}\n\n{}{}\n\n{}{}\n\n{}",
        CATEGORIES_HEADER,
        item.paper.categories.join(", "),
        KEYWORDS_HEADER,
        item.matched_keywords.join(", "),
        AUTHORS_HEADER,
        item.paper.authors.join(", "),
        item.paper.abstract_text
    )
}

/// Inverse of [`encode_description`]. Header paragraphs that are absent
/// decode to empty lists; everything after the last recognized header is
/// the abstract, so abstracts containing blank lines survive the trip.
pub fn decode_description(text: &str) -> DecodedDescription {
    let mut rest = text;
    let categories = take_header(&mut rest, CATEGORIES_HEADER);
    let matched_keywords = take_header(&mut rest, KEYWORDS_HEADER);
    let authors = take_header(&mut rest, AUTHORS_HEADER);
    DecodedDescription {
        categories,
        matched_keywords,
        authors,
        abstract_text: rest.to_string(),
    }
}

fn take_header(rest: &mut &str, header: &str) -> Vec<String> {
    let Some(after) = rest.strip_prefix(header) else {
        return Vec::new();
    };
    let (value, remainder) = match after.split_once("\n\n") {
        Some((value, remainder)) => (value, remainder),
        None => (after, ""),
    };
    *rest = remainder;
    value
        .split(SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

const SEPARATOR: &str = ", ";

/// Writes one RSS 2.0 document per run, named after the run timestamp and
/// the leading keywords.
pub struct FeedEmitter {
    config: FeedConfig,
}

impl FeedEmitter {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    /// Renders the feed document for the ranked matches.
    pub fn render(&self, items: &[MatchedPaper]) -> String {
        let mut xml = String::with_capacity(1024 + items.len() * 512);
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<rss version=\"2.0\">\n<channel>\n");
        xml.push_str(&format!("<title>{}</title>\n", escape_xml(&self.config.title)));
        xml.push_str(&format!("<link>{}</link>\n", escape_xml(&self.config.link)));
        xml.push_str(&format!(
            "<description>{}</description>\n",
            escape_xml(&self.config.description)
        ));
        xml.push_str(&format!(
            "<lastBuildDate>{}</lastBuildDate>\n",
            Utc::now().to_rfc2822()
        ));

        for item in items {
            xml.push_str("<item>\n");
            xml.push_str(&format!("<title>{}</title>\n", escape_xml(&item.paper.title)));
            xml.push_str(&format!("<link>{}</link>\n", escape_xml(&item.paper.link)));
            xml.push_str(&format!(
                "<guid isPermaLink=\"false\">{}</guid>\n",
                escape_xml(&item.paper.id)
            ));
            xml.push_str(&format!(
                "<pubDate>{}</pubDate>\n",
                item.paper.published.to_rfc2822()
            ));
            for category in &item.paper.categories {
                xml.push_str(&format!(
                    "<category>{}</category>\n",
                    escape_xml(category)
                ));
            }
            if let Some(pdf_url) = &item.paper.pdf_url {
                xml.push_str(&format!(
                    "<enclosure url=\"{}\" length=\"0\" type=\"application/pdf\"/>\n",
                    escape_xml(pdf_url)
                ));
            }
            xml.push_str(&format!(
                "<description>{}</description>\n",
                escape_xml(&encode_description(item))
            ));
            xml.push_str("</item>\n");
        }

        xml.push_str("</channel>\n</rss>\n");
        xml
    }

    /// Renders and writes the feed artifact, returning its path.
    pub async fn write(
        &self,
        items: &[MatchedPaper],
        criteria: &FilterCriteria,
    ) -> Result<PathBuf> {
        let output_dir = Path::new(&self.config.output_dir);
        tokio::fs::create_dir_all(output_dir).await?;
        let filename = format!(
            "{}_{}.xml",
            Utc::now().format("%Y%m%d_%H%M%S"),
            keyword_slug(&criteria.keywords)
        );
        let path = output_dir.join(filename);
        tokio::fs::write(&path, self.render(items)).await?;
        info!(path = %path.display(), items = items.len(), "Feed written");
        Ok(path)
    }
}

/// Filesystem-safe slug from the leading keywords, "all" when none are
/// configured.
pub fn keyword_slug(keywords: &[String]) -> String {
    if keywords.is_empty() {
        return "all".to_string();
    }
    let mut slug: String = keywords
        .iter()
        .take(3)
        .map(|kw| {
            kw.to_lowercase()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("_");
    slug.truncate(40);
    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        "all".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
