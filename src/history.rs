use crate::types::{FilterCriteria, HistoryRecord, MatchedPaper, PipelineError, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Append-only record of past runs: what was searched for, what matched,
/// and which artifact was written. Never pruned by the pipeline.
pub struct HistoryStore {
    pool: SqlitePool,
}

/// One page of history, newest runs first, plus the total run count so
/// callers can render page controls.
#[derive(Debug)]
pub struct HistoryPage {
    pub records: Vec<HistoryRecord>,
    pub total: usize,
}

impl HistoryStore {
    pub async fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                criteria TEXT NOT NULL,
                papers TEXT NOT NULL,
                output_file TEXT
            )",
        )
        .execute(&pool)
        .await?;

        info!(path, "History store opened");
        Ok(Self { pool })
    }

    /// Persists a run and returns its generated id.
    pub async fn append(
        &self,
        criteria: &FilterCriteria,
        papers: &[MatchedPaper],
        output_file: Option<&str>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO runs (id, created_at, criteria, papers, output_file)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        // Fixed-width timestamps keep the textual ORDER BY chronological.
        .bind(created_at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
        .bind(serde_json::to_string(criteria)?)
        .bind(serde_json::to_string(papers)?)
        .bind(output_file)
        .execute(&self.pool)
        .await?;
        debug!(run_id = %id, papers = papers.len(), "Run appended to history");
        Ok(id)
    }

    /// Lists runs newest first. `page` is 1-based; a page past the end is an
    /// empty page, not an error.
    pub async fn list(&self, page: usize, page_size: usize) -> Result<HistoryPage> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let total_row = sqlx::query("SELECT COUNT(*) AS n FROM runs")
            .fetch_one(&self.pool)
            .await?;
        let total = total_row.get::<i64, _>("n") as usize;

        let rows = sqlx::query(
            "SELECT id, created_at, criteria, papers, output_file
             FROM runs ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(page_size as i64)
        .bind(((page - 1) * page_size) as i64)
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .into_iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(HistoryPage { records, total })
    }

    pub async fn get(&self, id: &str) -> Result<HistoryRecord> {
        let row = sqlx::query(
            "SELECT id, created_at, criteria, papers, output_file FROM runs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => row_to_record(row),
            None => Err(PipelineError::RunNotFound { id: id.to_string() }),
        }
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<HistoryRecord> {
    let created_at_raw: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
        .map_err(|e| PipelineError::Parse(format!("bad run timestamp: {}", e)))?
        .with_timezone(&Utc);
    Ok(HistoryRecord {
        id: row.get("id"),
        created_at,
        criteria: serde_json::from_str(&row.get::<String, _>("criteria"))?,
        papers: serde_json::from_str(&row.get::<String, _>("papers"))?,
        output_file: row.get("output_file"),
    })
}
