use crate::types::{MatchedPaper, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Records which papers have already been delivered, across runs. Delivery
/// is recorded only after the downstream send succeeds, so a crash between
/// send and record re-delivers rather than silently drops.
#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// Drops the papers that were already delivered, preserving order.
    async fn filter_new(&self, papers: Vec<MatchedPaper>) -> Result<Vec<MatchedPaper>>;

    /// Marks all of `ids` delivered. The whole batch is committed
    /// atomically; recording an id twice is a no-op.
    async fn record_delivered(&self, ids: &[String]) -> Result<()>;

    async fn len(&self) -> Result<usize>;
}

/// SQLite-backed ledger. The parent directory is created on open so a fresh
/// deployment works without manual setup.
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
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
            "CREATE TABLE IF NOT EXISTS delivered_papers (
                paper_id TEXT PRIMARY KEY,
                delivered_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        info!(path, "Delivery ledger opened");
        Ok(Self { pool })
    }
}

#[async_trait]
impl DeliveryLedger for SqliteLedger {
    async fn filter_new(&self, papers: Vec<MatchedPaper>) -> Result<Vec<MatchedPaper>> {
        let rows = sqlx::query("SELECT paper_id FROM delivered_papers")
            .fetch_all(&self.pool)
            .await?;
        let delivered: HashSet<String> = rows
            .into_iter()
            .map(|row| row.get::<String, _>("paper_id"))
            .collect();

        let before = papers.len();
        let new: Vec<MatchedPaper> = papers
            .into_iter()
            .filter(|m| !delivered.contains(&m.paper.id))
            .collect();
        debug!(
            before,
            new = new.len(),
            "Ledger filtered previously delivered papers"
        );
        Ok(new)
    }

    async fn record_delivered(&self, ids: &[String]) -> Result<()> {
        let delivered_at = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query(
                "INSERT OR IGNORE INTO delivered_papers (paper_id, delivered_at) VALUES (?, ?)",
            )
            .bind(id)
            .bind(&delivered_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(count = ids.len(), "Deliveries recorded");
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM delivered_papers")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") as usize)
    }
}

/// In-memory ledger for tests and dry runs.
#[derive(Default)]
pub struct MemoryLedger {
    delivered: RwLock<HashSet<String>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryLedger for MemoryLedger {
    async fn filter_new(&self, papers: Vec<MatchedPaper>) -> Result<Vec<MatchedPaper>> {
        let delivered = self.delivered.read().await;
        Ok(papers
            .into_iter()
            .filter(|m| !delivered.contains(&m.paper.id))
            .collect())
    }

    async fn record_delivered(&self, ids: &[String]) -> Result<()> {
        let mut delivered = self.delivered.write().await;
        for id in ids {
            delivered.insert(id.clone());
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.delivered.read().await.len())
    }
}
