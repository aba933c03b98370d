use clap::{Parser, Subcommand};
use paper_digest::{
    AppConfig, ArxivSource, HistoryStore, NullTransport, Pipeline, RunStatus, SqliteLedger,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "paper-digest", about = "Fetch, rank and deliver new academic papers")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute one fetch/filter/deliver run
    Run,
    /// List past runs, newest first
    History {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        page_size: usize,
    },
    /// Show one past run in full
    Show { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Command::Run => {
            let source = ArxivSource::new(
                &config.fetch.user_agent,
                config.fetch.timeout_seconds,
                config.fetch.request_gap_seconds,
            )?;
            if config.digest.enabled {
                warn!(
                    "Digest delivery is enabled but this binary has no mail transport; \
                     digests will be logged and dropped, and their papers marked delivered"
                );
            }
            let ledger = Arc::new(SqliteLedger::open(&config.ledger_path).await?);
            let history = Arc::new(HistoryStore::open(&config.history_path).await?);
            let pipeline = Pipeline::new(
                config,
                source,
                ledger,
                history,
                Arc::new(NullTransport),
            );

            let report = pipeline.run().await?;
            if report.status == RunStatus::Partial {
                warn!("Digest delivery failed; papers remain queued for the next run");
            }
            info!(
                fetched = report.fetched,
                matched = report.matched,
                delivered = report.delivered,
                skipped_windows = report.skipped_windows,
                run_id = %report.history_id,
                "Run complete"
            );
            if let Some(path) = report.output_file {
                println!("Feed written to {}", path);
            }
        }
        Command::History { page, page_size } => {
            let history = HistoryStore::open(&config.history_path).await?;
            let listing = history.list(page, page_size).await?;
            println!("{} runs total", listing.total);
            for record in listing.records {
                println!(
                    "{}  {}  {} papers  {}",
                    record.created_at.format("%Y-%m-%d %H:%M:%S"),
                    record.id,
                    record.papers.len(),
                    record.output_file.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Show { id } => {
            let history = HistoryStore::open(&config.history_path).await?;
            let record = history.get(&id).await?;
            println!("Run {} at {}", record.id, record.created_at.to_rfc3339());
            println!("Keywords: {}", record.criteria.keywords.join(", "));
            for item in record.papers {
                println!(
                    "  {:.2}  {}  [{}]",
                    item.score,
                    item.paper.title,
                    item.matched_keywords.join(", ")
                );
            }
        }
    }

    Ok(())
}
