pub mod config;
pub mod digest;
pub mod feed;
pub mod fetcher;
pub mod filter;
pub mod history;
pub mod ledger;
pub mod pipeline;
pub mod scorer;
pub mod sources;
pub mod types;

pub use config::AppConfig;
pub use digest::{DigestBuilder, DigestMessage, DigestTransport, NullTransport};
pub use feed::{decode_description, encode_description, FeedEmitter};
pub use fetcher::WindowedFetcher;
pub use filter::PaperFilter;
pub use history::{HistoryPage, HistoryStore};
pub use ledger::{DeliveryLedger, MemoryLedger, SqliteLedger};
pub use pipeline::Pipeline;
pub use scorer::Scorer;
pub use sources::{ArxivSource, OpenReviewSource, PaperSource};
pub use types::*;
