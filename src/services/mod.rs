pub mod engine;
pub mod indicators;
pub mod ingest;
pub mod patterns;
pub mod signals;
pub mod sqlite_store;
pub mod window;
pub mod workflow;

pub use engine::SignalEngine;
pub use indicators::IndicatorCalculator;
pub use ingest::Ingestor;
pub use patterns::PatternScanner;
pub use signals::Classifier;
pub use sqlite_store::SqliteStore;
pub use window::{Day, IndexWindows, StockWindows, Window, WindowStore};
