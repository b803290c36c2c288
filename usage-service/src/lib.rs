pub mod alerts;
pub mod anomaly;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod observability;
pub mod outbox;
pub mod scheduler;
pub mod server;
pub mod store;

pub use engine::UsageEngine;
pub use error::EngineError;
