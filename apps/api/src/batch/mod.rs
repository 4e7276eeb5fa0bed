pub mod chunking;
pub mod executors;
pub mod handlers;
pub mod orchestrator;
pub mod reports;
pub mod store;

pub use orchestrator::{register_executors, BatchOrchestrator};
pub use reports::S3ReportSink;
pub use store::PgTalentStore;
