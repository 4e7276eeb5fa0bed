pub mod analytics;
pub mod cleanup;
pub mod embeddings;
pub mod matching;
pub mod recommendations;
