pub mod adjuster;
pub mod engine;
pub mod factors;
pub mod handlers;
pub mod job_fit;
pub mod model_service;
pub mod skills;
pub mod weights;

pub use adjuster::{HeuristicAdjuster, ScoreAdjuster};
pub use engine::ScoringEngine;
