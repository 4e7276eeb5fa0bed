pub mod batch;
pub mod candidate;
pub mod common;
pub mod posting;
