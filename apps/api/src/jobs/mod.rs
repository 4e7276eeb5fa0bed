pub mod error;
pub mod events;
pub mod handlers;
pub mod persistence;
pub mod queue;
pub mod registry;
pub mod scheduler;

pub use scheduler::Scheduler;
