//! The five build stages, run strictly in order by the orchestrator.
//!
//! Each stage reports its own progress through the [`JobTracker`](crate::tracker::JobTracker).

pub mod audit;
pub mod blueprint;
pub mod drafting;
pub mod persistence;
pub mod revision;
