//! Course build orchestration for CourseBuilder.
//!
//! This crate ties the admission gate, job tracker, and the five generation
//! and persistence stages into one end-to-end build ([`CourseBuilder::build`]).

pub mod admission;
pub mod memory;
pub mod pipeline;
pub mod prompts;
pub mod stages;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use admission::{AdmissionGate, AdmissionPermit, QuotaCheck, check_quota, next_quota};
pub use pipeline::{BuildObserver, BuildRequest, CourseBuilder, SilentObserver};
pub use tracker::JobTracker;
