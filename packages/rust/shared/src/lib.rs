//! Shared types, error model, configuration, and store contracts for CourseBuilder.
//!
//! This crate is the foundation depended on by all other CourseBuilder crates.
//! It provides:
//! - [`CourseBuilderError`] — the unified error type
//! - Domain types ([`CourseBuildJob`], [`CourseBlueprint`], [`LessonDraft`], [`UserProfile`], ...)
//! - Configuration ([`AppConfig`], config loading)
//! - Storage contracts ([`EntityStore`], [`ProfileStore`])

pub mod config;
pub mod course;
pub mod error;
pub mod store;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CourseDefaultsConfig, DefaultsConfig, OpenRouterConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, read_api_key,
    resolve_database_path, validate_api_key,
};
pub use course::{
    AuditFeedback, AuditReport, BlueprintModule, CourseBlueprint, CourseRecord, Difficulty,
    LessonBody, LessonDraft, LessonRecord, LessonSpec, ModuleRecord, NewCourse, NewLesson,
    NewModule, lesson_id,
};
pub use error::{CourseBuilderError, Result};
pub use store::{EntityStore, ProfileStore};
pub use types::{
    CourseBuildJob, CourseId, JobId, JobPatch, JobStatus, LessonId, MAX_BUILDS_PER_DAY_COUNTER,
    ModuleId, ProfilePatch, QuotaState, UserId, UserProfile,
};
