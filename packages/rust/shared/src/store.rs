//! Storage contracts consumed by the build pipeline.
//!
//! [`EntityStore`] persists job records and the course hierarchy;
//! [`ProfileStore`] reads and updates user profiles, including the atomic
//! quota commit. `coursebuilder-storage` implements both over libSQL.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::course::{NewCourse, NewLesson, NewModule};
use crate::error::Result;
use crate::types::{
    CourseBuildJob, CourseId, JobId, JobPatch, LessonId, ModuleId, ProfilePatch, QuotaState,
    UserId, UserProfile,
};

/// Create/update access to durable records. No domain logic.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert a new job record.
    async fn create_job(&self, job: &CourseBuildJob) -> Result<()>;

    /// Apply a partial update to an existing job record.
    async fn update_job(&self, id: &JobId, patch: &JobPatch) -> Result<()>;

    /// Insert a course row and return its id.
    async fn create_course(&self, course: &NewCourse) -> Result<CourseId>;

    /// Insert a module row and return its id.
    async fn create_module(&self, module: &NewModule) -> Result<ModuleId>;

    /// Insert a lesson row and return its id.
    async fn create_lesson(&self, lesson: &NewLesson) -> Result<LessonId>;
}

/// User profile access.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Read a profile. Fails with `NotFound` for unknown users.
    async fn read_profile(&self, user_id: &UserId) -> Result<UserProfile>;

    /// Partial, last-write-wins update.
    async fn update_profile(&self, user_id: &UserId, patch: &ProfilePatch) -> Result<()>;

    /// Record one committed build for `today` as a single atomic update and
    /// return the resulting quota.
    ///
    /// Same day: `builds_today = min(builds_today + 1, 99)`.
    /// Otherwise: `last_build_date = today, builds_today = 1`.
    async fn commit_quota(&self, user_id: &UserId, today: NaiveDate) -> Result<QuotaState>;
}
