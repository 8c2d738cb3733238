//! Core domain types: identifiers, build jobs, and user profiles.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CourseBuilderError;

/// Upper bound for `builds_today` so a runaway counter stays displayable.
pub const MAX_BUILDS_PER_DAY_COUNTER: u32 = 99;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new time-sortable identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Identifier of one course build attempt.
    JobId
);
uuid_id!(
    /// Identifier of a persisted course.
    CourseId
);
uuid_id!(
    /// Identifier of a persisted course module.
    ModuleId
);
uuid_id!(
    /// Identifier of a persisted lesson.
    LessonId
);

/// Identifier of a user, issued by the surrounding auth system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// CourseBuildJob
// ---------------------------------------------------------------------------

/// Lifecycle status of a build job. Terminal once it leaves `Building`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Building,
    Completed,
    Failed,
}

impl JobStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Building => "building",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Building)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = CourseBuilderError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "building" => Ok(Self::Building),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(CourseBuilderError::validation(format!(
                "unknown job status '{other}'"
            ))),
        }
    }
}

/// Durable, pollable record of one course build attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseBuildJob {
    pub id: JobId,
    pub user_id: UserId,
    pub requested_topic: String,
    pub status: JobStatus,
    /// 0–100; reaches 100 only when the job completes.
    pub progress_percentage: u8,
    /// Append-only, each line prefixed with `[N%]` or `[FAILED]`.
    pub logs: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Partial update to a job record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress_percentage: Option<u8>,
    pub logs: Option<Vec<String>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub course_id: Option<CourseId>,
    pub error_message: Option<String>,
}

impl CourseBuildJob {
    /// Apply a patch in memory, mirroring what the store does.
    pub fn apply(&mut self, patch: &JobPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(progress) = patch.progress_percentage {
            self.progress_percentage = progress;
        }
        if let Some(logs) = &patch.logs {
            self.logs = logs.clone();
        }
        if let Some(finished_at) = patch.finished_at {
            self.finished_at = Some(finished_at);
        }
        if let Some(course_id) = &patch.course_id {
            self.course_id = Some(course_id.clone());
        }
        if let Some(message) = &patch.error_message {
            self.error_message = Some(message.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// User profile & quota
// ---------------------------------------------------------------------------

/// Per-user daily build quota, stored on the profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    /// UTC calendar date of the last committed build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_build_date: Option<NaiveDate>,
    /// Builds committed on `last_build_date`, capped at [`MAX_BUILDS_PER_DAY_COUNTER`].
    #[serde(default)]
    pub builds_today: u32,
}

/// The user profile fields this subsystem reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub quota: QuotaState,
    /// Lifetime number of courses this user has built.
    #[serde(default)]
    pub courses_created: u32,
    /// Free-form assistant memory (JSON object).
    #[serde(default)]
    pub agent_memory: serde_json::Value,
}

impl UserProfile {
    /// A fresh profile with no quota used and empty memory.
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            full_name: None,
            job_title: None,
            industry: None,
            experience_level: None,
            quota: QuotaState::default(),
            courses_created: 0,
            agent_memory: serde_json::Value::Object(Default::default()),
        }
    }
}

/// Partial, last-write-wins profile update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub job_title: Option<String>,
    pub industry: Option<String>,
    pub experience_level: Option<String>,
    pub courses_created: Option<u32>,
    pub agent_memory: Option<serde_json::Value>,
}

impl UserProfile {
    /// Apply a patch in memory, mirroring what the store does.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(v) = &patch.full_name {
            self.full_name = Some(v.clone());
        }
        if let Some(v) = &patch.job_title {
            self.job_title = Some(v.clone());
        }
        if let Some(v) = &patch.industry {
            self.industry = Some(v.clone());
        }
        if let Some(v) = &patch.experience_level {
            self.experience_level = Some(v.clone());
        }
        if let Some(v) = patch.courses_created {
            self.courses_created = v;
        }
        if let Some(v) = &patch.agent_memory {
            self.agent_memory = v.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_roundtrip() {
        let id = JobId::new();
        let s = id.to_string();
        let parsed: JobId = s.parse().expect("parse JobId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn job_status_parsing() {
        assert_eq!("building".parse::<JobStatus>().unwrap(), JobStatus::Building);
        assert_eq!("failed".parse::<JobStatus>().unwrap(), JobStatus::Failed);
        assert!("paused".parse::<JobStatus>().is_err());
        assert!(!JobStatus::Building.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
    }

    #[test]
    fn job_patch_leaves_unset_fields() {
        let mut job = CourseBuildJob {
            id: JobId::new(),
            user_id: UserId::new("u1"),
            requested_topic: "rust".into(),
            status: JobStatus::Building,
            progress_percentage: 20,
            logs: vec!["[0%] Starting build for \"rust\"".into()],
            started_at: Utc::now(),
            finished_at: None,
            course_id: None,
            error_message: None,
        };

        job.apply(&JobPatch {
            progress_percentage: Some(40),
            ..Default::default()
        });

        assert_eq!(job.progress_percentage, 40);
        assert_eq!(job.status, JobStatus::Building);
        assert_eq!(job.logs.len(), 1);
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn job_serialization_omits_unset_terminal_fields() {
        let job = CourseBuildJob {
            id: JobId::new(),
            user_id: UserId::new("u1"),
            requested_topic: "rust".into(),
            status: JobStatus::Building,
            progress_percentage: 0,
            logs: vec![],
            started_at: Utc::now(),
            finished_at: None,
            course_id: None,
            error_message: None,
        };
        let json = serde_json::to_string(&job).expect("serialize");
        assert!(json.contains(r#""status":"building""#));
        assert!(!json.contains("course_id"));
        assert!(!json.contains("error_message"));
    }

    #[test]
    fn profile_patch_is_partial() {
        let mut profile = UserProfile::empty(UserId::new("u1"));
        profile.job_title = Some("Analyst".into());

        profile.apply(&ProfilePatch {
            industry: Some("Finance".into()),
            courses_created: Some(3),
            ..Default::default()
        });

        assert_eq!(profile.job_title.as_deref(), Some("Analyst"));
        assert_eq!(profile.industry.as_deref(), Some("Finance"));
        assert_eq!(profile.courses_created, 3);
    }
}
