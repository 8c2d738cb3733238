//! Course content types: the generated blueprint, lesson drafts, audit
//! feedback, and the persisted Course → Module → Lesson hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CourseId, LessonId, ModuleId};

// ---------------------------------------------------------------------------
// Blueprint (ephemeral)
// ---------------------------------------------------------------------------

/// Course difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Beginner, Self::Intermediate, Self::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The course outline produced by the blueprint stage. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseBlueprint {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub duration_hours: f64,
    pub modules: Vec<BlueprintModule>,
}

impl CourseBlueprint {
    /// Total number of lesson specs across all modules.
    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }
}

/// One module of the blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintModule {
    pub title: String,
    /// 1-based position within the course.
    pub order_index: u32,
    pub lessons: Vec<LessonSpec>,
}

/// What one lesson must cover, as planned by the blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonSpec {
    pub title: String,
    /// 1-based position within its module.
    pub order_index: u32,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub key_concepts_to_cover: Vec<String>,
    #[serde(default)]
    pub content_summary: String,
}

// ---------------------------------------------------------------------------
// Drafts & audit
// ---------------------------------------------------------------------------

/// Lesson body as returned by a drafting or revision call.
///
/// Optional fields are filled with defaults when converted into a [`LessonDraft`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonBody {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub lesson_type: Option<String>,
    #[serde(default)]
    pub interactive_config: Option<serde_json::Value>,
    #[serde(default)]
    pub duration_minutes: Option<f64>,
}

/// Full lesson content for one lesson spec, before optional revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonDraft {
    /// `"{module_order_index}-{lesson_order_index}"`, unique within a build.
    pub lesson_id: String,
    pub title: String,
    pub content: String,
    pub lesson_type: String,
    pub interactive_config: serde_json::Value,
    pub duration_minutes: u32,
    pub module_order_index: u32,
    pub lesson_order_index: u32,
}

/// Compose the build-unique lesson identifier.
pub fn lesson_id(module_order_index: u32, lesson_order_index: u32) -> String {
    format!("{module_order_index}-{lesson_order_index}")
}

/// Reviewer verdict for one drafted lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFeedback {
    pub lesson_id: String,
    pub requires_revision: bool,
    #[serde(default)]
    pub feedback: String,
}

/// Wrapper object returned by the audit call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    #[serde(default)]
    pub feedback: Vec<AuditFeedback>,
}

// ---------------------------------------------------------------------------
// Persisted hierarchy
// ---------------------------------------------------------------------------

/// Fields for a new course row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub category: String,
    pub duration_hours: f64,
    pub instructor: String,
    pub cover_image: String,
    pub is_published: bool,
}

/// Fields for a new module row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewModule {
    pub course_id: CourseId,
    pub title: String,
    pub order_index: u32,
}

/// Fields for a new lesson row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLesson {
    pub module_id: ModuleId,
    pub title: String,
    pub content: String,
    pub order_index: u32,
    pub duration_minutes: u32,
    pub lesson_type: String,
    pub interactive_config: serde_json::Value,
}

/// A persisted course with its modules and lessons, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: CourseId,
    #[serde(flatten)]
    pub course: NewCourse,
    pub created_at: DateTime<Utc>,
    pub modules: Vec<ModuleRecord>,
}

/// A persisted module with its lessons, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: ModuleId,
    pub title: String,
    pub order_index: u32,
    pub lessons: Vec<LessonRecord>,
}

/// A persisted lesson.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonRecord {
    pub id: LessonId,
    pub title: String,
    pub content: String,
    pub order_index: u32,
    pub duration_minutes: u32,
    pub lesson_type: String,
    pub interactive_config: serde_json::Value,
}
