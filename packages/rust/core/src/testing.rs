//! In-memory stores for pipeline tests, with failure injection.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};

use coursebuilder_generation::Generated;

use coursebuilder_shared::{
    CourseBuildJob, CourseBuilderError, CourseId, EntityStore, JobId, JobPatch, JobStatus, LessonId,
    ModuleId, NewCourse, NewLesson, NewModule, ProfilePatch, ProfileStore, QuotaState, Result,
    UserId, UserProfile,
};

use crate::admission::next_quota;

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, CourseBuildJob>,
    /// Every persisted state of every job, in write order.
    snapshots: Vec<CourseBuildJob>,
    courses: Vec<(CourseId, NewCourse)>,
    modules: Vec<(ModuleId, NewModule)>,
    lessons: Vec<(LessonId, NewLesson)>,
    profiles: HashMap<UserId, UserProfile>,
    lesson_writes_before_failure: Option<usize>,
    fail_profile_updates: bool,
    fail_job_completion: bool,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_profile(user: &str) -> Self {
        let store = Self::default();
        store.add_profile(user);
        store
    }

    pub fn add_profile(&self, user: &str) {
        let id = UserId::new(user);
        self.lock().profiles.insert(id.clone(), UserProfile::empty(id));
    }

    pub fn set_quota(&self, user: &str, quota: QuotaState) {
        if let Some(profile) = self.lock().profiles.get_mut(&UserId::new(user)) {
            profile.quota = quota;
        }
    }

    pub fn profile(&self, user: &str) -> UserProfile {
        self.lock().profiles[&UserId::new(user)].clone()
    }

    /// Let `n` lesson inserts succeed, then fail every later one.
    pub fn fail_lessons_after(&self, n: usize) {
        self.lock().lesson_writes_before_failure = Some(n);
    }

    pub fn fail_profile_updates(&self) {
        self.lock().fail_profile_updates = true;
    }

    /// Reject the write that marks a job completed.
    pub fn fail_job_completion(&self) {
        self.lock().fail_job_completion = true;
    }

    pub fn jobs(&self) -> Vec<CourseBuildJob> {
        self.lock().jobs.values().cloned().collect()
    }

    pub fn job_history(&self, id: &JobId) -> Vec<CourseBuildJob> {
        self.lock()
            .snapshots
            .iter()
            .filter(|j| &j.id == id)
            .cloned()
            .collect()
    }

    pub fn courses(&self) -> Vec<(CourseId, NewCourse)> {
        self.lock().courses.clone()
    }

    pub fn modules(&self) -> Vec<(ModuleId, NewModule)> {
        self.lock().modules.clone()
    }

    pub fn lessons(&self) -> Vec<(LessonId, NewLesson)> {
        self.lock().lessons.clone()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn create_job(&self, job: &CourseBuildJob) -> Result<()> {
        let mut inner = self.lock();
        inner.snapshots.push(job.clone());
        inner.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn update_job(&self, id: &JobId, patch: &JobPatch) -> Result<()> {
        let mut inner = self.lock();
        let fail_completion = inner.fail_job_completion;
        let job = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| CourseBuilderError::NotFound(format!("job {id}")))?;
        if job.status.is_terminal() {
            return Err(CourseBuilderError::validation(format!(
                "job {id} is already {}",
                job.status
            )));
        }
        if fail_completion && patch.status == Some(JobStatus::Completed) {
            return Err(CourseBuilderError::Storage("connection reset".into()));
        }
        job.apply(patch);
        let snapshot = job.clone();
        inner.snapshots.push(snapshot);
        Ok(())
    }

    async fn create_course(&self, course: &NewCourse) -> Result<CourseId> {
        let id = CourseId::new();
        self.lock().courses.push((id.clone(), course.clone()));
        Ok(id)
    }

    async fn create_module(&self, module: &NewModule) -> Result<ModuleId> {
        let id = ModuleId::new();
        self.lock().modules.push((id.clone(), module.clone()));
        Ok(id)
    }

    async fn create_lesson(&self, lesson: &NewLesson) -> Result<LessonId> {
        let mut inner = self.lock();
        if let Some(limit) = inner.lesson_writes_before_failure {
            if inner.lessons.len() >= limit {
                return Err(CourseBuilderError::Storage("disk full".into()));
            }
        }
        let id = LessonId::new();
        inner.lessons.push((id.clone(), lesson.clone()));
        Ok(id)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn read_profile(&self, user_id: &UserId) -> Result<UserProfile> {
        self.lock()
            .profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| CourseBuilderError::NotFound(format!("profile {user_id}")))
    }

    async fn update_profile(&self, user_id: &UserId, patch: &ProfilePatch) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_profile_updates {
            return Err(CourseBuilderError::Storage("profile store offline".into()));
        }
        let profile = inner
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| CourseBuilderError::NotFound(format!("profile {user_id}")))?;
        profile.apply(patch);
        Ok(())
    }

    async fn commit_quota(&self, user_id: &UserId, today: NaiveDate) -> Result<QuotaState> {
        let mut inner = self.lock();
        let profile = inner
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| CourseBuilderError::NotFound(format!("profile {user_id}")))?;
        profile.quota = next_quota(&profile.quota, today);
        Ok(profile.quota.clone())
    }
}

// ---------------------------------------------------------------------------
// Generation fixtures
// ---------------------------------------------------------------------------

/// A blueprint value with one module per entry of `lessons_per_module`.
pub fn blueprint_json(title: &str, lessons_per_module: &[usize]) -> Value {
    let modules: Vec<Value> = lessons_per_module
        .iter()
        .enumerate()
        .map(|(m, &count)| {
            let lessons: Vec<Value> = (1..=count)
                .map(|l| {
                    json!({
                        "title": format!("Lesson {}.{l}", m + 1),
                        "order_index": l,
                        "learning_objectives": ["understand", "apply", "evaluate"],
                        "key_concepts_to_cover": ["concept"],
                        "content_summary": "summary",
                    })
                })
                .collect();
            json!({
                "title": format!("Module {}", m + 1),
                "order_index": m + 1,
                "lessons": lessons,
            })
        })
        .collect();

    json!({
        "title": title,
        "description": "A practical course.",
        "difficulty": "beginner",
        "duration_hours": 4,
        "modules": modules,
    })
}

pub fn lesson_json(title: &str, content: &str) -> Value {
    json!({
        "title": title,
        "content": content,
        "lesson_type": "interactive",
        "interactive_config": { "quiz": [] },
        "duration_minutes": 15,
    })
}

pub fn audit_json(flagged: &[&str]) -> Value {
    let feedback: Vec<Value> = flagged
        .iter()
        .map(|id| json!({ "lesson_id": id, "requires_revision": true, "feedback": "Add an example" }))
        .collect();
    json!({ "feedback": feedback })
}

/// Text between the first occurrence of `start` and the next `end`.
fn between<'p>(prompt: &'p str, start: &str, end: &str) -> &'p str {
    prompt
        .split_once(start)
        .and_then(|(_, rest)| rest.split_once(end))
        .map(|(inner, _)| inner)
        .unwrap_or("")
}

/// Answers every pipeline prompt by kind: the given blueprint and audit
/// values, and a lesson body echoing the lesson being written or revised.
pub fn course_responder(
    blueprint: Value,
    audit: Value,
) -> impl Fn(&str) -> std::result::Result<Generated, String> + Send + Sync + 'static {
    move |prompt: &str| {
        if prompt.starts_with("You are a world-class instructional designer") {
            Ok(Generated::Value(blueprint.clone()))
        } else if prompt.starts_with("Write the full lesson content") {
            let title = between(prompt, "for \"", "\"");
            Ok(Generated::Value(lesson_json(title, &format!("Draft of {title}"))))
        } else if prompt.starts_with("You are a meticulous quality assurance editor") {
            Ok(Generated::Value(audit.clone()))
        } else if prompt.starts_with("Revise this lesson DRAFT") {
            let id = between(prompt, "\"lesson_id\": \"", "\"");
            Ok(Generated::Value(lesson_json(
                &format!("Revised {id}"),
                &format!("Revision of {id}"),
            )))
        } else {
            Err(format!("unexpected prompt: {prompt}"))
        }
    }
}
