//! Turso Embedded / libSQL storage layer.
//!
//! The [`Storage`] struct wraps a libSQL database holding user profiles
//! (quota, counters, memory), course build jobs, and the persisted
//! Course → Module → Lesson hierarchy. It implements both
//! [`EntityStore`] and [`ProfileStore`].
//!
//! **Access rules:**
//! - Build pipeline: read-write via [`Storage::open`]
//! - Job polling: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use coursebuilder_shared::{
    CourseBuildJob, CourseBuilderError, CourseId, CourseRecord, Difficulty, EntityStore, JobId,
    JobPatch, JobStatus, LessonId, LessonRecord, ModuleId, ModuleRecord, NewCourse, NewLesson,
    NewModule, ProfilePatch, ProfileStore, QuotaState, Result, UserId, UserProfile,
};
use libsql::{Connection, Database, params};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn storage_err(e: impl std::fmt::Display) -> CourseBuilderError {
    CourseBuilderError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CourseBuilderError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode (job polling).
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CourseBuilderError::NotFound(format!(
                "database {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        CourseBuilderError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(CourseBuilderError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Profile operations
    // -----------------------------------------------------------------------

    /// Create an empty profile for `user_id` if none exists yet.
    pub async fn ensure_profile(&self, user_id: &UserId) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO user_profiles (user_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO NOTHING",
                params![user_id.as_str(), now.as_str(), now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Get a profile by user ID.
    pub async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
        let mut rows = self
            .conn
            .query(
                "SELECT user_id, full_name, job_title, industry, experience_level,
                        last_build_date, builds_today, courses_created, agent_memory_json
                 FROM user_profiles WHERE user_id = ?1",
                params![user_id.as_str()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_profile(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Apply a partial profile update. Unset fields keep their stored value.
    pub async fn patch_profile(&self, user_id: &UserId, patch: &ProfilePatch) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let memory_json = patch
            .agent_memory
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let changed = self
            .conn
            .execute(
                "UPDATE user_profiles SET
                   full_name = COALESCE(?1, full_name),
                   job_title = COALESCE(?2, job_title),
                   industry = COALESCE(?3, industry),
                   experience_level = COALESCE(?4, experience_level),
                   courses_created = COALESCE(?5, courses_created),
                   agent_memory_json = COALESCE(?6, agent_memory_json),
                   updated_at = ?7
                 WHERE user_id = ?8",
                params![
                    patch.full_name.as_deref(),
                    patch.job_title.as_deref(),
                    patch.industry.as_deref(),
                    patch.experience_level.as_deref(),
                    patch.courses_created.map(i64::from),
                    memory_json.as_deref(),
                    now.as_str(),
                    user_id.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;

        if changed == 0 {
            return Err(CourseBuilderError::NotFound(format!("profile {user_id}")));
        }
        Ok(())
    }

    /// Record one committed build in a single conditional update.
    ///
    /// The day comparison and the increment happen inside one statement, so two
    /// concurrent commits can never both observe the same starting count.
    pub async fn record_build(&self, user_id: &UserId, today: NaiveDate) -> Result<QuotaState> {
        self.check_writable()?;
        let today_str = today.format("%Y-%m-%d").to_string();
        let now = Utc::now().to_rfc3339();

        let changed = self
            .conn
            .execute(
                "UPDATE user_profiles SET
                   builds_today = CASE
                     WHEN last_build_date = ?1 THEN MIN(builds_today + 1, ?2)
                     ELSE 1
                   END,
                   last_build_date = ?1,
                   updated_at = ?3
                 WHERE user_id = ?4",
                params![
                    today_str.as_str(),
                    i64::from(coursebuilder_shared::MAX_BUILDS_PER_DAY_COUNTER),
                    now.as_str(),
                    user_id.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;

        if changed == 0 {
            return Err(CourseBuilderError::NotFound(format!("profile {user_id}")));
        }

        self.get_profile(user_id)
            .await?
            .map(|p| p.quota)
            .ok_or_else(|| CourseBuilderError::NotFound(format!("profile {user_id}")))
    }

    // -----------------------------------------------------------------------
    // Job operations
    // -----------------------------------------------------------------------

    /// Insert a new build job record.
    pub async fn insert_job(&self, job: &CourseBuildJob) -> Result<()> {
        self.check_writable()?;
        let logs_json = serde_json::to_string(&job.logs)?;
        self.conn
            .execute(
                "INSERT INTO course_build_jobs
                   (id, user_id, requested_topic, status, progress_percentage, logs_json,
                    started_at, finished_at, course_id, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    job.id.to_string(),
                    job.user_id.as_str(),
                    job.requested_topic.as_str(),
                    job.status.as_str(),
                    i64::from(job.progress_percentage),
                    logs_json,
                    job.started_at.to_rfc3339(),
                    job.finished_at.map(|t| t.to_rfc3339()),
                    job.course_id.as_ref().map(|c| c.to_string()),
                    job.error_message.as_deref(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Apply a partial update to a job that is still `building`.
    ///
    /// Terminal jobs are immutable: patching one is a validation error.
    pub async fn patch_job(&self, id: &JobId, patch: &JobPatch) -> Result<()> {
        self.check_writable()?;
        let logs_json = patch.logs.as_ref().map(serde_json::to_string).transpose()?;

        let changed = self
            .conn
            .execute(
                "UPDATE course_build_jobs SET
                   status = COALESCE(?1, status),
                   progress_percentage = COALESCE(?2, progress_percentage),
                   logs_json = COALESCE(?3, logs_json),
                   finished_at = COALESCE(?4, finished_at),
                   course_id = COALESCE(?5, course_id),
                   error_message = COALESCE(?6, error_message)
                 WHERE id = ?7 AND status = 'building'",
                params![
                    patch.status.map(|s| s.as_str()),
                    patch.progress_percentage.map(i64::from),
                    logs_json.as_deref(),
                    patch.finished_at.map(|t| t.to_rfc3339()),
                    patch.course_id.as_ref().map(|c| c.to_string()),
                    patch.error_message.as_deref(),
                    id.to_string(),
                ],
            )
            .await
            .map_err(storage_err)?;

        if changed == 0 {
            return match self.get_job(id).await? {
                Some(job) => Err(CourseBuilderError::validation(format!(
                    "job {id} is already {}",
                    job.status
                ))),
                None => Err(CourseBuilderError::NotFound(format!("job {id}"))),
            };
        }
        Ok(())
    }

    /// Get a job by ID.
    pub async fn get_job(&self, id: &JobId) -> Result<Option<CourseBuildJob>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, requested_topic, status, progress_percentage, logs_json,
                        started_at, finished_at, course_id, error_message
                 FROM course_build_jobs WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_job(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// List a user's jobs, newest first.
    pub async fn list_jobs_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<CourseBuildJob>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, requested_topic, status, progress_percentage, logs_json,
                        started_at, finished_at, course_id, error_message
                 FROM course_build_jobs WHERE user_id = ?1
                 ORDER BY started_at DESC, id DESC
                 LIMIT ?2",
                params![user_id.as_str(), limit],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_job(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Course hierarchy operations
    // -----------------------------------------------------------------------

    /// Insert a course row. Returns the generated course ID.
    pub async fn insert_course(&self, course: &NewCourse) -> Result<CourseId> {
        self.check_writable()?;
        let id = CourseId::new();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO courses
                   (id, title, description, difficulty, category, duration_hours,
                    instructor, cover_image, is_published, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id.to_string(),
                    course.title.as_str(),
                    course.description.as_str(),
                    course.difficulty.as_str(),
                    course.category.as_str(),
                    course.duration_hours,
                    course.instructor.as_str(),
                    course.cover_image.as_str(),
                    i64::from(course.is_published),
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(id)
    }

    /// Insert a module row. Returns the generated module ID.
    pub async fn insert_module(&self, module: &NewModule) -> Result<ModuleId> {
        self.check_writable()?;
        let id = ModuleId::new();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO modules (id, course_id, title, order_index, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    module.course_id.to_string(),
                    module.title.as_str(),
                    module.order_index,
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(id)
    }

    /// Insert a lesson row. Returns the generated lesson ID.
    pub async fn insert_lesson(&self, lesson: &NewLesson) -> Result<LessonId> {
        self.check_writable()?;
        let id = LessonId::new();
        let now = Utc::now().to_rfc3339();
        let config_json = serde_json::to_string(&lesson.interactive_config)?;
        self.conn
            .execute(
                "INSERT INTO lessons
                   (id, module_id, title, content, order_index, duration_minutes,
                    lesson_type, interactive_config_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.to_string(),
                    lesson.module_id.to_string(),
                    lesson.title.as_str(),
                    lesson.content.as_str(),
                    lesson.order_index,
                    lesson.duration_minutes,
                    lesson.lesson_type.as_str(),
                    config_json,
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(id)
    }

    /// Load a course with its modules and lessons, both in `order_index` order.
    pub async fn get_course(&self, id: &CourseId) -> Result<Option<CourseRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, description, difficulty, category, duration_hours,
                        instructor, cover_image, is_published, created_at
                 FROM courses WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(storage_err(e)),
        };

        let difficulty_str: String = row.get(3).map_err(storage_err)?;
        let course = NewCourse {
            title: row.get::<String>(1).map_err(storage_err)?,
            description: row.get::<String>(2).map_err(storage_err)?,
            difficulty: parse_difficulty(&difficulty_str)?,
            category: row.get::<String>(4).map_err(storage_err)?,
            duration_hours: row.get::<f64>(5).map_err(storage_err)?,
            instructor: row.get::<String>(6).map_err(storage_err)?,
            cover_image: row.get::<String>(7).map_err(storage_err)?,
            is_published: row.get::<i64>(8).map_err(storage_err)? != 0,
        };
        let created_at = parse_timestamp(&row.get::<String>(9).map_err(storage_err)?)?;

        let mut modules = self.list_modules(id).await?;
        for module in &mut modules {
            module.lessons = self.list_lessons(&module.id).await?;
        }

        Ok(Some(CourseRecord {
            id: id.clone(),
            course,
            created_at,
            modules,
        }))
    }

    async fn list_modules(&self, course_id: &CourseId) -> Result<Vec<ModuleRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, order_index FROM modules
                 WHERE course_id = ?1 ORDER BY order_index",
                params![course_id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(ModuleRecord {
                id: parse_id(&row.get::<String>(0).map_err(storage_err)?)?,
                title: row.get::<String>(1).map_err(storage_err)?,
                order_index: row.get::<u32>(2).map_err(storage_err)?,
                lessons: Vec::new(),
            });
        }
        Ok(results)
    }

    async fn list_lessons(&self, module_id: &ModuleId) -> Result<Vec<LessonRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, content, order_index, duration_minutes, lesson_type,
                        interactive_config_json
                 FROM lessons WHERE module_id = ?1 ORDER BY order_index",
                params![module_id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let config_json: String = row.get(6).map_err(storage_err)?;
            results.push(LessonRecord {
                id: parse_id(&row.get::<String>(0).map_err(storage_err)?)?,
                title: row.get::<String>(1).map_err(storage_err)?,
                content: row.get::<String>(2).map_err(storage_err)?,
                order_index: row.get::<u32>(3).map_err(storage_err)?,
                duration_minutes: row.get::<u32>(4).map_err(storage_err)?,
                lesson_type: row.get::<String>(5).map_err(storage_err)?,
                interactive_config: serde_json::from_str(&config_json)?,
            });
        }
        Ok(results)
    }

    /// Number of courses stored.
    pub async fn count_courses(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM courses", params![])
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<u64>(0).map_err(storage_err)?),
            Ok(None) => Ok(0),
            Err(e) => Err(storage_err(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Contract implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl EntityStore for Storage {
    async fn create_job(&self, job: &CourseBuildJob) -> Result<()> {
        self.insert_job(job).await
    }

    async fn update_job(&self, id: &JobId, patch: &JobPatch) -> Result<()> {
        self.patch_job(id, patch).await
    }

    async fn create_course(&self, course: &NewCourse) -> Result<CourseId> {
        self.insert_course(course).await
    }

    async fn create_module(&self, module: &NewModule) -> Result<ModuleId> {
        self.insert_module(module).await
    }

    async fn create_lesson(&self, lesson: &NewLesson) -> Result<LessonId> {
        self.insert_lesson(lesson).await
    }
}

#[async_trait]
impl ProfileStore for Storage {
    async fn read_profile(&self, user_id: &UserId) -> Result<UserProfile> {
        self.get_profile(user_id)
            .await?
            .ok_or_else(|| CourseBuilderError::NotFound(format!("profile {user_id}")))
    }

    async fn update_profile(&self, user_id: &UserId, patch: &ProfilePatch) -> Result<()> {
        self.patch_profile(user_id, patch).await
    }

    async fn commit_quota(&self, user_id: &UserId, today: NaiveDate) -> Result<QuotaState> {
        self.record_build(user_id, today).await
    }
}

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CourseBuilderError::Storage(format!("invalid date '{s}': {e}")))
}

fn parse_id<T: std::str::FromStr<Err = uuid::Error>>(s: &str) -> Result<T> {
    s.parse()
        .map_err(|e| CourseBuilderError::Storage(format!("invalid id '{s}': {e}")))
}

fn parse_difficulty(s: &str) -> Result<Difficulty> {
    Difficulty::ALL
        .into_iter()
        .find(|d| d.as_str() == s)
        .ok_or_else(|| CourseBuilderError::Storage(format!("invalid difficulty '{s}'")))
}

/// Convert a database row to a [`CourseBuildJob`].
fn row_to_job(row: &libsql::Row) -> Result<CourseBuildJob> {
    let status: String = row.get(3).map_err(storage_err)?;
    let logs_json: String = row.get(5).map_err(storage_err)?;
    let started_at: String = row.get(6).map_err(storage_err)?;

    Ok(CourseBuildJob {
        id: parse_id(&row.get::<String>(0).map_err(storage_err)?)?,
        user_id: UserId::new(row.get::<String>(1).map_err(storage_err)?),
        requested_topic: row.get::<String>(2).map_err(storage_err)?,
        status: status.parse::<JobStatus>()?,
        progress_percentage: row.get::<u32>(4).map_err(storage_err)?.min(100) as u8,
        logs: serde_json::from_str(&logs_json)?,
        started_at: parse_timestamp(&started_at)?,
        finished_at: row
            .get::<String>(7)
            .ok()
            .map(|s| parse_timestamp(&s))
            .transpose()?,
        course_id: row
            .get::<String>(8)
            .ok()
            .map(|s| parse_id(&s))
            .transpose()?,
        error_message: row.get::<String>(9).ok(),
    })
}

/// Convert a database row to a [`UserProfile`].
fn row_to_profile(row: &libsql::Row) -> Result<UserProfile> {
    let memory_json: String = row.get(8).map_err(storage_err)?;

    Ok(UserProfile {
        user_id: UserId::new(row.get::<String>(0).map_err(storage_err)?),
        full_name: row.get::<String>(1).ok(),
        job_title: row.get::<String>(2).ok(),
        industry: row.get::<String>(3).ok(),
        experience_level: row.get::<String>(4).ok(),
        quota: QuotaState {
            last_build_date: row
                .get::<String>(5)
                .ok()
                .map(|s| {
                    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| {
                        CourseBuilderError::Storage(format!("invalid build date '{s}': {e}"))
                    })
                })
                .transpose()?,
            builds_today: row.get::<u32>(6).map_err(storage_err)?,
        },
        courses_created: row.get::<u32>(7).map_err(storage_err)?,
        agent_memory: serde_json::from_str(&memory_json)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("cb_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn new_job(user: &str) -> CourseBuildJob {
        CourseBuildJob {
            id: JobId::new(),
            user_id: UserId::new(user),
            requested_topic: "prompt engineering".into(),
            status: JobStatus::Building,
            progress_percentage: 0,
            logs: vec!["[0%] Starting build for \"prompt engineering\"".into()],
            started_at: Utc::now(),
            finished_at: None,
            course_id: None,
            error_message: None,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("cb_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn job_lifecycle() {
        let storage = test_storage().await;
        let job = new_job("u1");
        storage.create_job(&job).await.expect("insert job");

        let mut logs = job.logs.clone();
        logs.push("[5%] Designing Course Blueprint: ...".into());
        storage
            .update_job(
                &job.id,
                &JobPatch {
                    progress_percentage: Some(5),
                    logs: Some(logs),
                    ..Default::default()
                },
            )
            .await
            .expect("report progress");

        let polled = storage.get_job(&job.id).await.unwrap().expect("job exists");
        assert_eq!(polled.status, JobStatus::Building);
        assert_eq!(polled.progress_percentage, 5);
        assert_eq!(polled.logs.len(), 2);
        assert!(polled.finished_at.is_none());

        let course_id = CourseId::new();
        storage
            .update_job(
                &job.id,
                &JobPatch {
                    status: Some(JobStatus::Completed),
                    progress_percentage: Some(100),
                    finished_at: Some(Utc::now()),
                    course_id: Some(course_id.clone()),
                    ..Default::default()
                },
            )
            .await
            .expect("finalize");

        let polled = storage.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(polled.status, JobStatus::Completed);
        assert_eq!(polled.progress_percentage, 100);
        assert_eq!(polled.course_id, Some(course_id));
        assert!(polled.finished_at.is_some());
        assert!(polled.error_message.is_none());
    }

    #[tokio::test]
    async fn terminal_job_is_immutable() {
        let storage = test_storage().await;
        let job = new_job("u1");
        storage.create_job(&job).await.unwrap();
        storage
            .update_job(
                &job.id,
                &JobPatch {
                    status: Some(JobStatus::Failed),
                    error_message: Some("boom".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = storage
            .update_job(
                &job.id,
                &JobPatch {
                    progress_percentage: Some(50),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already failed"));

        let polled = storage.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(polled.progress_percentage, 0);
    }

    #[tokio::test]
    async fn updating_unknown_job_is_not_found() {
        let storage = test_storage().await;
        let err = storage
            .update_job(&JobId::new(), &JobPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CourseBuilderError::NotFound(_)));
    }

    #[tokio::test]
    async fn jobs_listed_newest_first() {
        let storage = test_storage().await;
        let first = new_job("u1");
        storage.create_job(&first).await.unwrap();
        let mut second = new_job("u1");
        second.started_at = first.started_at + chrono::Duration::seconds(5);
        storage.create_job(&second).await.unwrap();
        storage.create_job(&new_job("u2")).await.unwrap();

        let jobs = storage
            .list_jobs_for_user(&UserId::new("u1"), 10)
            .await
            .unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, second.id);
        assert_eq!(jobs[1].id, first.id);
    }

    #[tokio::test]
    async fn course_hierarchy_roundtrip() {
        let storage = test_storage().await;
        let course_id = storage
            .create_course(&NewCourse {
                title: "Prompt Engineering".into(),
                description: "Better prompts".into(),
                difficulty: Difficulty::Beginner,
                category: "applications".into(),
                duration_hours: 4.0,
                instructor: "AI Copilot".into(),
                cover_image: "https://example.com/cover.png".into(),
                is_published: true,
            })
            .await
            .unwrap();

        // Insert modules out of order to check ordering on read
        for order in [2u32, 1] {
            let module_id = storage
                .create_module(&NewModule {
                    course_id: course_id.clone(),
                    title: format!("Module {order}"),
                    order_index: order,
                })
                .await
                .unwrap();
            for lesson in [3u32, 1, 2] {
                storage
                    .create_lesson(&NewLesson {
                        module_id: module_id.clone(),
                        title: format!("Lesson {order}.{lesson}"),
                        content: "# Content".into(),
                        order_index: lesson,
                        duration_minutes: 20,
                        lesson_type: "interactive".into(),
                        interactive_config: json!({ "quiz": [] }),
                    })
                    .await
                    .unwrap();
            }
        }

        let course = storage.get_course(&course_id).await.unwrap().unwrap();
        assert_eq!(course.course.title, "Prompt Engineering");
        assert!(course.course.is_published);
        assert_eq!(course.modules.len(), 2);
        assert_eq!(course.modules[0].title, "Module 1");
        let orders: Vec<u32> = course.modules[0].lessons.iter().map(|l| l.order_index).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(course.modules[1].lessons[0].interactive_config, json!({ "quiz": [] }));
        assert_eq!(storage.count_courses().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn profile_patch_and_read() {
        let storage = test_storage().await;
        let user = UserId::new("u1");

        let err = storage.read_profile(&user).await.unwrap_err();
        assert!(matches!(err, CourseBuilderError::NotFound(_)));

        storage.ensure_profile(&user).await.unwrap();
        storage.ensure_profile(&user).await.unwrap();

        storage
            .update_profile(
                &user,
                &ProfilePatch {
                    job_title: Some("Data Analyst".into()),
                    agent_memory: Some(json!({ "workflows_of_interest": ["reporting"] })),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        storage
            .update_profile(
                &user,
                &ProfilePatch {
                    courses_created: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let profile = storage.read_profile(&user).await.unwrap();
        assert_eq!(profile.job_title.as_deref(), Some("Data Analyst"));
        assert_eq!(profile.courses_created, 2);
        assert_eq!(profile.agent_memory["workflows_of_interest"][0], "reporting");
        assert_eq!(profile.quota, QuotaState::default());
    }

    #[tokio::test]
    async fn quota_commit_same_day_and_new_day() {
        let storage = test_storage().await;
        let user = UserId::new("u1");
        storage.ensure_profile(&user).await.unwrap();

        let quota = storage.commit_quota(&user, date("2026-03-01")).await.unwrap();
        assert_eq!(quota.last_build_date, Some(date("2026-03-01")));
        assert_eq!(quota.builds_today, 1);

        let quota = storage.commit_quota(&user, date("2026-03-01")).await.unwrap();
        assert_eq!(quota.builds_today, 2);

        let quota = storage.commit_quota(&user, date("2026-03-02")).await.unwrap();
        assert_eq!(quota.last_build_date, Some(date("2026-03-02")));
        assert_eq!(quota.builds_today, 1);
    }

    #[tokio::test]
    async fn quota_counter_is_capped() {
        let storage = test_storage().await;
        let user = UserId::new("u1");
        storage.ensure_profile(&user).await.unwrap();

        let today = date("2026-03-01");
        for _ in 0..105 {
            storage.commit_quota(&user, today).await.unwrap();
        }
        let profile = storage.read_profile(&user).await.unwrap();
        assert_eq!(profile.quota.builds_today, 99);
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("cb_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        let job = new_job("u1");
        rw.create_job(&job).await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert!(ro.get_job(&job.id).await.unwrap().is_some());
        let result = ro.create_job(&new_job("u2")).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_requires_existing_database() {
        let tmp = std::env::temp_dir().join(format!("cb_missing_{}.db", Uuid::now_v7()));
        let result = Storage::open_readonly(&tmp).await;
        assert!(matches!(result, Err(CourseBuilderError::NotFound(_))));
    }
}
