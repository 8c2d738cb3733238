//! Job Tracker: sole owner of the durable [`CourseBuildJob`] record.
//!
//! Every mutation is written through the [`EntityStore`] before it becomes
//! visible in memory, so polling clients always see what the tracker sees.

use chrono::Utc;
use tracing::{debug, instrument};

use coursebuilder_shared::{
    CourseBuildJob, CourseBuilderError, CourseId, EntityStore, JobId, JobPatch, JobStatus, Result,
    UserId,
};

use crate::pipeline::BuildObserver;

/// Highest percentage a job may report while still building.
const MAX_BUILDING_PERCENT: u8 = 99;

/// `base + round(done / total * span)`, rounding halves up.
///
/// A zero `total` counts as one.
pub fn progress_between(base: u8, span: u8, done: usize, total: usize) -> u8 {
    let total = total.max(1);
    let done = done.min(total);
    let scaled = (done * usize::from(span) * 2 + total) / (2 * total);
    base.saturating_add(scaled as u8)
}

pub struct JobTracker<'a> {
    store: &'a dyn EntityStore,
    observer: &'a dyn BuildObserver,
    job: CourseBuildJob,
}

impl<'a> JobTracker<'a> {
    /// Insert a new `building` job at 0%.
    #[instrument(skip_all, fields(user = %user_id))]
    pub async fn create(
        store: &'a dyn EntityStore,
        observer: &'a dyn BuildObserver,
        user_id: &UserId,
        topic: &str,
    ) -> Result<Self> {
        let job = CourseBuildJob {
            id: JobId::new(),
            user_id: user_id.clone(),
            requested_topic: topic.to_string(),
            status: JobStatus::Building,
            progress_percentage: 0,
            logs: vec![format!("[0%] Starting build for \"{topic}\"")],
            started_at: Utc::now(),
            finished_at: None,
            course_id: None,
            error_message: None,
        };

        store.create_job(&job).await?;
        debug!(job_id = %job.id, "job created");
        observer.started(&job);

        Ok(Self {
            store,
            observer,
            job,
        })
    }

    pub fn job(&self) -> &CourseBuildJob {
        &self.job
    }

    pub fn into_job(self) -> CourseBuildJob {
        self.job
    }

    fn ensure_building(&self) -> Result<()> {
        if self.job.status.is_terminal() {
            return Err(CourseBuilderError::validation(format!(
                "job {} is already {}",
                self.job.id, self.job.status
            )));
        }
        Ok(())
    }

    async fn write(&mut self, patch: JobPatch) -> Result<()> {
        self.store.update_job(&self.job.id, &patch).await?;
        self.job.apply(&patch);
        Ok(())
    }

    /// Append `"[{percent}%] {stage}: {detail}"` and persist the new progress.
    ///
    /// Progress never moves backwards and stays below 100 until completion.
    pub async fn report(&mut self, stage: &str, detail: &str, percent: u8) -> Result<()> {
        self.ensure_building()?;

        let percent = percent.clamp(self.job.progress_percentage, MAX_BUILDING_PERCENT);
        let line = format!("[{percent}%] {stage}: {detail}");
        let mut logs = self.job.logs.clone();
        logs.push(line.clone());

        self.write(JobPatch {
            progress_percentage: Some(percent),
            logs: Some(logs),
            ..Default::default()
        })
        .await?;

        self.observer.progress(percent, &line);
        Ok(())
    }

    /// Mark the job completed at 100% with the created course.
    pub async fn finalize_success(&mut self, course_id: CourseId) -> Result<()> {
        self.ensure_building()?;

        let mut logs = self.job.logs.clone();
        logs.push("[100%] Build complete!".to_string());

        self.write(JobPatch {
            status: Some(JobStatus::Completed),
            progress_percentage: Some(100),
            logs: Some(logs),
            finished_at: Some(Utc::now()),
            course_id: Some(course_id),
            ..Default::default()
        })
        .await?;

        self.observer.finished(&self.job);
        Ok(())
    }

    /// Mark the job failed. The stored message is never empty.
    pub async fn finalize_failure(&mut self, error: &CourseBuilderError) -> Result<()> {
        self.ensure_building()?;

        let mut message = error.to_string();
        if message.trim().is_empty() {
            message = "unknown error".to_string();
        }
        let mut logs = self.job.logs.clone();
        logs.push(format!("[FAILED] {message}"));

        self.write(JobPatch {
            status: Some(JobStatus::Failed),
            logs: Some(logs),
            finished_at: Some(Utc::now()),
            error_message: Some(message),
            ..Default::default()
        })
        .await?;

        self.observer.finished(&self.job);
        Ok(())
    }
}
