//! End-to-end course build: admission → blueprint → drafting → audit →
//! revision → persistence → quota commit → finalize.

use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use tracing::{info, instrument, warn};

use coursebuilder_generation::GenerationClient;
use coursebuilder_shared::{
    CourseBuildJob, CourseDefaultsConfig, CourseId, EntityStore, ProfilePatch, ProfileStore,
    Result, UserId,
};

use crate::admission::{AdmissionGate, AdmissionPermit};
use crate::memory::{COURSE_CREATION, remember_workflow};
use crate::stages;
use crate::tracker::JobTracker;

/// One build request from a user.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub user_id: UserId,
    /// Requested topic. Blank topics fall back to the configured default.
    pub topic: String,
}

/// In-process mirror of job progress. The stored job record stays authoritative.
pub trait BuildObserver: Send + Sync {
    /// Called once the job record exists.
    fn started(&self, job: &CourseBuildJob);
    /// Called after each progress line is persisted.
    fn progress(&self, percent: u8, line: &str);
    /// Called once the job reached a terminal status.
    fn finished(&self, job: &CourseBuildJob);
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl BuildObserver for SilentObserver {
    fn started(&self, _job: &CourseBuildJob) {}
    fn progress(&self, _percent: u8, _line: &str) {}
    fn finished(&self, _job: &CourseBuildJob) {}
}

/// Orchestrates course builds against the configured collaborators.
pub struct CourseBuilder {
    generator: Arc<dyn GenerationClient>,
    store: Arc<dyn EntityStore>,
    profiles: Arc<dyn ProfileStore>,
    gate: AdmissionGate,
    defaults: CourseDefaultsConfig,
}

impl CourseBuilder {
    pub fn new(
        generator: Arc<dyn GenerationClient>,
        store: Arc<dyn EntityStore>,
        profiles: Arc<dyn ProfileStore>,
        defaults: CourseDefaultsConfig,
    ) -> Self {
        Self {
            generator,
            store,
            gate: AdmissionGate::new(Arc::clone(&profiles)),
            profiles,
            defaults,
        }
    }

    /// Replace the UTC clock used for quota days.
    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.gate = self.gate.with_clock(clock);
        self
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    fn resolve_topic(&self, topic: &str) -> String {
        let topic = topic.trim();
        if topic.is_empty() {
            self.defaults.default_topic.clone()
        } else {
            topic.to_string()
        }
    }

    /// Run one build to a terminal state and return the final job record.
    ///
    /// Admission failures are returned as
    /// [`AdmissionDenied`](coursebuilder_shared::CourseBuilderError::AdmissionDenied)
    /// before any job exists. Once the job exists, every stage error is
    /// recorded on the job and the failed job is returned as `Ok`.
    #[instrument(skip_all, fields(user = %request.user_id))]
    pub async fn build(
        &self,
        request: &BuildRequest,
        observer: &dyn BuildObserver,
    ) -> Result<CourseBuildJob> {
        let start = Instant::now();
        let topic = self.resolve_topic(&request.topic);

        let permit = self.gate.admit(&request.user_id).await?;

        let mut tracker =
            JobTracker::create(self.store.as_ref(), observer, &request.user_id, &topic).await?;
        info!(job_id = %tracker.job().id, %topic, "starting course build");

        match self.run_stages(&mut tracker, &permit, &topic).await {
            Ok(course_id) => {
                if let Err(e) = tracker.finalize_success(course_id).await {
                    warn!(job_id = %tracker.job().id, error = %e, "could not record completion");
                    tracker.finalize_failure(&e).await.map_err(|_| e)?;
                }
            }
            Err(e) => {
                warn!(job_id = %tracker.job().id, error = %e, "course build failed");
                tracker.finalize_failure(&e).await?;
            }
        }

        let job = tracker.into_job();
        info!(
            job_id = %job.id,
            status = %job.status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "course build finished"
        );
        Ok(job)
    }

    async fn run_stages(
        &self,
        tracker: &mut JobTracker<'_>,
        permit: &AdmissionPermit,
        topic: &str,
    ) -> Result<CourseId> {
        let generator = self.generator.as_ref();
        let profile = self.profiles.read_profile(permit.user_id()).await?;

        // --- Stage 1: Blueprint ---
        let blueprint = stages::blueprint::run(
            generator,
            tracker,
            &profile,
            topic,
            self.defaults.course_hours,
        )
        .await?;

        // --- Stage 2: Drafting ---
        let drafts =
            stages::drafting::run(generator, tracker, &blueprint, self.defaults.lesson_minutes)
                .await?;

        // --- Stage 3: Audit ---
        let report = stages::audit::run(generator, tracker, &blueprint, &drafts).await?;

        // --- Stage 4: Revision ---
        let lessons = stages::revision::run(
            generator,
            tracker,
            drafts,
            &report,
            self.defaults.lesson_minutes,
        )
        .await?;

        // --- Stage 5: Persistence ---
        let course_id = stages::persistence::run(
            self.store.as_ref(),
            tracker,
            &blueprint,
            &lessons,
            &self.defaults,
        )
        .await?;

        // --- Bookkeeping ---
        self.gate.commit(permit).await?;

        let profile = self.profiles.read_profile(permit.user_id()).await?;
        self.profiles
            .update_profile(
                permit.user_id(),
                &ProfilePatch {
                    courses_created: Some(profile.courses_created.saturating_add(1)),
                    agent_memory: Some(remember_workflow(
                        &profile.agent_memory,
                        COURSE_CREATION,
                        Utc::now(),
                    )),
                    ..Default::default()
                },
            )
            .await?;

        Ok(course_id)
    }
}
