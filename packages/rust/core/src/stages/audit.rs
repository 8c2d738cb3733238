//! Audit stage: one review call over the content-stripped draft set.

use tracing::{info, instrument};

use coursebuilder_generation::{GenerationClient, generate_structured};
use coursebuilder_shared::{AuditReport, CourseBlueprint, LessonDraft, Result};

use crate::prompts;
use crate::tracker::JobTracker;

#[instrument(skip_all, fields(drafts = drafts.len()))]
pub async fn run(
    generator: &dyn GenerationClient,
    tracker: &mut JobTracker<'_>,
    blueprint: &CourseBlueprint,
    drafts: &[LessonDraft],
) -> Result<AuditReport> {
    tracker
        .report(
            "Auditing Content",
            "Reviewing all lessons for quality and cohesion...",
            60,
        )
        .await?;

    let prompt = prompts::audit_prompt(blueprint, drafts)?;
    let report: AuditReport =
        generate_structured(generator, &prompt, &prompts::audit_shape()).await?;

    info!(
        entries = report.feedback.len(),
        flagged = report.feedback.iter().filter(|f| f.requires_revision).count(),
        "audit complete"
    );
    Ok(report)
}
