//! Revision stage: rewrite only the lessons the audit flagged.

use std::collections::{HashMap, HashSet};

use tracing::{info, instrument, warn};

use coursebuilder_generation::{GenerationClient, generate_structured};
use coursebuilder_shared::{AuditFeedback, AuditReport, LessonBody, LessonDraft, Result};

use crate::prompts;
use crate::stages::drafting::into_draft;
use crate::tracker::{JobTracker, progress_between};

/// Map each drafted lesson to the feedback that flags it.
///
/// The first entry per lesson_id decides. Entries naming unknown lessons are
/// dropped with a warning.
pub fn flagged_feedback<'r>(
    drafts: &[LessonDraft],
    report: &'r AuditReport,
) -> HashMap<String, &'r AuditFeedback> {
    let known: HashSet<&str> = drafts.iter().map(|d| d.lesson_id.as_str()).collect();
    let mut first: HashMap<&str, &AuditFeedback> = HashMap::new();

    for entry in &report.feedback {
        if !known.contains(entry.lesson_id.as_str()) {
            warn!(lesson_id = %entry.lesson_id, "ignoring audit feedback for unknown lesson");
            continue;
        }
        first.entry(entry.lesson_id.as_str()).or_insert(entry);
    }

    first
        .into_iter()
        .filter(|(_, entry)| entry.requires_revision)
        .map(|(id, entry)| (id.to_string(), entry))
        .collect()
}

#[instrument(skip_all, fields(drafts = drafts.len()))]
pub async fn run(
    generator: &dyn GenerationClient,
    tracker: &mut JobTracker<'_>,
    drafts: Vec<LessonDraft>,
    report: &AuditReport,
    fallback_minutes: u32,
) -> Result<Vec<LessonDraft>> {
    tracker
        .report(
            "Refining Content",
            "Implementing improvements based on audit...",
            80,
        )
        .await?;

    let flagged = flagged_feedback(&drafts, report);
    let needed = flagged.len();
    if needed == 0 {
        info!("no lessons flagged for revision");
        return Ok(drafts);
    }

    let shape = prompts::lesson_shape();
    let mut revised = 0;
    let mut finals = Vec::with_capacity(drafts.len());

    for draft in drafts {
        let Some(feedback) = flagged.get(&draft.lesson_id) else {
            finals.push(draft);
            continue;
        };

        let prompt = prompts::revision_prompt(&draft, feedback)?;
        let body: LessonBody = generate_structured(generator, &prompt, &shape).await?;
        finals.push(into_draft(
            body,
            draft.module_order_index,
            draft.lesson_order_index,
            fallback_minutes,
        ));

        revised += 1;
        tracker
            .report(
                &format!("Refining Content ({revised}/{needed})"),
                &format!("Improving: {}", draft.title),
                progress_between(80, 15, revised, needed),
            )
            .await?;
    }

    info!(revised, "revision complete");
    Ok(finals)
}
