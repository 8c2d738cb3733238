//! Drafting stage: one call per lesson, strictly sequential.

use serde_json::Value;
use tracing::{debug, info, instrument};

use coursebuilder_generation::{GenerationClient, generate_structured};
use coursebuilder_shared::{CourseBlueprint, LessonBody, LessonDraft, Result, lesson_id};

use crate::prompts;
use crate::tracker::{JobTracker, progress_between};

/// Lesson type assumed when a generated body omits one.
pub const DEFAULT_LESSON_TYPE: &str = "interactive";

/// Place a generated body at its (module, lesson) position, filling defaults.
pub(crate) fn into_draft(
    body: LessonBody,
    module_order_index: u32,
    lesson_order_index: u32,
    fallback_minutes: u32,
) -> LessonDraft {
    let duration_minutes = body
        .duration_minutes
        .filter(|m| m.is_finite() && *m >= 1.0)
        .map(|m| m.round() as u32)
        .unwrap_or(fallback_minutes);

    LessonDraft {
        lesson_id: lesson_id(module_order_index, lesson_order_index),
        title: body.title,
        content: body.content,
        lesson_type: body
            .lesson_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LESSON_TYPE.to_string()),
        interactive_config: body
            .interactive_config
            .filter(|c| !c.is_null())
            .unwrap_or_else(|| Value::Object(Default::default())),
        duration_minutes,
        module_order_index,
        lesson_order_index,
    }
}

#[instrument(skip_all, fields(lessons = blueprint.lesson_count()))]
pub async fn run(
    generator: &dyn GenerationClient,
    tracker: &mut JobTracker<'_>,
    blueprint: &CourseBlueprint,
    fallback_minutes: u32,
) -> Result<Vec<LessonDraft>> {
    let total = blueprint.lesson_count();
    let shape = prompts::lesson_shape();
    let mut drafts = Vec::with_capacity(total);

    for module in &blueprint.modules {
        for lesson in &module.lessons {
            let prompt = prompts::draft_prompt(blueprint, lesson)?;
            let body: LessonBody = generate_structured(generator, &prompt, &shape).await?;
            drafts.push(into_draft(
                body,
                module.order_index,
                lesson.order_index,
                fallback_minutes,
            ));

            let done = drafts.len();
            debug!(done, total, lesson = %lesson.title, "lesson drafted");
            tracker
                .report(
                    &format!("Drafting Lessons ({done}/{total})"),
                    &format!("Writing: {}", lesson.title),
                    progress_between(20, 40, done, total),
                )
                .await?;
        }
    }

    info!(drafted = drafts.len(), "drafting complete");
    Ok(drafts)
}
