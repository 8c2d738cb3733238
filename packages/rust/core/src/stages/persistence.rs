//! Persistence stage: commit the Course → Modules → Lessons hierarchy.
//!
//! Rows are written one by one. A failure part-way leaves the rows already
//! written in place; nothing is rolled back.

use tracing::{debug, info, instrument};

use coursebuilder_shared::{
    CourseBlueprint, CourseDefaultsConfig, CourseId, EntityStore, LessonDraft, NewCourse,
    NewLesson, NewModule, Result,
};

use crate::tracker::JobTracker;

/// Course row for `blueprint`, with the configured defaults.
pub fn course_row(blueprint: &CourseBlueprint, defaults: &CourseDefaultsConfig) -> NewCourse {
    NewCourse {
        title: blueprint.title.clone(),
        description: blueprint.description.clone(),
        difficulty: blueprint.difficulty,
        category: defaults.category.clone(),
        duration_hours: blueprint.duration_hours,
        instructor: defaults.instructor.clone(),
        cover_image: defaults.cover_image.clone(),
        is_published: true,
    }
}

/// The lessons of one module, sorted by lesson order.
fn lessons_of(lessons: &[LessonDraft], module_order_index: u32) -> Vec<&LessonDraft> {
    let mut selected: Vec<&LessonDraft> = lessons
        .iter()
        .filter(|l| l.module_order_index == module_order_index)
        .collect();
    selected.sort_by_key(|l| l.lesson_order_index);
    selected
}

#[instrument(skip_all, fields(title = %blueprint.title))]
pub async fn run(
    store: &dyn EntityStore,
    tracker: &mut JobTracker<'_>,
    blueprint: &CourseBlueprint,
    lessons: &[LessonDraft],
    defaults: &CourseDefaultsConfig,
) -> Result<CourseId> {
    tracker
        .report("Finalizing", "Saving your course...", 95)
        .await?;

    let course_id = store
        .create_course(&course_row(blueprint, defaults))
        .await
        .map_err(|e| e.into_persistence())?;
    debug!(%course_id, "course row created");

    let mut lesson_rows = 0;
    for module in &blueprint.modules {
        let module_id = store
            .create_module(&NewModule {
                course_id: course_id.clone(),
                title: module.title.clone(),
                order_index: module.order_index,
            })
            .await
            .map_err(|e| e.into_persistence())?;

        for lesson in lessons_of(lessons, module.order_index) {
            store
                .create_lesson(&NewLesson {
                    module_id: module_id.clone(),
                    title: lesson.title.clone(),
                    content: lesson.content.clone(),
                    order_index: lesson.lesson_order_index,
                    duration_minutes: lesson.duration_minutes,
                    lesson_type: lesson.lesson_type.clone(),
                    interactive_config: lesson.interactive_config.clone(),
                })
                .await
                .map_err(|e| e.into_persistence())?;
            lesson_rows += 1;
        }
    }

    info!(%course_id, modules = blueprint.modules.len(), lessons = lesson_rows, "course saved");
    Ok(course_id)
}
