//! Blueprint stage: one structured call producing the course outline.

use std::collections::HashSet;

use tracing::{info, instrument};

use coursebuilder_generation::{GenerationClient, generate_structured};
use coursebuilder_shared::{CourseBlueprint, CourseBuilderError, Result, UserProfile};

use crate::prompts;
use crate::tracker::JobTracker;

#[instrument(skip_all, fields(topic = %topic))]
pub async fn run(
    generator: &dyn GenerationClient,
    tracker: &mut JobTracker<'_>,
    profile: &UserProfile,
    topic: &str,
    fallback_hours: f64,
) -> Result<CourseBlueprint> {
    tracker
        .report(
            "Designing Course Blueprint",
            "Defining learning objectives and narrative flow...",
            5,
        )
        .await?;

    let prompt = prompts::blueprint_prompt(profile, topic)?;
    let mut blueprint: CourseBlueprint =
        generate_structured(generator, &prompt, &prompts::blueprint_shape()).await?;

    validate(&blueprint)?;
    if !blueprint.duration_hours.is_finite() || blueprint.duration_hours <= 0.0 {
        blueprint.duration_hours = fallback_hours;
    }

    info!(
        title = %blueprint.title,
        modules = blueprint.modules.len(),
        lessons = blueprint.lesson_count(),
        "blueprint ready"
    );

    tracker
        .report(
            "Drafting Lessons",
            &format!("Blueprint complete for \"{}\"", blueprint.title),
            20,
        )
        .await?;

    Ok(blueprint)
}

/// Reject outlines with nothing to draft or with colliding order indexes.
pub fn validate(blueprint: &CourseBlueprint) -> Result<()> {
    if blueprint.modules.is_empty() {
        return Err(CourseBuilderError::generation("blueprint has no modules"));
    }

    let mut module_orders = HashSet::new();
    for module in &blueprint.modules {
        if !module_orders.insert(module.order_index) {
            return Err(CourseBuilderError::generation(format!(
                "blueprint repeats module order_index {}",
                module.order_index
            )));
        }
        if module.lessons.is_empty() {
            return Err(CourseBuilderError::generation(format!(
                "blueprint module {} (\"{}\") has no lessons",
                module.order_index, module.title
            )));
        }

        let mut lesson_orders = HashSet::new();
        for lesson in &module.lessons {
            if !lesson_orders.insert(lesson.order_index) {
                return Err(CourseBuilderError::generation(format!(
                    "blueprint module {} repeats lesson order_index {}",
                    module.order_index, lesson.order_index
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SilentObserver;
    use crate::testing::{MemoryStore, blueprint_json};
    use coursebuilder_generation::ScriptedGenerator;
    use coursebuilder_shared::{Difficulty, UserId};
    use serde_json::json;

    async fn run_with(value: serde_json::Value) -> (Result<CourseBlueprint>, MemoryStore) {
        let store = MemoryStore::default();
        let generator = ScriptedGenerator::new();
        generator.push_value(value);
        let profile = UserProfile::empty(UserId::new("u1"));
        let result = {
            let mut tracker =
                JobTracker::create(&store, &SilentObserver, &UserId::new("u1"), "rust")
                    .await
                    .unwrap();
            run(&generator, &mut tracker, &profile, "rust", 4.0).await
        };
        (result, store)
    }

    #[tokio::test]
    async fn produces_blueprint_and_reports_progress() {
        let (result, store) = run_with(blueprint_json("Rust 101", &[3, 4, 3])).await;
        let blueprint = result.unwrap();
        assert_eq!(blueprint.title, "Rust 101");
        assert_eq!(blueprint.difficulty, Difficulty::Beginner);
        assert_eq!(blueprint.lesson_count(), 10);

        let job = store.jobs().remove(0);
        assert_eq!(job.progress_percentage, 20);
        assert_eq!(
            job.logs[1],
            "[5%] Designing Course Blueprint: Defining learning objectives and narrative flow..."
        );
        assert_eq!(
            job.logs[2],
            "[20%] Drafting Lessons: Blueprint complete for \"Rust 101\""
        );
    }

    #[tokio::test]
    async fn nonpositive_duration_uses_fallback() {
        let mut value = blueprint_json("Rust 101", &[3]);
        value["duration_hours"] = json!(0);
        let (result, _) = run_with(value).await;
        assert_eq!(result.unwrap().duration_hours, 4.0);
    }

    #[tokio::test]
    async fn bad_difficulty_is_generation_failure() {
        let mut value = blueprint_json("Rust 101", &[3]);
        value["difficulty"] = json!("expert");
        let (result, store) = run_with(value).await;
        assert!(matches!(result, Err(CourseBuilderError::Generation(_))));
        assert_eq!(store.jobs()[0].progress_percentage, 5);
    }

    #[tokio::test]
    async fn empty_outline_is_rejected() {
        let (result, _) = run_with(blueprint_json("Empty", &[])).await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("no modules"));

        let (result, _) = run_with(blueprint_json("Hollow", &[3, 0])).await;
        assert!(result.unwrap_err().to_string().contains("has no lessons"));
    }

    #[tokio::test]
    async fn duplicate_lesson_order_is_rejected() {
        let mut value = blueprint_json("Dupes", &[2]);
        value["modules"][0]["lessons"][1]["order_index"] = json!(1);
        let (result, _) = run_with(value).await;
        assert!(result.unwrap_err().to_string().contains("repeats lesson order_index 1"));
    }
}
