//! Prompt text and output shapes for each generation call.

use serde_json::{Value, json};

use coursebuilder_generation::{Field, Shape};
use coursebuilder_shared::{
    AuditFeedback, CourseBlueprint, Difficulty, LessonDraft, LessonSpec, Result, UserProfile,
};

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

pub fn blueprint_shape() -> Shape {
    let lesson = Shape::Object(vec![
        Field::required("title", Shape::String),
        Field::required("order_index", Shape::Number),
        Field::required("learning_objectives", Shape::array_of(Shape::String)),
        Field::required("key_concepts_to_cover", Shape::array_of(Shape::String)),
        Field::required("content_summary", Shape::String),
    ]);
    let module = Shape::Object(vec![
        Field::required("title", Shape::String),
        Field::required("order_index", Shape::Number),
        Field::required("lessons", Shape::array_of(lesson)),
    ]);

    Shape::Object(vec![
        Field::required("title", Shape::String),
        Field::required("description", Shape::String),
        Field::required(
            "difficulty",
            Shape::one_of(Difficulty::ALL.iter().map(|d| d.as_str())),
        ),
        Field::required("duration_hours", Shape::Number),
        Field::required("modules", Shape::array_of(module)),
    ])
}

/// Shape shared by drafting and revision calls.
///
/// Only title and content are required; the rest fall back to defaults.
pub fn lesson_shape() -> Shape {
    Shape::Object(vec![
        Field::required("title", Shape::String),
        Field::required("content", Shape::String),
        Field::optional("lesson_type", Shape::String),
        Field::optional("interactive_config", Shape::AnyObject),
        Field::optional("duration_minutes", Shape::Number),
    ])
}

pub fn audit_shape() -> Shape {
    Shape::Object(vec![Field::required(
        "feedback",
        Shape::array_of(Shape::Object(vec![
            Field::required("lesson_id", Shape::String),
            Field::required("requires_revision", Shape::Boolean),
            Field::optional("feedback", Shape::String),
        ])),
    )])
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// The profile fields the blueprint is tailored to.
fn learner_summary(profile: &UserProfile) -> Value {
    json!({
        "full_name": profile.full_name,
        "job_title": profile.job_title,
        "industry": profile.industry,
        "experience_level": profile.experience_level,
    })
}

fn pretty(value: &impl serde::Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn blueprint_prompt(profile: &UserProfile, topic: &str) -> Result<String> {
    Ok(format!(
        "You are a world-class instructional designer. Create a comprehensive, high-quality \
         course BLUEPRINT on \"{topic}\" for a learner with this profile:\n{learner}\n\n\
         Return a JSON object for the entire course blueprint. Include a course-level title, \
         description, difficulty, estimated duration_hours, and 3 modules. Each module should \
         have 3-4 lessons. For each lesson, define: title, detailed learning_objectives \
         (3-5 points), key_concepts_to_cover, and a brief content_summary. Each module and \
         each lesson must have an order_index starting from 1.",
        learner = pretty(&learner_summary(profile))?,
    ))
}

pub fn draft_prompt(blueprint: &CourseBlueprint, lesson: &LessonSpec) -> Result<String> {
    Ok(format!(
        "Write the full lesson content for \"{title}\".\n\
         Course Blueprint: {blueprint}\n\
         This lesson's objectives: {objectives}.\n\
         Key concepts: {concepts}.\n\
         Return JSON with: title, content (markdown), lesson_type: \"interactive\", \
         interactive_config, duration_minutes.",
        title = lesson.title,
        blueprint = pretty(blueprint)?,
        objectives = lesson.learning_objectives.join(", "),
        concepts = lesson.key_concepts_to_cover.join(", "),
    ))
}

/// Drafts with their `content` removed, to bound the audit prompt.
fn draft_outline(drafts: &[LessonDraft]) -> Vec<Value> {
    drafts
        .iter()
        .map(|d| {
            json!({
                "lesson_id": d.lesson_id,
                "title": d.title,
                "lesson_type": d.lesson_type,
                "interactive_config": d.interactive_config,
                "duration_minutes": d.duration_minutes,
                "module_order_index": d.module_order_index,
                "lesson_order_index": d.lesson_order_index,
            })
        })
        .collect()
}

pub fn audit_prompt(blueprint: &CourseBlueprint, drafts: &[LessonDraft]) -> Result<String> {
    Ok(format!(
        "You are a meticulous quality assurance editor. Review this DRAFT course content \
         against its BLUEPRINT.\n\
         Blueprint: {blueprint}\n\
         Draft Content: {outline}\n\
         Return a JSON object containing an array of feedback objects: \
         {{ \"feedback\": [{{ \"lesson_id\", \"requires_revision\" (boolean), \"feedback\" (string) }}] }}.",
        blueprint = pretty(blueprint)?,
        outline = pretty(&draft_outline(drafts))?,
    ))
}

pub fn revision_prompt(draft: &LessonDraft, feedback: &AuditFeedback) -> Result<String> {
    Ok(format!(
        "Revise this lesson DRAFT based on the EDITOR'S FEEDBACK.\n\
         Editor's Feedback: \"{feedback}\"\n\
         Original Draft: {draft}\n\
         Return the complete, improved lesson as JSON: \
         {{ title, content, lesson_type, interactive_config, duration_minutes }}",
        feedback = feedback.feedback,
        draft = pretty(draft)?,
    ))
}
