//! SQL migration definitions for the CourseBuilder database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: user_profiles, course_build_jobs, courses, modules, lessons",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Profile fields owned by the build pipeline (quota, counters, memory)
CREATE TABLE IF NOT EXISTS user_profiles (
    user_id           TEXT PRIMARY KEY,
    full_name         TEXT,
    job_title         TEXT,
    industry          TEXT,
    experience_level  TEXT,
    last_build_date   TEXT,
    builds_today      INTEGER NOT NULL DEFAULT 0,
    courses_created   INTEGER NOT NULL DEFAULT 0,
    agent_memory_json TEXT NOT NULL DEFAULT '{}',
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

-- One row per build attempt; pollable progress
CREATE TABLE IF NOT EXISTS course_build_jobs (
    id                  TEXT PRIMARY KEY,
    user_id             TEXT NOT NULL,
    requested_topic     TEXT NOT NULL,
    status              TEXT NOT NULL CHECK (status IN ('building', 'completed', 'failed')),
    progress_percentage INTEGER NOT NULL DEFAULT 0,
    logs_json           TEXT NOT NULL DEFAULT '[]',
    started_at          TEXT NOT NULL,
    finished_at         TEXT,
    course_id           TEXT,
    error_message       TEXT
);

CREATE INDEX IF NOT EXISTS idx_jobs_user ON course_build_jobs(user_id, started_at);

-- Persisted course hierarchy
CREATE TABLE IF NOT EXISTS courses (
    id             TEXT PRIMARY KEY,
    title          TEXT NOT NULL,
    description    TEXT NOT NULL,
    difficulty     TEXT NOT NULL,
    category       TEXT NOT NULL,
    duration_hours REAL NOT NULL,
    instructor     TEXT NOT NULL,
    cover_image    TEXT NOT NULL,
    is_published   INTEGER NOT NULL,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS modules (
    id          TEXT PRIMARY KEY,
    course_id   TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    title       TEXT NOT NULL,
    order_index INTEGER NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_modules_course ON modules(course_id, order_index);

CREATE TABLE IF NOT EXISTS lessons (
    id                      TEXT PRIMARY KEY,
    module_id               TEXT NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    title                   TEXT NOT NULL,
    content                 TEXT NOT NULL,
    order_index             INTEGER NOT NULL,
    duration_minutes        INTEGER NOT NULL,
    lesson_type             TEXT NOT NULL,
    interactive_config_json TEXT NOT NULL DEFAULT '{}',
    created_at              TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_lessons_module ON lessons(module_id, order_index);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
    ]
}
