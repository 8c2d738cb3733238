//! Application configuration for CourseBuilder.
//!
//! User config lives at `~/.coursebuilder/coursebuilder.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CourseBuilderError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "coursebuilder.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".coursebuilder";

// ---------------------------------------------------------------------------
// Config structs (matching coursebuilder.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Fixed values stamped onto every generated course.
    #[serde(default)]
    pub course: CourseDefaultsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path to the libSQL database holding jobs, courses, and profiles.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "~/.coursebuilder/coursebuilder.db".into()
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for every generation call.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout. A call that exceeds it fails the build.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_request_timeout() -> u64 {
    180
}

/// `[course]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDefaultsConfig {
    /// Category assigned to generated courses.
    #[serde(default = "default_category")]
    pub category: String,

    /// Instructor label shown on generated courses.
    #[serde(default = "default_instructor")]
    pub instructor: String,

    /// Cover image URL for generated courses.
    #[serde(default = "default_cover_image")]
    pub cover_image: String,

    /// Topic used when the caller passes an empty one.
    #[serde(default = "default_topic")]
    pub default_topic: String,

    /// Duration used when a generated lesson omits `duration_minutes`.
    #[serde(default = "default_lesson_minutes")]
    pub lesson_minutes: u32,

    /// Duration used when the blueprint omits `duration_hours`.
    #[serde(default = "default_course_hours")]
    pub course_hours: f64,
}

impl Default for CourseDefaultsConfig {
    fn default() -> Self {
        Self {
            category: default_category(),
            instructor: default_instructor(),
            cover_image: default_cover_image(),
            default_topic: default_topic(),
            lesson_minutes: default_lesson_minutes(),
            course_hours: default_course_hours(),
        }
    }
}

fn default_category() -> String {
    "applications".into()
}
fn default_instructor() -> String {
    "AI Copilot".into()
}
fn default_cover_image() -> String {
    "https://images.unsplash.com/photo-1677442136019-21780ecad995?w=800&h=400&fit=crop&crop=center"
        .into()
}
fn default_topic() -> String {
    "AI workflows for my role".into()
}
fn default_lesson_minutes() -> u32 {
    20
}
fn default_course_hours() -> f64 {
    4.0
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.coursebuilder/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CourseBuilderError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.coursebuilder/coursebuilder.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CourseBuilderError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CourseBuilderError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CourseBuilderError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CourseBuilderError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CourseBuilderError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the configured database path, expanding a leading `~/`.
pub fn resolve_database_path(config: &AppConfig) -> Result<PathBuf> {
    let raw = config.defaults.database_path.as_str();
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir().ok_or_else(|| {
                CourseBuilderError::config("could not determine home directory")
            })?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(raw)),
    }
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    read_api_key(config).map(|_| ())
}

/// Read the OpenRouter API key from the configured env var.
pub fn read_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(CourseBuilderError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("database_path"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("AI Copilot"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[openrouter]
default_model = "openai/gpt-4o-mini"

[course]
instructor = "Course Bot"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.openrouter.default_model, "openai/gpt-4o-mini");
        assert_eq!(config.openrouter.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(config.openrouter.request_timeout_secs, 180);
        assert_eq!(config.course.instructor, "Course Bot");
        assert_eq!(config.course.category, "applications");
        assert_eq!(config.course.lesson_minutes, 20);
    }

    #[test]
    fn database_path_expansion() {
        let mut config = AppConfig::default();
        config.defaults.database_path = "/tmp/cb/jobs.db".into();
        assert_eq!(
            resolve_database_path(&config).unwrap(),
            PathBuf::from("/tmp/cb/jobs.db")
        );

        config.defaults.database_path = "~/cb.db".into();
        let resolved = resolve_database_path(&config).unwrap();
        assert!(resolved.ends_with("cb.db"));
        assert!(!resolved.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openrouter.api_key_env = "CB_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
