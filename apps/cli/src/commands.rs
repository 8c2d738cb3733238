//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use coursebuilder_core::{BuildObserver, BuildRequest, CourseBuilder, check_quota};
use coursebuilder_generation::OpenRouterClient;
use coursebuilder_shared::{
    AppConfig, CourseBuildJob, CourseBuilderError, CourseId, JobId, JobStatus, ProfilePatch,
    UserId, UserProfile, init_config, load_config, resolve_database_path, validate_api_key,
};
use coursebuilder_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// CourseBuilder — generate structured courses from a topic.
#[derive(Parser)]
#[command(
    name = "coursebuilder",
    version,
    about = "Build multi-module courses from a topic with a generative model, one per day.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database path (defaults to `[defaults].database_path` from the config).
    #[arg(long, global = true, env = "COURSEBUILDER_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build a new course for a user.
    Build {
        /// Course topic. Empty uses the configured default topic.
        #[arg(default_value = "")]
        topic: String,

        /// User the course is built for.
        #[arg(short, long, env = "COURSEBUILDER_USER")]
        user: String,

        /// Override the configured generation model.
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Inspect build jobs.
    Job {
        #[command(subcommand)]
        action: JobAction,
    },

    /// Inspect persisted courses.
    Course {
        #[command(subcommand)]
        action: CourseAction,
    },

    /// Show a user's daily build quota.
    Quota {
        #[arg(short, long, env = "COURSEBUILDER_USER")]
        user: String,
    },

    /// Manage user profiles.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Job subcommands.
#[derive(Subcommand)]
pub(crate) enum JobAction {
    /// Show one job's status, progress, and log.
    Show {
        /// Job ID.
        id: String,

        /// Print the raw job record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List a user's jobs, newest first.
    List {
        #[arg(short, long, env = "COURSEBUILDER_USER")]
        user: String,

        /// Maximum number of jobs to show.
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },
}

/// Course subcommands.
#[derive(Subcommand)]
pub(crate) enum CourseAction {
    /// Show a course outline (or the full course as JSON).
    Show {
        /// Course ID.
        id: String,

        /// Print the full course, lesson content included, as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Profile subcommands.
#[derive(Subcommand)]
pub(crate) enum ProfileAction {
    /// Create or update a profile.
    Set {
        #[arg(short, long, env = "COURSEBUILDER_USER")]
        user: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        job_title: Option<String>,
        #[arg(long)]
        industry: Option<String>,
        #[arg(long)]
        experience: Option<String>,
    },
    /// Show a profile.
    Show {
        #[arg(short, long, env = "COURSEBUILDER_USER")]
        user: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "coursebuilder=info",
        1 => "coursebuilder=debug",
        _ => "coursebuilder=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let db = cli.db;
    match cli.command {
        Command::Build { topic, user, model } => {
            cmd_build(db.as_deref(), &topic, &user, model.as_deref()).await
        }
        Command::Job { action } => match action {
            JobAction::Show { id, json } => cmd_job_show(db.as_deref(), &id, json).await,
            JobAction::List { user, limit } => cmd_job_list(db.as_deref(), &user, limit).await,
        },
        Command::Course { action } => match action {
            CourseAction::Show { id, json } => cmd_course_show(db.as_deref(), &id, json).await,
        },
        Command::Quota { user } => cmd_quota(db.as_deref(), &user).await,
        Command::Profile { action } => match action {
            ProfileAction::Set {
                user,
                name,
                job_title,
                industry,
                experience,
            } => {
                let patch = ProfilePatch {
                    full_name: name,
                    job_title,
                    industry,
                    experience_level: experience,
                    ..Default::default()
                };
                cmd_profile_set(db.as_deref(), &user, patch).await
            }
            ProfileAction::Show { user } => cmd_profile_show(db.as_deref(), &user).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

fn database_path(db: Option<&Path>, config: &AppConfig) -> Result<PathBuf> {
    match db {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(resolve_database_path(config)?),
    }
}

async fn open_storage(db: Option<&Path>) -> Result<Storage> {
    let config = load_config()?;
    let path = database_path(db, &config)?;
    Ok(Storage::open(&path).await?)
}

async fn open_storage_readonly(db: Option<&Path>) -> Result<Storage> {
    let config = load_config()?;
    let path = database_path(db, &config)?;
    Ok(Storage::open_readonly(&path).await?)
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

async fn cmd_build(db: Option<&Path>, topic: &str, user: &str, model: Option<&str>) -> Result<()> {
    // Validate API key before doing anything
    let mut config = load_config()?;
    validate_api_key(&config)?;
    if let Some(model) = model {
        config.openrouter.default_model = model.to_string();
    }

    let path = database_path(db, &config)?;
    let storage = Arc::new(Storage::open(&path).await?);
    let user_id = UserId::new(user);
    storage.ensure_profile(&user_id).await?;

    let generator = Arc::new(OpenRouterClient::from_config(&config)?);
    let builder = CourseBuilder::new(
        generator,
        storage.clone(),
        storage.clone(),
        config.course.clone(),
    );

    info!(
        user,
        topic,
        model = %config.openrouter.default_model,
        "building course"
    );

    let observer = CliProgress::new();
    let request = BuildRequest {
        user_id,
        topic: topic.to_string(),
    };

    let job = match builder.build(&request, &observer).await {
        Ok(job) => job,
        Err(CourseBuilderError::AdmissionDenied { .. }) => {
            observer.clear();
            return Err(eyre!(
                "you've reached today's limit (1 new course/day). Try again tomorrow."
            ));
        }
        Err(e) => {
            observer.clear();
            return Err(e.into());
        }
    };

    let elapsed = job
        .finished_at
        .map(|end| (end - job.started_at).num_milliseconds() as f64 / 1000.0)
        .unwrap_or_default();

    println!();
    match job.status {
        JobStatus::Completed => {
            let course_id = job
                .course_id
                .as_ref()
                .ok_or_else(|| eyre!("completed job {} has no course", job.id))?;
            let course = storage.get_course(course_id).await?;
            let lessons: usize = course
                .as_ref()
                .map(|c| c.modules.iter().map(|m| m.lessons.len()).sum())
                .unwrap_or_default();

            println!("  Course built successfully!");
            println!("  Job:     {}", job.id);
            println!("  Course:  {course_id}");
            if let Some(course) = &course {
                println!("  Title:   {}", course.course.title);
                println!("  Modules: {}", course.modules.len());
            }
            println!("  Lessons: {lessons}");
            println!("  Time:    {elapsed:.1}s");
            println!();
            Ok(())
        }
        _ => {
            let message = job.error_message.as_deref().unwrap_or("unknown error");
            println!("  Course build failed at {}%.", job.progress_percentage);
            println!("  Job:   {}", job.id);
            println!("  Error: {message}");
            println!("  Run the same command again to retry.");
            println!();
            Err(eyre!("course build failed: {message}"))
        }
    }
}

// ---------------------------------------------------------------------------
// CLI build observer
// ---------------------------------------------------------------------------

/// Mirrors job progress on an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl BuildObserver for CliProgress {
    fn started(&self, job: &CourseBuildJob) {
        if let Some(line) = job.logs.first() {
            self.spinner.set_message(line.clone());
        }
    }

    fn progress(&self, _percent: u8, line: &str) {
        self.spinner.println(format!("  {line}"));
        self.spinner.set_message(line.to_string());
    }

    fn finished(&self, _job: &CourseBuildJob) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Jobs & courses
// ---------------------------------------------------------------------------

async fn cmd_job_show(db: Option<&Path>, id: &str, json: bool) -> Result<()> {
    let job_id: JobId = id.parse().map_err(|e| eyre!("invalid job ID '{id}': {e}"))?;
    let storage = open_storage_readonly(db).await?;
    let job = storage
        .get_job(&job_id)
        .await?
        .ok_or_else(|| eyre!("no job with ID {id}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    println!("  Job:      {}", job.id);
    println!("  User:     {}", job.user_id);
    println!("  Topic:    {}", job.requested_topic);
    println!("  Status:   {}", job.status);
    println!("  Progress: {}%", job.progress_percentage);
    println!("  Started:  {}", job.started_at.to_rfc3339());
    if let Some(finished) = job.finished_at {
        println!("  Finished: {}", finished.to_rfc3339());
    }
    if let Some(course_id) = &job.course_id {
        println!("  Course:   {course_id}");
    }
    if let Some(message) = &job.error_message {
        println!("  Error:    {message}");
    }
    println!();
    for line in &job.logs {
        println!("  {line}");
    }
    Ok(())
}

async fn cmd_job_list(db: Option<&Path>, user: &str, limit: u32) -> Result<()> {
    let storage = open_storage_readonly(db).await?;
    let jobs = storage.list_jobs_for_user(&UserId::new(user), limit).await?;

    if jobs.is_empty() {
        println!("No build jobs for {user}.");
        return Ok(());
    }

    for job in jobs {
        println!(
            "{}  {:<9} {:>3}%  {}  {}",
            job.id,
            job.status,
            job.progress_percentage,
            job.started_at.format("%Y-%m-%d %H:%M"),
            job.requested_topic
        );
    }
    Ok(())
}

async fn cmd_course_show(db: Option<&Path>, id: &str, json: bool) -> Result<()> {
    let course_id: CourseId = id.parse().map_err(|e| eyre!("invalid course ID '{id}': {e}"))?;
    let storage = open_storage_readonly(db).await?;
    let course = storage
        .get_course(&course_id)
        .await?
        .ok_or_else(|| eyre!("no course with ID {id}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&course)?);
        return Ok(());
    }

    println!("{}", course.course.title);
    println!("{}", course.course.description);
    println!(
        "{} · {:.1}h · {} · by {}",
        course.course.difficulty,
        course.course.duration_hours,
        course.course.category,
        course.course.instructor
    );
    for module in &course.modules {
        println!();
        println!("  {}. {}", module.order_index, module.title);
        for lesson in &module.lessons {
            println!(
                "     {}.{} {} ({} min, {})",
                module.order_index,
                lesson.order_index,
                lesson.title,
                lesson.duration_minutes,
                lesson.lesson_type
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Quota & profiles
// ---------------------------------------------------------------------------

async fn load_profile(storage: &Storage, user: &str) -> Result<UserProfile> {
    let user_id = UserId::new(user);
    Ok(storage
        .get_profile(&user_id)
        .await?
        .unwrap_or_else(|| UserProfile::empty(user_id)))
}

async fn cmd_quota(db: Option<&Path>, user: &str) -> Result<()> {
    let storage = open_storage(db).await?;
    let profile = load_profile(&storage, user).await?;
    let today = Utc::now().date_naive();
    let check = check_quota(&profile.quota, today);

    println!("  User:         {user}");
    println!(
        "  Last build:   {}",
        profile
            .quota
            .last_build_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never".into())
    );
    println!("  Builds today: {}", if profile.quota.last_build_date == Some(today) {
        profile.quota.builds_today
    } else {
        0
    });
    println!("  Remaining:    {}", check.remaining);
    println!(
        "  Status:       {}",
        if check.allowed {
            "ready to build"
        } else {
            "limit reached, try again tomorrow (UTC)"
        }
    );
    Ok(())
}

async fn cmd_profile_set(db: Option<&Path>, user: &str, patch: ProfilePatch) -> Result<()> {
    let storage = open_storage(db).await?;
    let user_id = UserId::new(user);
    storage.ensure_profile(&user_id).await?;
    storage.patch_profile(&user_id, &patch).await?;
    println!("Profile saved for {user}.");
    Ok(())
}

async fn cmd_profile_show(db: Option<&Path>, user: &str) -> Result<()> {
    let storage = open_storage(db).await?;
    let profile = load_profile(&storage, user).await?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
