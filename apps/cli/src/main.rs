//! CourseBuilder CLI — build AI-generated courses from a topic.
//!
//! Runs the admission-gated build pipeline against a local libSQL database
//! and exposes the stored jobs, courses, quota, and profiles for polling.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
