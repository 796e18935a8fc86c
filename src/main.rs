use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use env_logger::{Env, Target};
use log::info;

mod config;
mod db;
mod descriptor;
mod error;
mod id;
mod lock;
mod run;
mod stage;
mod submit;

use crate::config::{Config, ProjectDir};
use crate::lock::RunLock;

/// Compile experiment batch descriptors into platform workunits.
#[derive(Parser)]
struct Args {
    /// Application name registered with the platform
    #[arg(long, default_value = "openifs")]
    app_name: String,
    /// Project root holding the incoming, delivery, and template areas
    #[arg(long)]
    project_dir: PathBuf,
    /// Settings file; defaults to workgen.json in the project root
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stdout)
        .init();

    let args = Args::parse();
    info!("Application name: {}", args.app_name);

    let project = ProjectDir { path: args.project_dir };
    let config_path = args.config.unwrap_or_else(|| project.path.join("workgen.json"));
    let config = Config::load(&config_path)
        .with_context(|| format!("reading settings from {}", config_path.display()))?;

    // one run at a time, system-wide; blocks until any active run finishes
    let _lock = RunLock::acquire(&config.lockfile)?;

    let summary = run::run(&config, &project, &args.app_name)?;
    info!(
        "Submitted {} workunits in {} batches from {} documents ({} batches skipped)",
        summary.workunits, summary.batches_submitted, summary.documents, summary.batches_skipped
    );
    Ok(())
}
