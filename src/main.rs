use anyhow::Context;
use attendance_migrate::{MigrationConfig, MigrationJob, RunOptions};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "attendance-migrate")]
#[command(about = "Copy attendance data from the old backend to the new one")]
struct Args {
    /// JSON config file; MIGRATE_* environment variables override store URLs and keys
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extract, transform and back up without inserting anything
    #[arg(long)]
    dry_run: bool,

    /// Skip collections and chunks recorded in the load manifest
    #[arg(long)]
    resume: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_ascii_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let cfg = MigrationConfig::load(args.config.as_deref())?;
    let timeout = cfg.request_timeout();
    let source = cfg
        .source
        .open("source", cfg.page_size, timeout, &cfg.order_by)
        .context("failed to open source store")?;
    let destination = cfg
        .destination
        .open("destination", cfg.page_size, timeout, &cfg.order_by)
        .context("failed to open destination store")?;

    let report = MigrationJob::new(&*source, &*destination, &cfg).run(RunOptions {
        dry_run: args.dry_run,
        resume: args.resume,
    })?;

    info!(
        attendance = report.transform.attendance_rows,
        status_defaulted = report.transform.status_defaulted,
        program_fallback = report.transform.program_fallback,
        backup = %report.backup_dir.display(),
        "done"
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to serialize report")?
    );
    Ok(())
}
