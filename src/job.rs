use crate::backup::{bundle_backup, verify_backup, write_backup, BackupSummary};
use crate::collections::LOAD_ORDER;
use crate::config::MigrationConfig;
use crate::error::MigrationError;
use crate::extract::{extract_all, Snapshot};
use crate::load::{LoadReport, Loader};
use crate::manifest::manifest_path;
use crate::store::TableStore;
use crate::transform::{prepare_context, transform_snapshot, TransformReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Stage {
    Start,
    Extract,
    Transform,
    /// Opening or replacing the load manifest ahead of the first insert.
    Manifest,
    Load(String),
    Backup,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Start => write!(f, "START"),
            Stage::Extract => write!(f, "EXTRACT"),
            Stage::Transform => write!(f, "TRANSFORM"),
            Stage::Manifest => write!(f, "MANIFEST"),
            Stage::Load(c) => write!(f, "LOAD({})", c),
            Stage::Backup => write!(f, "BACKUP"),
            Stage::Done => write!(f, "DONE"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Extract, transform and back up without writing to the destination.
    pub dry_run: bool,
    /// Skip collections and chunks the load manifest records as committed.
    pub resume: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub extracted: Vec<(String, usize)>,
    pub transform: TransformReport,
    pub load: Option<LoadReport>,
    pub backup_dir: PathBuf,
    pub backup_bundle: Option<PathBuf>,
    pub stages: Vec<Stage>,
}

/// The job stopped at `stage`; nothing after it ran.
#[derive(Debug)]
pub struct JobFailure {
    pub stage: Stage,
    pub error: MigrationError,
    pub completed: Vec<Stage>,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "migration FAILED at {}: {}", self.stage, self.error)
    }
}

impl std::error::Error for JobFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub struct MigrationJob<'a, S: ?Sized, D: ?Sized> {
    source: &'a S,
    destination: &'a D,
    config: &'a MigrationConfig,
    clock: fn() -> DateTime<Utc>,
    stages: Vec<Stage>,
}

impl<'a, S, D> MigrationJob<'a, S, D>
where
    S: TableStore + ?Sized,
    D: TableStore + ?Sized,
{
    pub fn new(source: &'a S, destination: &'a D, config: &'a MigrationConfig) -> Self {
        Self {
            source,
            destination,
            config,
            clock: Utc::now,
            stages: vec![Stage::Start],
        }
    }

    /// Fixes the timestamp used for the backup directory name.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    fn enter(&mut self, stage: Stage) {
        info!(stage = %stage, "entering stage");
        self.stages.push(stage);
    }

    fn fail(&mut self, error: MigrationError) -> JobFailure {
        let stage = self.stages.last().cloned().unwrap_or(Stage::Start);
        error!(stage = %stage, error = %error, "migration FAILED");
        let mut completed = std::mem::take(&mut self.stages);
        completed.pop();
        JobFailure {
            stage,
            error,
            completed,
        }
    }

    pub fn run(mut self, opts: RunOptions) -> Result<JobReport, JobFailure> {
        info!(
            source = self.source.label(),
            destination = self.destination.label(),
            dry_run = opts.dry_run,
            resume = opts.resume,
            "migration starting"
        );

        self.enter(Stage::Extract);
        let snapshot = extract_all(self.source).map_err(|e| self.fail(e))?;

        self.enter(Stage::Transform);
        let ctx = prepare_context(self.destination, &snapshot, self.config).map_err(|e| self.fail(e))?;
        let (transformed, transform) = transform_snapshot(&snapshot, &ctx);

        let load = if opts.dry_run {
            info!("dry run: skipping LOAD");
            None
        } else {
            Some(self.load(&transformed, opts.resume)?)
        };

        self.enter(Stage::Backup);
        let summary = self.backup(&snapshot).map_err(|e| self.fail(e))?;

        self.enter(Stage::Done);
        info!(
            collections = snapshot.len(),
            rows = snapshot.total_rows(),
            backup = %summary.dir.display(),
            "migration finished"
        );
        Ok(JobReport {
            extracted: snapshot
                .iter()
                .map(|(name, rows)| (name.to_string(), rows.len()))
                .collect(),
            transform,
            load,
            backup_dir: summary.dir,
            backup_bundle: summary.bundle,
            stages: self.stages,
        })
    }

    fn load(&mut self, transformed: &Snapshot, resume: bool) -> Result<LoadReport, JobFailure> {
        let path = manifest_path(&self.config.state_dir);
        self.enter(Stage::Manifest);
        let mut loader = Loader::begin(self.destination, self.config.chunk_size, &path, resume)
            .map_err(|e| self.fail(e))?;
        for name in LOAD_ORDER {
            self.enter(Stage::Load(name.to_string()));
            loader
                .load_collection(name, transformed.rows(name))
                .map_err(|e| self.fail(e))?;
        }
        loader.finish().map_err(|e| self.fail(e))
    }

    fn backup(&self, snapshot: &Snapshot) -> Result<BackupSummary, MigrationError> {
        let mut summary = write_backup(&self.config.backup.dir, snapshot, (self.clock)())
            .map_err(MigrationError::backup)?;
        verify_backup(&summary.dir, snapshot).map_err(MigrationError::backup)?;
        if self.config.backup.zip {
            let out = summary.dir.with_extension("zip");
            bundle_backup(&summary.dir, &out).map_err(MigrationError::backup)?;
            summary.bundle = Some(out);
        }
        Ok(summary)
    }
}
