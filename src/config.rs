use crate::status;
use crate::store::{RestStore, SqliteStore, StoreError, TableStore};
use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const DEFAULT_FALLBACK_PROGRAM: &str = "Stafford";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    Rest {
        #[serde(default)]
        url: String,
        #[serde(default)]
        api_key: String,
    },
    Sqlite {
        path: PathBuf,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Rest {
            url: String::new(),
            api_key: String::new(),
        }
    }
}

impl StoreConfig {
    pub fn open(
        &self,
        label: &str,
        page_size: usize,
        timeout: Duration,
        order_by: &BTreeMap<String, String>,
    ) -> Result<Box<dyn TableStore>, StoreError> {
        Ok(match self {
            StoreConfig::Rest { url, api_key } => Box::new(
                RestStore::new(label, url, api_key, page_size, timeout)?
                    .with_order_by(order_by.clone()),
            ),
            StoreConfig::Sqlite { path } => Box::new(SqliteStore::open(label, path)?),
        })
    }

    fn apply_env(&mut self, url: Option<String>, key: Option<String>) {
        if let Some(url) = url {
            let api_key = match self {
                StoreConfig::Rest { api_key, .. } => std::mem::take(api_key),
                StoreConfig::Sqlite { .. } => String::new(),
            };
            *self = StoreConfig::Rest { url, api_key };
        }
        if let (Some(k), StoreConfig::Rest { api_key, .. }) = (key, &mut *self) {
            *api_key = k;
        }
    }

    fn validate(&self, label: &str) -> anyhow::Result<()> {
        match self {
            StoreConfig::Rest { url, api_key } => {
                if url.trim().is_empty() {
                    bail!("{} store: url is required", label);
                }
                if api_key.trim().is_empty() {
                    bail!("{} store: api_key is required", label);
                }
            }
            StoreConfig::Sqlite { path } => {
                if path.as_os_str().is_empty() {
                    bail!("{} store: path is required", label);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub dir: PathBuf,
    /// Also bundle the backup directory into `<dir>.zip`.
    pub zip: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("backup_data"),
            zip: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub source: StoreConfig,
    pub destination: StoreConfig,
    /// Program assigned to attendance rows whose program cannot be derived.
    pub fallback_program_name: String,
    /// Status applied when no legacy column yields a recognizable code.
    pub default_status_code: String,
    /// Valid codes used when the destination has no status definitions yet.
    pub canonical_status_codes: Vec<String>,
    pub chunk_size: usize,
    pub page_size: usize,
    /// PostgREST `order` per collection for REST reads, e.g.
    /// `{"attendance": "date.asc,id.asc"}`. Unlisted collections use their
    /// key column.
    pub order_by: BTreeMap<String, String>,
    pub request_timeout_secs: u64,
    pub backup: BackupConfig,
    /// Where the load manifest lives between runs.
    pub state_dir: PathBuf,
    /// Placeholders written into blank student fields.
    pub instrument_placeholder: String,
    pub position_placeholder: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            source: StoreConfig::default(),
            destination: StoreConfig::default(),
            fallback_program_name: DEFAULT_FALLBACK_PROGRAM.to_string(),
            default_status_code: status::PRESENT.to_string(),
            canonical_status_codes: vec![
                status::PRESENT.to_string(),
                status::EXCUSED_ABSENCE.to_string(),
                status::UNEXCUSED_ABSENCE.to_string(),
            ],
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            order_by: BTreeMap::new(),
            request_timeout_secs: 60,
            backup: BackupConfig::default(),
            state_dir: PathBuf::from(".migrate-state"),
            instrument_placeholder: "Sin asignar".to_string(),
            position_placeholder: "Estudiante".to_string(),
        }
    }
}

impl MigrationConfig {
    /// Reads the JSON config (if any), applies `MIGRATE_*` environment
    /// overrides, and validates the result.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env_with(|k| std::env::var(k).ok().filter(|v| !v.is_empty()));
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.to_string_lossy()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("config {} is invalid", path.to_string_lossy()))
    }

    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.source
            .apply_env(lookup("MIGRATE_SOURCE_URL"), lookup("MIGRATE_SOURCE_KEY"));
        self.destination
            .apply_env(lookup("MIGRATE_DEST_URL"), lookup("MIGRATE_DEST_KEY"));
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.source.validate("source")?;
        self.destination.validate("destination")?;
        if self.source == self.destination {
            bail!("source and destination stores are the same");
        }
        if self.chunk_size == 0 {
            bail!("chunk_size must be greater than 0");
        }
        if self.page_size == 0 {
            bail!("page_size must be greater than 0");
        }
        if let Some((collection, _)) = self.order_by.iter().find(|(_, o)| o.trim().is_empty()) {
            bail!("order_by for {} must not be empty", collection);
        }
        if self.fallback_program_name.trim().is_empty() {
            bail!("fallback_program_name must not be empty");
        }
        if self.default_status_code.trim().is_empty() {
            return Err(anyhow!("default_status_code must not be empty"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
