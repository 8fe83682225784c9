use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const MANIFEST_FILE: &str = "load-manifest.json";

/// Completion log of one load: which collections and which attendance
/// chunks (1-based) are already committed in the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadManifest {
    pub run_id: String,
    pub started_at: String,
    pub updated_at: String,
    pub chunk_size: usize,
    #[serde(default)]
    pub completed_collections: Vec<String>,
    #[serde(default)]
    pub completed_chunks: BTreeSet<usize>,
    #[serde(default)]
    pub total_chunks: Option<usize>,
    #[serde(default)]
    pub completed: bool,
}

impl LoadManifest {
    pub fn new(chunk_size: usize) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: now.clone(),
            updated_at: now,
            chunk_size,
            completed_collections: Vec::new(),
            completed_chunks: BTreeSet::new(),
            total_chunks: None,
            completed: false,
        }
    }

    pub fn collection_done(&self, name: &str) -> bool {
        self.completed_collections.iter().any(|c| c == name)
    }

    pub fn mark_collection(&mut self, name: &str) {
        if !self.collection_done(name) {
            self.completed_collections.push(name.to_string());
        }
    }

    pub fn chunk_done(&self, chunk: usize) -> bool {
        self.completed_chunks.contains(&chunk)
    }

    pub fn mark_chunk(&mut self, chunk: usize) {
        self.completed_chunks.insert(chunk);
    }
}

pub fn manifest_path(state_dir: &Path) -> PathBuf {
    state_dir.join(MANIFEST_FILE)
}

pub fn read_manifest(path: &Path) -> anyhow::Result<Option<LoadManifest>> {
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read manifest {}", path.to_string_lossy()))?;
    let manifest = serde_json::from_slice(&bytes).context("manifest is invalid JSON")?;
    Ok(Some(manifest))
}

/// Write-then-rename so a crash never leaves a torn manifest behind.
pub fn write_manifest(path: &Path, manifest: &mut LoadManifest) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    manifest.updated_at = Utc::now().to_rfc3339();
    let tmp = path.with_extension("json.tmp");
    let mut f = File::create(&tmp)
        .with_context(|| format!("failed to create {}", tmp.to_string_lossy()))?;
    f.write_all(
        serde_json::to_string_pretty(manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest")?;
    f.flush().context("failed to flush manifest")?;
    drop(f);
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move manifest to {}", path.to_string_lossy()))?;
    Ok(())
}
