use crate::extract::Snapshot;
use crate::store::Row;
use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const MANIFEST_ENTRY: &str = "manifest.json";
pub const BACKUP_FORMAT_V1: &str = "attendance-migrate-backup-v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFile {
    pub collection: String,
    pub file: String,
    pub rows: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    pub format: String,
    pub app_version: String,
    pub created_at: String,
    pub files: Vec<BackupFile>,
}

#[derive(Debug, Clone)]
pub struct BackupSummary {
    pub dir: PathBuf,
    pub files: Vec<BackupFile>,
    pub bundle: Option<PathBuf>,
}

pub fn backup_dir_name(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

pub fn collection_file_name(collection: &str) -> String {
    format!("{}.json", collection)
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Writes every collection of `snapshot` as a pretty-printed JSON array to
/// `<root>/<timestamp>/<collection>.json`, plus a checksum manifest.
pub fn write_backup(
    root: &Path,
    snapshot: &Snapshot,
    at: DateTime<Utc>,
) -> anyhow::Result<BackupSummary> {
    let dir = root.join(backup_dir_name(at));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory {}", dir.to_string_lossy()))?;

    let mut files = Vec::new();
    for (name, rows) in snapshot.iter() {
        let file = collection_file_name(name);
        let path = dir.join(&file);
        let text = serde_json::to_string_pretty(rows)
            .with_context(|| format!("failed to serialize {}", name))?;
        std::fs::write(&path, text.as_bytes())
            .with_context(|| format!("failed to write {}", path.to_string_lossy()))?;
        info!(collection = %name, rows = rows.len(), file = %path.display(), "BACKUP wrote collection");
        files.push(BackupFile {
            collection: name.to_string(),
            file,
            rows: rows.len(),
            sha256: sha256_hex(text.as_bytes()),
        });
    }

    let manifest = BackupManifest {
        format: BACKUP_FORMAT_V1.to_string(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        created_at: at.to_rfc3339(),
        files: files.clone(),
    };
    let manifest_path = dir.join(MANIFEST_ENTRY);
    std::fs::write(
        &manifest_path,
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize backup manifest")?
            .as_bytes(),
    )
    .with_context(|| format!("failed to write {}", manifest_path.to_string_lossy()))?;

    Ok(BackupSummary {
        dir,
        files,
        bundle: None,
    })
}

pub fn read_backup_manifest(dir: &Path) -> anyhow::Result<BackupManifest> {
    let path = dir.join(MANIFEST_ENTRY);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
    let manifest: BackupManifest =
        serde_json::from_str(&text).context("backup manifest.json is invalid JSON")?;
    if manifest.format != BACKUP_FORMAT_V1 {
        return Err(anyhow!("unsupported backup format: {}", manifest.format));
    }
    Ok(manifest)
}

pub fn read_backup_collection(dir: &Path, collection: &str) -> anyhow::Result<Vec<Row>> {
    let path = dir.join(collection_file_name(collection));
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of objects", path.to_string_lossy()))
}

/// Re-reads a backup and checks checksums and contents against `snapshot`.
pub fn verify_backup(dir: &Path, snapshot: &Snapshot) -> anyhow::Result<()> {
    let manifest = read_backup_manifest(dir)?;
    for (name, rows) in snapshot.iter() {
        let entry = manifest
            .files
            .iter()
            .find(|f| f.collection == name)
            .ok_or_else(|| anyhow!("backup manifest has no entry for {}", name))?;
        let path = dir.join(&entry.file);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
        if sha256_hex(&bytes) != entry.sha256 {
            return Err(anyhow!("checksum mismatch for {}", entry.file));
        }
        let on_disk: Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("{} is invalid JSON", entry.file))?;
        let expected = Value::Array(rows.iter().cloned().map(Value::Object).collect());
        if on_disk != expected {
            return Err(anyhow!("contents of {} differ from the extracted rows", entry.file));
        }
    }
    Ok(())
}

/// Bundles a backup directory into a single zip next to it.
pub fn bundle_backup(dir: &Path, out_path: &Path) -> anyhow::Result<usize> {
    let manifest = read_backup_manifest(dir)?;
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = 0usize;
    let names = std::iter::once(MANIFEST_ENTRY.to_string())
        .chain(manifest.files.iter().map(|f| f.file.clone()));
    for name in names {
        let path = dir.join(&name);
        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", name))?;
        let mut f = File::open(&path)
            .with_context(|| format!("failed to open {}", path.to_string_lossy()))?;
        std::io::copy(&mut f, &mut zip).with_context(|| format!("failed to write entry {}", name))?;
        entries += 1;
    }
    zip.finish().context("failed to finalize zip bundle")?;
    info!(bundle = %out_path.display(), entries, "BACKUP bundled");
    Ok(entries)
}
