use crate::collections::ATTENDANCE;
use crate::error::MigrationError;
use crate::manifest::{read_manifest, write_manifest, LoadManifest};
use crate::store::{Row, TableStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Splits `rows` into batches of `size`; only the last may be shorter.
pub fn chunk_rows(rows: &[Row], size: usize) -> Vec<&[Row]> {
    rows.chunks(size.max(1)).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub inserted: BTreeMap<String, usize>,
    pub skipped_collections: Vec<String>,
    pub skipped_chunks: Vec<usize>,
}

pub struct Loader<'a, D: TableStore + ?Sized> {
    destination: &'a D,
    chunk_size: usize,
    manifest_path: PathBuf,
    manifest: LoadManifest,
    report: LoadReport,
}

impl<'a, D: TableStore + ?Sized> Loader<'a, D> {
    /// With `resume`, picks up the completion log left by an earlier run;
    /// otherwise starts a fresh one.
    pub fn begin(
        destination: &'a D,
        chunk_size: usize,
        manifest_path: &Path,
        resume: bool,
    ) -> Result<Self, MigrationError> {
        let previous =
            read_manifest(manifest_path).map_err(|e| MigrationError::manifest(manifest_path, e))?;
        let mut manifest = match previous {
            Some(m) if resume => {
                if m.chunk_size != chunk_size {
                    return Err(MigrationError::Manifest {
                        path: manifest_path.to_path_buf(),
                        message: format!(
                            "manifest was written with chunk size {}, current chunk size is {}",
                            m.chunk_size, chunk_size
                        ),
                    });
                }
                info!(
                    run_id = %m.run_id,
                    collections = m.completed_collections.len(),
                    chunks = m.completed_chunks.len(),
                    "LOAD resuming from manifest"
                );
                m
            }
            Some(m) => {
                if !m.completed {
                    warn!(run_id = %m.run_id, "LOAD replacing manifest of an unfinished run");
                }
                LoadManifest::new(chunk_size)
            }
            None => LoadManifest::new(chunk_size),
        };
        write_manifest(manifest_path, &mut manifest)
            .map_err(|e| MigrationError::manifest(manifest_path, e))?;
        Ok(Self {
            destination,
            chunk_size,
            manifest_path: manifest_path.to_path_buf(),
            manifest,
            report: LoadReport::default(),
        })
    }

    fn save(&mut self) -> Result<(), MigrationError> {
        write_manifest(&self.manifest_path, &mut self.manifest)
            .map_err(|e| MigrationError::manifest(&self.manifest_path, e))
    }

    pub fn load_collection(&mut self, name: &str, rows: &[Row]) -> Result<(), MigrationError> {
        if self.manifest.collection_done(name) {
            info!(collection = %name, "LOAD already committed, skipping");
            self.report.skipped_collections.push(name.to_string());
            return Ok(());
        }
        if name == ATTENDANCE {
            self.load_chunked(name, rows)?;
        } else {
            if !rows.is_empty() {
                self.destination
                    .insert(name, rows)
                    .map_err(|source| MigrationError::Insert {
                        collection: name.to_string(),
                        source,
                    })?;
            }
            *self.report.inserted.entry(name.to_string()).or_insert(0) += rows.len();
            info!(collection = %name, rows = rows.len(), "LOAD inserted collection");
        }
        self.manifest.mark_collection(name);
        self.save()
    }

    fn load_chunked(&mut self, name: &str, rows: &[Row]) -> Result<(), MigrationError> {
        let chunks = chunk_rows(rows, self.chunk_size);
        let total = chunks.len();
        self.manifest.total_chunks = Some(total);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let n = i + 1;
            if self.manifest.chunk_done(n) {
                info!(collection = %name, chunk = n, total, "LOAD chunk already committed, skipping");
                self.report.skipped_chunks.push(n);
                continue;
            }
            self.destination
                .insert(name, chunk)
                .map_err(|source| MigrationError::ChunkInsert {
                    collection: name.to_string(),
                    chunk: n,
                    total,
                    source,
                })?;
            *self.report.inserted.entry(name.to_string()).or_insert(0) += chunk.len();
            self.manifest.mark_chunk(n);
            self.save()?;
            info!(collection = %name, chunk = n, total, rows = chunk.len(), "LOAD inserted chunk");
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<LoadReport, MigrationError> {
        self.manifest.completed = true;
        self.save()?;
        Ok(self.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| json!({ "id": i }).as_object().cloned().expect("object"))
            .collect()
    }

    #[test]
    fn chunk_counts_and_sizes() {
        for (n, k) in [(0usize, 1000usize), (1, 1000), (999, 1000), (1000, 1000), (1001, 1000), (2500, 1000), (7, 3)] {
            let data = rows(n);
            let chunks = chunk_rows(&data, k);
            assert_eq!(chunks.len(), n.div_ceil(k), "n={} k={}", n, k);
            for c in chunks.iter().take(chunks.len().saturating_sub(1)) {
                assert_eq!(c.len(), k);
            }
            let joined: Vec<Row> = chunks.iter().flat_map(|c| c.iter().cloned()).collect();
            assert_eq!(joined, data);
        }
    }

    #[test]
    fn last_chunk_holds_remainder() {
        let data = rows(2500);
        let sizes: Vec<usize> = chunk_rows(&data, 1000).iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);
    }
}
