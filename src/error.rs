use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Every variant aborts the job; there are no retries.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("EXTRACT {collection}: {source}")]
    Extract {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("TRANSFORM: reading {collection} from destination: {source}")]
    DestinationLookup {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("TRANSFORM: fallback program {name:?} not found in destination or source programs")]
    FallbackProgramMissing { name: String },

    #[error("TRANSFORM: fallback program {name:?} has no id")]
    FallbackProgramWithoutId { name: String },

    #[error("TRANSFORM: default status code {code:?} is not one of the valid codes {valid:?}")]
    InvalidDefaultStatus { code: String, valid: Vec<String> },

    #[error("LOAD {collection}: {source}")]
    Insert {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("LOAD {collection}: chunk {chunk} of {total} failed: {source}")]
    ChunkInsert {
        collection: String,
        chunk: usize,
        total: usize,
        #[source]
        source: StoreError,
    },

    #[error("LOAD: manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("BACKUP: {message}")]
    Backup { message: String },
}

impl MigrationError {
    pub(crate) fn backup(err: anyhow::Error) -> Self {
        MigrationError::Backup {
            message: format!("{:#}", err),
        }
    }

    pub(crate) fn manifest(path: &std::path::Path, err: anyhow::Error) -> Self {
        MigrationError::Manifest {
            path: path.to_path_buf(),
            message: format!("{:#}", err),
        }
    }
}
