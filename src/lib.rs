//! One-shot migration of the orchestra attendance data from the old backend
//! to the new one: extract every collection, normalize attendance status
//! codes and program assignments, load in chunks, and keep a JSON backup of
//! what was extracted.

pub mod backup;
pub mod collections;
pub mod config;
pub mod error;
pub mod extract;
pub mod job;
pub mod load;
pub mod manifest;
pub mod program;
pub mod status;
pub mod store;
pub mod transform;

pub use config::{MigrationConfig, StoreConfig};
pub use error::MigrationError;
pub use extract::Snapshot;
pub use job::{JobFailure, JobReport, MigrationJob, RunOptions, Stage};
pub use store::{Row, StoreError, TableStore};
