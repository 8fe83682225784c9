use crate::collections::EXTRACT_ORDER;
use crate::error::MigrationError;
use crate::store::{Row, TableStore};
use tracing::info;

/// Rows per collection, kept in extraction order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    collections: Vec<(String, Vec<Row>)>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the rows of `name` if present, otherwise appends it.
    pub fn insert(&mut self, name: &str, rows: Vec<Row>) {
        match self.collections.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = rows,
            None => self.collections.push((name.to_string(), rows)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[Row]> {
        self.collections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, rows)| rows.as_slice())
    }

    /// Rows of `name`, empty when the collection was never extracted.
    pub fn rows(&self, name: &str) -> &[Row] {
        self.get(name).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Row])> {
        self.collections
            .iter()
            .map(|(n, rows)| (n.as_str(), rows.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.collections.iter().map(|(_, rows)| rows.len()).sum()
    }
}

/// Reads every collection the job migrates. The first failure aborts: the
/// transformer needs complete referential data (student -> program).
pub fn extract_all<S: TableStore + ?Sized>(source: &S) -> Result<Snapshot, MigrationError> {
    let mut snapshot = Snapshot::new();
    for name in EXTRACT_ORDER {
        let rows = source
            .fetch_all(name)
            .map_err(|source| MigrationError::Extract {
                collection: name.to_string(),
                source,
            })?;
        info!(collection = %name, rows = rows.len(), "EXTRACT fetched collection");
        snapshot.insert(name, rows);
    }
    Ok(snapshot)
}
