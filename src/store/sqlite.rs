use super::{value_key, Row, StoreError, TableStore};
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;

/// Local store keeping every collection as JSON documents in one SQLite file.
/// Used for rehearsal runs against a copy of the data and for tests.
pub struct SqliteStore {
    label: String,
    conn: Connection,
}

impl SqliteStore {
    pub fn open(label: &str, path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(label, conn)
    }

    pub fn open_in_memory(label: &str) -> Result<Self, StoreError> {
        Self::init(label, Connection::open_in_memory()?)
    }

    fn init(label: &str, conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records(
                collection TEXT NOT NULL,
                seq INTEGER NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY(collection, seq)
            )",
            [],
        )?;
        Ok(Self {
            label: label.to_string(),
            conn,
        })
    }

    fn decode(collection: &str, body: &str) -> Result<Row, StoreError> {
        match serde_json::from_str::<Value>(body)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::InvalidRow {
                collection: collection.to_string(),
            }),
        }
    }
}

// json_extract yields 1/0 for JSON booleans.
fn sql_key(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        other => value_key(other),
    }
}

impl TableStore for SqliteStore {
    fn label(&self) -> &str {
        &self.label
    }

    fn fetch_all(&self, collection: &str) -> Result<Vec<Row>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM records WHERE collection = ? ORDER BY seq")?;
        let bodies = stmt
            .query_map([collection], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        bodies
            .iter()
            .map(|b| Self::decode(collection, b))
            .collect()
    }

    fn insert(&self, collection: &str, rows: &[Row]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), -1) + 1 FROM records WHERE collection = ?",
            [collection],
            |r| r.get(0),
        )?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO records(collection, seq, body) VALUES(?, ?, ?)")?;
            for (i, row) in rows.iter().enumerate() {
                let body = serde_json::to_string(row)?;
                stmt.execute((collection, next + i as i64, body))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn find_eq(
        &self,
        collection: &str,
        column: &str,
        value: &Value,
    ) -> Result<Vec<Row>, StoreError> {
        let path = format!("$.\"{}\"", column.replace('"', ""));
        let bodies = match sql_key(value) {
            Some(key) => {
                let mut stmt = self.conn.prepare(
                    "SELECT body FROM records
                     WHERE collection = ? AND CAST(json_extract(body, ?) AS TEXT) = ?
                     ORDER BY seq",
                )?;
                let rows = stmt
                    .query_map((collection, &path, &key), |r| r.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT body FROM records
                     WHERE collection = ? AND json_extract(body, ?) IS NULL
                     ORDER BY seq",
                )?;
                let rows = stmt
                    .query_map((collection, &path), |r| r.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        bodies
            .iter()
            .map(|b| Self::decode(collection, b))
            .collect()
    }
}
