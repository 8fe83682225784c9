//! Tabular stores the job reads from and writes to.
//!
//! Both the old and the new backend expose the same small surface: read a
//! whole collection, insert a batch of rows, filter a collection by one
//! column. Rows are plain JSON objects because the column sets differ
//! between schema versions.

mod rest;
mod sqlite;

pub use rest::RestStore;
pub use sqlite::SqliteStore;

use serde_json::{Map, Value};
use thiserror::Error;

pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("row in {collection} is not a JSON object")]
    InvalidRow { collection: String },
}

pub trait TableStore {
    /// Short label used in log lines ("source", "destination").
    fn label(&self) -> &str;

    /// Every row of `collection`, in store order.
    fn fetch_all(&self, collection: &str) -> Result<Vec<Row>, StoreError>;

    fn insert(&self, collection: &str, rows: &[Row]) -> Result<(), StoreError>;

    fn find_eq(&self, collection: &str, column: &str, value: &Value)
        -> Result<Vec<Row>, StoreError>;
}

impl<T: TableStore + ?Sized> TableStore for Box<T> {
    fn label(&self) -> &str {
        (**self).label()
    }

    fn fetch_all(&self, collection: &str) -> Result<Vec<Row>, StoreError> {
        (**self).fetch_all(collection)
    }

    fn insert(&self, collection: &str, rows: &[Row]) -> Result<(), StoreError> {
        (**self).insert(collection, rows)
    }

    fn find_eq(
        &self,
        collection: &str,
        column: &str,
        value: &Value,
    ) -> Result<Vec<Row>, StoreError> {
        (**self).find_eq(collection, column, value)
    }
}

/// Text form of an id or filter value. Ids arrive as UUID strings from one
/// backend and integers from the other; both compare by this form.
pub fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn rows_from_value(collection: &str, value: Value) -> Result<Vec<Row>, StoreError> {
    let Value::Array(items) = value else {
        return Err(StoreError::InvalidRow {
            collection: collection.to_string(),
        });
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::InvalidRow {
                collection: collection.to_string(),
            }),
        })
        .collect()
}
