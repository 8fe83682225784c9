#![allow(dead_code)]

use attendance_migrate::config::BackupConfig;
use attendance_migrate::store::SqliteStore;
use attendance_migrate::{MigrationConfig, Row, StoreConfig, StoreError, TableStore};
use serde_json::{json, Value};
use std::cell::Cell;
use std::path::Path;

pub fn row(v: Value) -> Row {
    v.as_object().cloned().expect("fixture row must be an object")
}

pub fn config_for(dir: &Path) -> MigrationConfig {
    MigrationConfig {
        source: StoreConfig::Sqlite {
            path: dir.join("source.sqlite3"),
        },
        destination: StoreConfig::Sqlite {
            path: dir.join("destination.sqlite3"),
        },
        backup: BackupConfig {
            dir: dir.join("backup_data"),
            zip: false,
        },
        state_dir: dir.join("state"),
        ..MigrationConfig::default()
    }
}

/// Source data for one organization with two programs, three students and
/// `attendance` attendance rows with a mix of legacy status spellings.
pub fn seed_source(store: &SqliteStore, attendance: usize) {
    store
        .insert(
            "organizations",
            &[row(json!({ "id": "org-1", "name": "Orquesta Juvenil" }))],
        )
        .expect("seed organizations");
    store
        .insert(
            "programs",
            &[
                row(json!({ "id": "p-stafford", "name": "Stafford", "organization_id": "org-1" })),
                row(json!({ "id": "p-east", "name": "East Side", "organization_id": "org-1" })),
            ],
        )
        .expect("seed programs");
    store
        .insert(
            "students",
            &[
                row(json!({ "id": "s1", "first_name": " Ana ", "last_name": "Pérez", "program_id": "p-east", "instrument": "Violín", "position": null })),
                row(json!({ "id": "s2", "first_name": "Luis", "last_name": " Gómez ", "program_id": null, "instrument": "" })),
                row(json!({ "id": "s3", "first_name": "Sofía", "last_name": "Ruiz", "program_id": "p-stafford", "instrument": "Cello", "position": "Principal" })),
            ],
        )
        .expect("seed students");
    store
        .insert(
            "parents",
            &[row(json!({ "id": "pa1", "name": "Marta Pérez", "phone": "555-0101" }))],
        )
        .expect("seed parents");
    store
        .insert(
            "student_parents",
            &[row(json!({ "student_id": "s1", "parent_id": "pa1" }))],
        )
        .expect("seed links");
    store
        .insert(
            "attendance_status",
            &[
                row(json!({ "code": "A", "name": "Asistió", "color": "#2e7d32" })),
                row(json!({ "code": "EA", "name": "Falta justificada", "color": "#f9a825" })),
                row(json!({ "code": "UA", "name": "Falta injustificada", "color": "#c62828" })),
            ],
        )
        .expect("seed status definitions");

    let spellings = ["presente", "FALTA JUSTIFICADA", "unexcused", "A", "???"];
    let students = ["s1", "s2", "s3", "s-gone"];
    let rows: Vec<Row> = (0..attendance)
        .map(|i| {
            row(json!({
                "id": i,
                "student_id": students[i % students.len()],
                "program_id": if i % 7 == 0 { json!("p-east") } else { Value::Null },
                "date": format!("2024-03-{:02}", (i % 28) + 1),
                "status": spellings[i % spellings.len()],
            }))
        })
        .collect();
    store.insert("attendance", &rows).expect("seed attendance");
}

/// Destination wrapper whose `n`-th insert into `collection` fails once.
pub struct FlakyStore {
    pub inner: SqliteStore,
    collection: &'static str,
    fail_on: Cell<Option<usize>>,
    calls: Cell<usize>,
}

impl FlakyStore {
    pub fn new(inner: SqliteStore, collection: &'static str, fail_on: usize) -> Self {
        Self {
            inner,
            collection,
            fail_on: Cell::new(Some(fail_on)),
            calls: Cell::new(0),
        }
    }

    pub fn insert_calls(&self) -> usize {
        self.calls.get()
    }
}

impl TableStore for FlakyStore {
    fn label(&self) -> &str {
        "flaky-destination"
    }

    fn fetch_all(&self, collection: &str) -> Result<Vec<Row>, StoreError> {
        self.inner.fetch_all(collection)
    }

    fn insert(&self, collection: &str, rows: &[Row]) -> Result<(), StoreError> {
        if collection == self.collection {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if self.fail_on.get() == Some(n) {
                self.fail_on.set(None);
                return Err(StoreError::Http {
                    status: 503,
                    url: format!("sqlite://{}", collection),
                    body: "batch rejected".to_string(),
                });
            }
        }
        self.inner.insert(collection, rows)
    }

    fn find_eq(&self, collection: &str, column: &str, value: &Value) -> Result<Vec<Row>, StoreError> {
        self.inner.find_eq(collection, column, value)
    }
}

/// Source wrapper whose reads of `collection` always fail.
pub struct BrokenSource {
    pub inner: SqliteStore,
    collection: &'static str,
    pub fetched: std::cell::RefCell<Vec<String>>,
}

impl BrokenSource {
    pub fn new(inner: SqliteStore, collection: &'static str) -> Self {
        Self {
            inner,
            collection,
            fetched: std::cell::RefCell::new(Vec::new()),
        }
    }
}

impl TableStore for BrokenSource {
    fn label(&self) -> &str {
        "broken-source"
    }

    fn fetch_all(&self, collection: &str) -> Result<Vec<Row>, StoreError> {
        self.fetched.borrow_mut().push(collection.to_string());
        if collection == self.collection {
            return Err(StoreError::Http {
                status: 500,
                url: format!("sqlite://{}", collection),
                body: "read failed".to_string(),
            });
        }
        self.inner.fetch_all(collection)
    }

    fn insert(&self, collection: &str, rows: &[Row]) -> Result<(), StoreError> {
        self.inner.insert(collection, rows)
    }

    fn find_eq(&self, collection: &str, column: &str, value: &Value) -> Result<Vec<Row>, StoreError> {
        self.inner.find_eq(collection, column, value)
    }
}
