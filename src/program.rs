use crate::collections::PROGRAMS;
use crate::error::MigrationError;
use crate::store::{value_key, Row, TableStore};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramSource {
    Explicit,
    Student,
    Fallback,
}

/// Assigns a program to every attendance row: the row's own `program_id`,
/// else the owning student's program, else the fallback program.
#[derive(Debug, Clone)]
pub struct ProgramResolver {
    by_student: HashMap<String, Value>,
    fallback: Value,
}

impl ProgramResolver {
    /// Later student rows win when a student id repeats.
    pub fn from_students(students: &[Row], fallback: Value) -> Self {
        let mut by_student = HashMap::new();
        for s in students {
            let Some(id) = s.get("id").and_then(value_key) else {
                continue;
            };
            match s.get("program_id") {
                Some(p) if !p.is_null() => {
                    by_student.insert(id, p.clone());
                }
                _ => {}
            }
        }
        Self {
            by_student,
            fallback,
        }
    }

    pub fn fallback(&self) -> &Value {
        &self.fallback
    }

    pub fn known_students(&self) -> usize {
        self.by_student.len()
    }

    pub fn resolve(&self, row: &Row) -> (Value, ProgramSource) {
        if let Some(p) = row.get("program_id").filter(|p| !p.is_null()) {
            return (p.clone(), ProgramSource::Explicit);
        }
        let student_program = row
            .get("student_id")
            .and_then(value_key)
            .and_then(|sid| self.by_student.get(&sid));
        match student_program {
            Some(p) => (p.clone(), ProgramSource::Student),
            None => (self.fallback.clone(), ProgramSource::Fallback),
        }
    }
}

/// Looks the fallback program up by name in the destination first, then in
/// the extracted source programs (loaded with the same ids before any
/// attendance row is written).
pub fn resolve_fallback_program<D: TableStore + ?Sized>(
    destination: &D,
    source_programs: &[Row],
    name: &str,
) -> Result<Value, MigrationError> {
    let wanted = Value::String(name.to_string());
    let found = destination
        .find_eq(PROGRAMS, "name", &wanted)
        .map_err(|source| MigrationError::DestinationLookup {
            collection: PROGRAMS.to_string(),
            source,
        })?;
    let (row, origin) = match found.into_iter().next() {
        Some(row) => (row, "destination"),
        None => {
            let hit = source_programs
                .iter()
                .find(|p| p.get("name").and_then(|v| v.as_str()).map(str::trim) == Some(name.trim()))
                .cloned();
            match hit {
                Some(row) => {
                    warn!(program = %name, "TRANSFORM fallback program not in destination yet, using source row");
                    (row, "source")
                }
                None => {
                    return Err(MigrationError::FallbackProgramMissing {
                        name: name.to_string(),
                    })
                }
            }
        }
    };
    let id = row
        .get("id")
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| MigrationError::FallbackProgramWithoutId {
            name: name.to_string(),
        })?;
    info!(program = %name, id = %id, origin, "TRANSFORM resolved fallback program");
    Ok(id)
}
