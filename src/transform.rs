use crate::collections::{ATTENDANCE, ATTENDANCE_STATUS, PROGRAMS, STUDENTS};
use crate::config::MigrationConfig;
use crate::error::MigrationError;
use crate::extract::Snapshot;
use crate::program::{resolve_fallback_program, ProgramResolver, ProgramSource};
use crate::status::{codes_from_definitions, resolve_row_status, StatusResolution};
use crate::store::{Row, TableStore};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Legacy attendance columns dropped once `status_code` is settled.
const LEGACY_ATTENDANCE_FIELDS: &[&str] = &["status", "code"];

pub struct TransformContext {
    pub valid_codes: HashSet<String>,
    pub default_status: String,
    pub programs: ProgramResolver,
    pub instrument_placeholder: String,
    pub position_placeholder: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformReport {
    pub attendance_rows: usize,
    /// Which legacy column produced the code, keyed by column name.
    pub status_matched_by_field: BTreeMap<String, usize>,
    pub status_defaulted: usize,
    pub program_explicit: usize,
    pub program_from_student: usize,
    pub program_fallback: usize,
    pub students_defaulted_instrument: usize,
    pub students_defaulted_position: usize,
}

/// Settles the canonical code set and the fallback program against the
/// destination before any row is touched.
pub fn prepare_context<D: TableStore + ?Sized>(
    destination: &D,
    snapshot: &Snapshot,
    cfg: &MigrationConfig,
) -> Result<TransformContext, MigrationError> {
    let definitions = destination
        .fetch_all(ATTENDANCE_STATUS)
        .map_err(|source| MigrationError::DestinationLookup {
            collection: ATTENDANCE_STATUS.to_string(),
            source,
        })?;
    let mut valid_codes = codes_from_definitions(&definitions);
    if valid_codes.is_empty() {
        warn!(
            codes = ?cfg.canonical_status_codes,
            "TRANSFORM destination has no status definitions, using configured canonical codes"
        );
        valid_codes = cfg
            .canonical_status_codes
            .iter()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
    }

    let default_status = cfg.default_status_code.trim().to_uppercase();
    if !valid_codes.contains(&default_status) {
        let mut valid: Vec<String> = valid_codes.into_iter().collect();
        valid.sort();
        return Err(MigrationError::InvalidDefaultStatus {
            code: default_status,
            valid,
        });
    }

    let fallback =
        resolve_fallback_program(destination, snapshot.rows(PROGRAMS), &cfg.fallback_program_name)?;
    let programs = ProgramResolver::from_students(snapshot.rows(STUDENTS), fallback);

    Ok(TransformContext {
        valid_codes,
        default_status,
        programs,
        instrument_placeholder: cfg.instrument_placeholder.clone(),
        position_placeholder: cfg.position_placeholder.clone(),
    })
}

pub fn transform_snapshot(snapshot: &Snapshot, ctx: &TransformContext) -> (Snapshot, TransformReport) {
    let mut report = TransformReport::default();
    let mut out = Snapshot::new();
    for (name, rows) in snapshot.iter() {
        let transformed: Vec<Row> = match name {
            STUDENTS => rows
                .iter()
                .map(|r| transform_student(r, ctx, &mut report))
                .collect(),
            ATTENDANCE_STATUS => rows.iter().map(transform_status_definition).collect(),
            ATTENDANCE => rows
                .iter()
                .map(|r| transform_attendance(r, ctx, &mut report))
                .collect(),
            _ => rows.to_vec(),
        };
        out.insert(name, transformed);
    }
    info!(
        rows = report.attendance_rows,
        defaulted = report.status_defaulted,
        program_fallback = report.program_fallback,
        "TRANSFORM attendance normalized"
    );
    if report.status_defaulted > 0 {
        warn!(
            count = report.status_defaulted,
            code = %ctx.default_status,
            "TRANSFORM attendance rows without a recognizable status were defaulted"
        );
    }
    (out, report)
}

pub fn transform_attendance(row: &Row, ctx: &TransformContext, report: &mut TransformReport) -> Row {
    let mut out = row.clone();
    let status = resolve_row_status(row, &ctx.valid_codes, &ctx.default_status);
    match &status {
        StatusResolution::Matched { field, .. } => {
            *report
                .status_matched_by_field
                .entry(field.to_string())
                .or_insert(0) += 1;
        }
        StatusResolution::Defaulted { .. } => {
            report.status_defaulted += 1;
            warn!(
                id = ?row.get("id"),
                status_code = ?row.get("status_code"),
                status = ?row.get("status"),
                code = ?row.get("code"),
                "TRANSFORM unrecognized attendance status"
            );
        }
    }

    let (program_id, source) = ctx.programs.resolve(row);
    match source {
        ProgramSource::Explicit => report.program_explicit += 1,
        ProgramSource::Student => report.program_from_student += 1,
        ProgramSource::Fallback => report.program_fallback += 1,
    }

    for field in LEGACY_ATTENDANCE_FIELDS {
        out.remove(*field);
    }
    out.insert(
        "status_code".to_string(),
        Value::String(status.code().to_string()),
    );
    out.insert("program_id".to_string(), program_id);
    report.attendance_rows += 1;
    out
}

pub fn transform_student(row: &Row, ctx: &TransformContext, report: &mut TransformReport) -> Row {
    let mut out = row.clone();
    for field in ["first_name", "last_name"] {
        if let Some(Value::String(s)) = out.get_mut(field) {
            let trimmed = s.trim().to_string();
            *s = trimmed;
        }
    }
    if fill_blank(&mut out, "instrument", &ctx.instrument_placeholder) {
        report.students_defaulted_instrument += 1;
    }
    if fill_blank(&mut out, "position", &ctx.position_placeholder) {
        report.students_defaulted_position += 1;
    }
    out
}

fn transform_status_definition(row: &Row) -> Row {
    let mut out = row.clone();
    if let Some(Value::String(code)) = out.get_mut("code") {
        let up = code.trim().to_uppercase();
        *code = up;
    }
    out
}

/// Writes `placeholder` into a missing, null or blank string field.
fn fill_blank(row: &mut Row, field: &str, placeholder: &str) -> bool {
    let blank = match row.get(field) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    };
    if blank {
        row.insert(field.to_string(), Value::String(placeholder.to_string()));
    } else if let Some(Value::String(s)) = row.get_mut(field) {
        let trimmed = s.trim().to_string();
        *s = trimmed;
    }
    blank
}
