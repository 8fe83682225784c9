use crate::store::Row;
use serde_json::Value;
use std::collections::HashSet;

pub const PRESENT: &str = "A";
pub const EXCUSED_ABSENCE: &str = "EA";
pub const UNEXCUSED_ABSENCE: &str = "UA";

// Stored uppercased; inputs are uppercased before lookup.
const PRESENT_SYNONYMS: &[&str] = &[
    "PRESENT",
    "PRESENTE",
    "ASISTIÓ",
    "ASISTIO",
    "ASISTENCIA",
    "ATTENDED",
    "P",
];
const EXCUSED_SYNONYMS: &[&str] = &[
    "EXCUSED",
    "EXCUSED ABSENCE",
    "FALTA JUSTIFICADA",
    "AUSENCIA JUSTIFICADA",
    "JUSTIFICADA",
    "JUSTIFIED",
    "E",
];
const UNEXCUSED_SYNONYMS: &[&str] = &[
    "UNEXCUSED",
    "UNEXCUSED ABSENCE",
    "FALTA INJUSTIFICADA",
    "AUSENCIA INJUSTIFICADA",
    "INJUSTIFICADA",
    "ABSENT",
    "AUSENTE",
    "FALTA",
    "U",
];

/// Legacy columns that may carry the status, in priority order.
pub const STATUS_FIELDS: &[&str] = &["status_code", "status", "code"];

/// Maps a legacy status token onto a canonical code.
///
/// A token already in `valid` is returned as-is even when it also appears
/// in a synonym list. A synonym only maps to its code when `valid` holds that
/// code. Unknown or empty input yields `None`; the caller picks the fallback.
pub fn normalize_status_code(input: Option<&str>, valid: &HashSet<String>) -> Option<String> {
    let trimmed = input?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let up = trimmed.to_uppercase();
    if valid.contains(&up) {
        return Some(up);
    }
    let code = if PRESENT_SYNONYMS.contains(&up.as_str()) {
        PRESENT
    } else if EXCUSED_SYNONYMS.contains(&up.as_str()) {
        EXCUSED_ABSENCE
    } else if UNEXCUSED_SYNONYMS.contains(&up.as_str()) {
        UNEXCUSED_ABSENCE
    } else {
        return None;
    };
    valid.get(code).cloned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusResolution {
    /// Resolved from the named legacy column.
    Matched { field: &'static str, code: String },
    /// Nothing usable on the row; the configured default was applied.
    Defaulted { code: String },
}

impl StatusResolution {
    pub fn code(&self) -> &str {
        match self {
            StatusResolution::Matched { code, .. } => code,
            StatusResolution::Defaulted { code } => code,
        }
    }
}

/// Tries `status_code`, `status`, then `code` on a legacy attendance row.
pub fn resolve_row_status(
    row: &Row,
    valid: &HashSet<String>,
    default_code: &str,
) -> StatusResolution {
    for field in STATUS_FIELDS.iter().copied() {
        let raw = row.get(field).and_then(status_text);
        if let Some(code) = normalize_status_code(raw.as_deref(), valid) {
            return StatusResolution::Matched { field, code };
        }
    }
    StatusResolution::Defaulted {
        code: default_code.to_string(),
    }
}

// Some exports stored the status as a number or boolean.
fn status_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some(PRESENT.to_string()),
        _ => None,
    }
}

/// The canonical code set as read from status definitions rows.
pub fn codes_from_definitions(rows: &[Row]) -> HashSet<String> {
    rows.iter()
        .filter_map(|r| r.get("code").and_then(|v| v.as_str()))
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical() -> HashSet<String> {
        ["A", "EA", "UA"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn canonical_codes_are_returned_unchanged() {
        let valid = canonical();
        for c in ["A", "EA", "UA"] {
            assert_eq!(normalize_status_code(Some(c), &valid).as_deref(), Some(c));
        }
        assert_eq!(normalize_status_code(Some(" ea "), &valid).as_deref(), Some("EA"));
    }

    #[test]
    fn valid_code_wins_over_synonym_list() {
        // "P" is a present-synonym, but a destination that defines "P" keeps it.
        let mut valid = canonical();
        valid.insert("P".to_string());
        assert_eq!(normalize_status_code(Some("p"), &valid).as_deref(), Some("P"));
        assert_eq!(normalize_status_code(Some("p"), &canonical()).as_deref(), Some("A"));
    }

    #[test]
    fn synonyms_map_case_insensitively() {
        let valid = canonical();
        for s in ["present", "PRESENTE", "asistió", "Asistio"] {
            assert_eq!(normalize_status_code(Some(s), &valid).as_deref(), Some("A"), "{}", s);
        }
        for s in ["excused", "FALTA JUSTIFICADA", "falta justificada"] {
            assert_eq!(normalize_status_code(Some(s), &valid).as_deref(), Some("EA"), "{}", s);
        }
        for s in ["unexcused", "FALTA INJUSTIFICADA", "Ausente"] {
            assert_eq!(normalize_status_code(Some(s), &valid).as_deref(), Some("UA"), "{}", s);
        }
    }

    #[test]
    fn synonym_of_an_undefined_code_is_none() {
        let valid: HashSet<String> = ["A", "UA"].iter().map(|s| s.to_string()).collect();
        assert_eq!(normalize_status_code(Some("excused"), &valid), None);
        assert_eq!(normalize_status_code(Some("EA"), &valid), None);
        assert_eq!(normalize_status_code(Some("ausente"), &valid).as_deref(), Some("UA"));

        let row = json!({ "status": "falta justificada", "code": "asistió" });
        let got = resolve_row_status(row.as_object().expect("obj"), &valid, "A");
        assert_eq!(
            got,
            StatusResolution::Matched {
                field: "code",
                code: "A".to_string()
            }
        );
        let row = json!({ "status": "excused" });
        let got = resolve_row_status(row.as_object().expect("obj"), &valid, "UA");
        assert_eq!(got, StatusResolution::Defaulted { code: "UA".to_string() });
    }

    #[test]
    fn unknown_or_empty_is_none() {
        let valid = canonical();
        assert_eq!(normalize_status_code(Some("XYZ"), &valid), None);
        assert_eq!(normalize_status_code(Some(""), &valid), None);
        assert_eq!(normalize_status_code(Some("   "), &valid), None);
        assert_eq!(normalize_status_code(None, &valid), None);
    }

    #[test]
    fn row_status_follows_field_priority_then_default() {
        let valid = canonical();
        let row = json!({ "status_code": "bogus", "status": "excused", "code": "UA" });
        let got = resolve_row_status(row.as_object().expect("obj"), &valid, "A");
        assert_eq!(
            got,
            StatusResolution::Matched {
                field: "status",
                code: "EA".to_string()
            }
        );

        let row = json!({ "status_code": null, "status": "XYZ" });
        let got = resolve_row_status(row.as_object().expect("obj"), &valid, "A");
        assert_eq!(got, StatusResolution::Defaulted { code: "A".to_string() });
        assert_eq!(got.code(), "A");
    }

    #[test]
    fn definitions_yield_uppercased_codes() {
        let rows = vec![
            json!({ "code": "a", "name": "Asistió", "color": "#0f0" }),
            json!({ "code": " EA ", "name": "Falta justificada", "color": "#ff0" }),
            json!({ "name": "missing code" }),
        ];
        let rows: Vec<Row> = rows.into_iter().map(|v| v.as_object().cloned().expect("obj")).collect();
        let codes = codes_from_definitions(&rows);
        assert_eq!(codes.len(), 2);
        assert!(codes.contains("A") && codes.contains("EA"));
    }
}
