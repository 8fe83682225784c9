pub const ORGANIZATIONS: &str = "organizations";
pub const PROGRAMS: &str = "programs";
pub const STUDENTS: &str = "students";
pub const PARENTS: &str = "parents";
pub const STUDENT_PARENTS: &str = "student_parents";
pub const ATTENDANCE_STATUS: &str = "attendance_status";
pub const ATTENDANCE: &str = "attendance";

/// Read order of the extractor.
pub const EXTRACT_ORDER: &[&str] = &[
    ORGANIZATIONS,
    PROGRAMS,
    STUDENTS,
    PARENTS,
    STUDENT_PARENTS,
    ATTENDANCE_STATUS,
    ATTENDANCE,
];

/// Write order of the loader: parents of a foreign key always land first.
pub const LOAD_ORDER: &[&str] = &[
    ORGANIZATIONS,
    PROGRAMS,
    ATTENDANCE_STATUS,
    PARENTS,
    STUDENTS,
    STUDENT_PARENTS,
    ATTENDANCE,
];

/// PostgREST `order` used when paging through a collection. Every key is
/// unique per row so limit/offset pages neither skip nor repeat rows.
pub fn default_order(collection: &str) -> &'static str {
    match collection {
        ATTENDANCE_STATUS => "code.asc",
        STUDENT_PARENTS => "student_id.asc,parent_id.asc",
        _ => "id.asc",
    }
}
