//! SQL schema for the exam store.

pub const DB_SCHEMA_VERSION: &str = "1.0.0";

/// Idempotent DDL. The uniqueness key lives in the table definition so a
/// second writer cannot race past an application-level check.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS exams (
    exam_id         INTEGER PRIMARY KEY AUTOINCREMENT,
    subject         TEXT NOT NULL CHECK (length(trim(subject)) > 0),
    subject_key     TEXT NOT NULL CHECK (length(subject_key) > 0),
    exam_date       TEXT NOT NULL CHECK (date(exam_date) IS exam_date),
    session_kind    TEXT NOT NULL CHECK (session_kind IN ('ordinary', 'out_of_course')),
    source_document TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    UNIQUE (subject_key, exam_date, session_kind)
);

CREATE INDEX IF NOT EXISTS exams_date_subject_idx ON exams(exam_date, subject);
CREATE INDEX IF NOT EXISTS exams_source_idx       ON exams(source_document);
";
