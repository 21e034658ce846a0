use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ParseError;
use crate::util::condense_whitespace;

const EVENT_UID_DOMAIN: &str = "exam-calendar";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Ordinary,
    OutOfCourse,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ordinary => "ordinary",
            Self::OutOfCourse => "out_of_course",
        }
    }

    /// Label printed in tables and calendar descriptions.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ordinary => "Ordinario",
            Self::OutOfCourse => "Fuori Corso",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ordinary" => Ok(Self::Ordinary),
            "out_of_course" => Ok(Self::OutOfCourse),
            other => Err(format!("unknown session kind: {other}")),
        }
    }
}

/// Comparison form of a subject: case-folded with whitespace collapsed.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct SubjectKey(String);

impl SubjectKey {
    pub fn new(subject: &str) -> Self {
        Self(condense_whitespace(subject).to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ExamRecord {
    subject: String,
    exam_date: NaiveDate,
    session_kind: SessionKind,
    source_document: String,
}

impl ExamRecord {
    pub fn new(
        subject: &str,
        exam_date: NaiveDate,
        session_kind: SessionKind,
        source_document: &str,
    ) -> Result<Self, ParseError> {
        let subject = condense_whitespace(subject);
        if subject.is_empty() {
            return Err(ParseError::MissingSubject);
        }

        Ok(Self {
            subject,
            exam_date,
            session_kind,
            source_document: source_document.trim().to_string(),
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn exam_date(&self) -> NaiveDate {
        self.exam_date
    }

    pub fn session_kind(&self) -> SessionKind {
        self.session_kind
    }

    pub fn source_document(&self) -> &str {
        &self.source_document
    }

    pub fn subject_key(&self) -> SubjectKey {
        SubjectKey::new(&self.subject)
    }

    pub fn key(&self) -> (SubjectKey, NaiveDate, SessionKind) {
        (self.subject_key(), self.exam_date, self.session_kind)
    }

    /// Calendar UID derived from the uniqueness key only, so re-exports keep it.
    pub fn event_uid(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.subject_key().as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(self.exam_date.format("%Y-%m-%d").to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(self.session_kind.as_str().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        format!("{}@{EVENT_UID_DOMAIN}", &digest[..32])
    }

    pub fn display_date(&self) -> String {
        self.exam_date.format("%d-%m-%Y").to_string()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Stored row as shown by `list` and `search`.
#[derive(Clone, Debug, Serialize)]
pub struct StoredExam {
    pub exam_id: i64,
    #[serde(flatten)]
    pub record: ExamRecord,
}

#[derive(Clone, Debug, Serialize)]
pub struct Rejection {
    pub block_index: usize,
    pub page: usize,
    pub heading: Option<String>,
    pub kind: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct IngestReport {
    pub document: String,
    pub session_kind: SessionKind,
    pub block_count: usize,
    pub accepted: usize,
    pub inserted: usize,
    pub updated: usize,
    pub rejected: Vec<Rejection>,
}

impl IngestReport {
    pub fn new(document: &str, session_kind: SessionKind) -> Self {
        Self {
            document: document.to_string(),
            session_kind,
            block_count: 0,
            accepted: 0,
            inserted: 0,
            updated: 0,
            rejected: Vec::new(),
        }
    }

    pub fn record_outcome(&mut self, outcome: UpsertOutcome) {
        self.accepted += 1;
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceDocumentEntry {
    pub path: String,
    pub sha256: String,
    pub page_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRunReport {
    pub report_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub db_path: String,
    pub sources: Vec<SourceDocumentEntry>,
    pub documents: Vec<IngestReport>,
}
