use tracing::{debug, info, warn};

use super::blocks::BlockExtractor;
use super::record::RecordParser;
use crate::error::StorageError;
use crate::model::{IngestReport, Rejection, SessionKind};
use crate::store::ExamRepository;

/// Page texts of one source PDF, tagged with the name stored as provenance.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub pages: Vec<String>,
}

/// Runs every candidate block of `document` through the parser and the store.
///
/// Each date entry of a block is stored or rejected on its own. Rejections
/// are collected in the report; only a storage failure stops the document.
pub fn ingest(
    repository: &mut ExamRepository,
    extractor: &BlockExtractor,
    parser: &RecordParser,
    document: &SourceDocument,
    session_kind: SessionKind,
) -> Result<IngestReport, StorageError> {
    let mut report = IngestReport::new(&document.name, session_kind);

    for block in extractor.segment(&document.pages) {
        report.block_count += 1;

        for entry in parser.parse(&block, &document.name, session_kind) {
            match entry {
                Ok(record) => {
                    let outcome = repository.upsert(&record)?;
                    debug!(
                        block_index = block.index,
                        subject = %record.subject(),
                        date = %record.exam_date(),
                        outcome = ?outcome,
                        "stored exam"
                    );
                    report.record_outcome(outcome);
                }
                Err(error) => {
                    warn!(
                        document = %document.name,
                        block_index = block.index,
                        page = block.page,
                        kind = error.kind(),
                        error = %error,
                        "rejected date entry"
                    );
                    report.rejected.push(Rejection {
                        block_index: block.index,
                        page: block.page,
                        heading: block.heading.clone(),
                        kind: error.kind().to_string(),
                        message: error.to_string(),
                    });
                }
            }
        }
    }

    info!(
        document = %document.name,
        session = %session_kind,
        blocks = report.block_count,
        accepted = report.accepted,
        inserted = report.inserted,
        updated = report.updated,
        rejected = report.rejected.len(),
        "document ingested"
    );

    Ok(report)
}
