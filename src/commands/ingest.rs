use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::info;

use crate::cli::IngestArgs;
use crate::ingest::{
    AnchorConfig, BlockExtractor, RecordParser, SourceDocument, ingest, load_pages,
};
use crate::model::{IngestReport, IngestRunReport, SessionKind, SourceDocumentEntry};
use crate::store::ExamRepository;
use crate::util::{
    ensure_parent_directory, now_utc_string, sha256_file, utc_compact_string, write_json_pretty,
};

const REPORT_VERSION: u32 = 1;

pub fn run(args: IngestArgs) -> Result<()> {
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(Utc::now()));

    let sources = args
        .ordinary
        .iter()
        .map(|path| (path.clone(), SessionKind::Ordinary))
        .chain(
            args.out_of_course
                .iter()
                .map(|path| (path.clone(), SessionKind::OutOfCourse)),
        )
        .collect::<Vec<(PathBuf, SessionKind)>>();

    if sources.is_empty() {
        bail!("no source documents given; pass --ordinary and/or --out-of-course");
    }

    let anchors = match &args.anchors_path {
        Some(path) => AnchorConfig::load(path)?,
        None => AnchorConfig::default(),
    };
    let extractor = BlockExtractor::new(&anchors)?;
    let parser = RecordParser::new()?;

    ensure_parent_directory(&args.db_path)?;
    let mut repository = ExamRepository::open(&args.db_path)
        .with_context(|| format!("failed to open database {}", args.db_path.display()))?;

    if args.reset {
        let removed = repository.clear()?;
        info!(removed, "cleared stored exams before ingest");
    }

    info!(
        run_id = %run_id,
        db_path = %args.db_path.display(),
        documents = sources.len(),
        "starting ingest"
    );

    let mut entries = Vec::with_capacity(sources.len());
    let mut reports = Vec::with_capacity(sources.len());

    for (path, session_kind) in &sources {
        let (entry, report) = ingest_source(
            &mut repository,
            &extractor,
            &parser,
            path,
            *session_kind,
            args.max_pages_per_doc,
        )?;
        entries.push(entry);
        reports.push(report);
    }

    let finished_at = now_utc_string();
    repository.set_metadata("last_ingest_at", &finished_at)?;
    repository.set_metadata("last_run_id", &run_id)?;

    let accepted = reports.iter().map(|report| report.accepted).sum::<usize>();
    let rejected = reports
        .iter()
        .map(|report| report.rejected.len())
        .sum::<usize>();
    info!(
        run_id = %run_id,
        accepted,
        rejected,
        stored = repository.count()?,
        "ingest completed"
    );

    if let Some(report_path) = &args.report_path {
        let run_report = IngestRunReport {
            report_version: REPORT_VERSION,
            run_id,
            started_at,
            finished_at,
            db_path: args.db_path.display().to_string(),
            sources: entries,
            documents: reports,
        };
        write_json_pretty(report_path, &run_report)?;
        info!(path = %report_path.display(), "wrote ingest report");
    }

    Ok(())
}

fn ingest_source(
    repository: &mut ExamRepository,
    extractor: &BlockExtractor,
    parser: &RecordParser,
    path: &Path,
    session_kind: SessionKind,
    max_pages: Option<usize>,
) -> Result<(SourceDocumentEntry, IngestReport)> {
    let sha256 = sha256_file(path)?;
    let pages = load_pages(path, max_pages)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    info!(
        document = %name,
        session_kind = %session_kind,
        pages = pages.len(),
        "loaded source document"
    );

    let entry = SourceDocumentEntry {
        path: path.display().to_string(),
        sha256,
        page_count: pages.len(),
    };
    let document = SourceDocument { name, pages };
    let report = ingest(repository, extractor, parser, &document, session_kind)
        .with_context(|| format!("ingest aborted for {}", path.display()))?;

    Ok((entry, report))
}
