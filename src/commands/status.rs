use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::store::ExamRepository;

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = &args.db_path;
    info!(db_path = %db_path.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database missing");
        return Ok(());
    }

    let repository = ExamRepository::open_read_only(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    info!(
        path = %db_path.display(),
        schema_version = %repository.metadata("db_schema_version")?.unwrap_or_default(),
        last_ingest_at = %repository.metadata("last_ingest_at")?.unwrap_or_default(),
        last_run_id = %repository.metadata("last_run_id")?.unwrap_or_default(),
        exams = repository.count()?,
        "database status"
    );

    for (session_kind, count) in repository.count_by_session()? {
        info!(session_kind = %session_kind, exams = count, "session count");
    }

    Ok(())
}
