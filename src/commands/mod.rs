pub mod export;
pub mod ingest;
pub mod list;
pub mod reset;
pub mod status;

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::store::ExamRepository;

fn require_database(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        bail!(
            "database not found: {} (run `esami ingest` first)",
            db_path.display()
        );
    }
    Ok(())
}

/// Opens an existing store read-only; query commands never create or alter one.
fn open_read_only(db_path: &Path) -> Result<ExamRepository> {
    require_database(db_path)?;
    ExamRepository::open_read_only(db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))
}
