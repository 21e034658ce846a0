use std::collections::BTreeSet;
use std::fs;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use super::open_read_only;
use crate::calendar::{event_uids, render_calendar};
use crate::cli::ExportArgs;
use crate::util::ensure_parent_directory;

pub fn run(args: ExportArgs) -> Result<()> {
    let repository = open_read_only(&args.db_path)?;
    let mut exams = match &args.subject {
        Some(subject) => repository.search(subject, true)?,
        None => repository.list_all()?,
    };
    if let Some(session_kind) = args.session {
        exams.retain(|exam| exam.record.session_kind() == session_kind);
    }

    if exams.is_empty() {
        warn!(db_path = %args.db_path.display(), "no exams to export");
        return Ok(());
    }

    let previous = if args.output.exists() {
        let existing = fs::read_to_string(&args.output)
            .with_context(|| format!("failed to read {}", args.output.display()))?;
        event_uids(&existing)
            .with_context(|| format!("failed to read event UIDs from {}", args.output.display()))?
    } else {
        BTreeSet::new()
    };

    let ics = render_calendar(exams.iter().map(|exam| &exam.record), Utc::now());
    let current = exams
        .iter()
        .map(|exam| exam.record.event_uid())
        .collect::<BTreeSet<String>>();

    ensure_parent_directory(&args.output)?;
    fs::write(&args.output, &ics)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    let replaced = current.intersection(&previous).count();
    info!(
        path = %args.output.display(),
        events = current.len(),
        replaced,
        added = current.len() - replaced,
        dropped = previous.difference(&current).count(),
        "wrote calendar"
    );
    Ok(())
}
