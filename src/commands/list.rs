use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use super::open_read_only;
use crate::cli::{ListArgs, SearchArgs};
use crate::model::StoredExam;

pub fn run_list(args: ListArgs) -> Result<()> {
    let repository = open_read_only(&args.db_path)?;
    let mut exams = repository.list_all()?;
    if let Some(session_kind) = args.session {
        exams.retain(|exam| exam.record.session_kind() == session_kind);
    }
    info!(count = exams.len(), "listing stored exams");

    if args.json {
        write_json(&exams)
    } else {
        write_table("Tutti gli esami", &exams)
    }
}

pub fn run_search(args: SearchArgs) -> Result<()> {
    let repository = open_read_only(&args.db_path)?;
    let exams = repository.search(&args.subject, !args.case_sensitive)?;
    info!(
        subject = %args.subject,
        case_sensitive = args.case_sensitive,
        count = exams.len(),
        "searched stored exams"
    );

    if args.json {
        write_json(&exams)
    } else {
        write_table(&format!("Esami per \"{}\"", args.subject), &exams)
    }
}

fn write_json(exams: &[StoredExam]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, exams).context("failed to serialize exams")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_table(title: &str, exams: &[StoredExam]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    render_table(&mut output, title, exams)?;
    output.flush()?;
    Ok(())
}

fn render_table<W: Write>(output: &mut W, title: &str, exams: &[StoredExam]) -> io::Result<()> {
    writeln!(output, "{title}")?;
    if exams.is_empty() {
        writeln!(output, "Nessun esame trovato.")?;
        return Ok(());
    }

    writeln!(output, "{:>4} | {:<10} | {:<11} | Materia", "ID", "Data", "Tipo")?;
    writeln!(output, "{}", "-".repeat(60))?;
    for exam in exams {
        writeln!(
            output,
            "{:>4} | {:<10} | {:<11} | {}",
            exam.exam_id,
            exam.record.display_date(),
            exam.record.session_kind().label(),
            exam.record.subject()
        )?;
    }
    writeln!(output, "Totale esami trovati: {}", exams.len())?;
    Ok(())
}
