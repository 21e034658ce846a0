use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::model::SessionKind;

#[derive(Parser, Debug)]
#[command(
    name = "esami",
    version,
    about = "Exam schedule extraction from department PDFs into SQLite and iCalendar"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse exam PDFs and upsert their records into the store
    Ingest(IngestArgs),
    /// Print every stored exam ordered by date
    List(ListArgs),
    /// Find exams whose subject contains a substring
    Search(SearchArgs),
    /// Write stored exams to an .ics calendar file
    Export(ExportArgs),
    Status(StatusArgs),
    /// Delete every stored exam
    Reset(ResetArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long, default_value = "esami.sqlite")]
    pub db_path: PathBuf,

    /// Ordinary-session listing (.pdf, or .txt with form-feed page breaks)
    #[arg(long = "ordinary")]
    pub ordinary: Vec<PathBuf>,

    /// Out-of-course listing (.pdf, or .txt with form-feed page breaks)
    #[arg(long = "out-of-course")]
    pub out_of_course: Vec<PathBuf>,

    /// JSON file overriding the boilerplate anchor phrases
    #[arg(long)]
    pub anchors_path: Option<PathBuf>,

    #[arg(long)]
    pub max_pages_per_doc: Option<usize>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    /// Clear the store before ingesting
    #[arg(long, default_value_t = false)]
    pub reset: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(long, default_value = "esami.sqlite")]
    pub db_path: PathBuf,

    #[arg(long, value_enum)]
    pub session: Option<SessionKind>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[arg(long, default_value = "esami.sqlite")]
    pub db_path: PathBuf,

    #[arg(long)]
    pub subject: String,

    #[arg(long, default_value_t = false)]
    pub case_sensitive: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[arg(long, default_value = "esami.sqlite")]
    pub db_path: PathBuf,

    #[arg(long, default_value = "esami.ics")]
    pub output: PathBuf,

    /// Only export exams whose subject contains this text (case-insensitive)
    #[arg(long)]
    pub subject: Option<String>,

    #[arg(long, value_enum)]
    pub session: Option<SessionKind>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "esami.sqlite")]
    pub db_path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ResetArgs {
    #[arg(long, default_value = "esami.sqlite")]
    pub db_path: PathBuf,

    /// Confirm the deletion
    #[arg(long, default_value_t = false)]
    pub yes: bool,
}
