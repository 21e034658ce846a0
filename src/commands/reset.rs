use anyhow::{Result, bail};
use tracing::info;

use super::require_database;
use crate::cli::ResetArgs;
use crate::store::ExamRepository;

pub fn run(args: ResetArgs) -> Result<()> {
    if !args.yes {
        bail!("refusing to delete stored exams without --yes");
    }

    require_database(&args.db_path)?;
    let mut repository = ExamRepository::open(&args.db_path)?;
    let removed = repository.clear()?;
    info!(db_path = %args.db_path.display(), removed, "cleared stored exams");
    Ok(())
}
