use clap::Subcommand;
use focusfence_core::{Database, SubjectId};

use super::CmdResult;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Accumulated focus time of one subject
    Show {
        /// Subject id (UUID)
        subject: SubjectId,
    },
}

pub fn run(action: StatsAction) -> CmdResult {
    let db = Database::open()?;

    match action {
        StatsAction::Show { subject } => {
            let stats = db.focus_stats(subject)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
