use std::collections::BTreeMap;
use std::sync::Arc;

use clap::Subcommand;
use focusfence_core::preset::{preset_key, validate_preset_name};
use focusfence_core::{
    Config, Database, LayeredCatalog, Preset, PresetCatalog, PresetField, SubjectId,
};

use super::CmdResult;

#[derive(Subcommand)]
pub enum PresetAction {
    /// List presets as JSON, keyed by preset key
    List {
        /// Include presets owned by this subject
        #[arg(long)]
        subject: Option<SubjectId>,
    },
    /// Create a preset owned by a subject; unset durations come from the template
    Add {
        /// Subject id (UUID)
        subject: SubjectId,
        /// Display name; the key is derived from it
        name: String,
        /// Work minutes
        #[arg(long)]
        work: Option<u32>,
        /// Short break minutes
        #[arg(long = "break")]
        break_minutes: Option<u32>,
        /// Long break minutes
        #[arg(long)]
        long_break: Option<u32>,
        /// Work intervals before a long break
        #[arg(long)]
        cycles: Option<u32>,
    },
    /// Rename a subject's preset, copying a configured preset first
    Rename {
        /// Subject id (UUID)
        subject: SubjectId,
        /// Preset key
        key: String,
        /// New display name; the key is kept
        name: String,
    },
    /// Shift durations or cycle length; values never drop below 1
    Edit {
        /// Subject id (UUID)
        subject: SubjectId,
        /// Preset key
        key: String,
        /// Minutes added to work (negative to shorten)
        #[arg(long, allow_negative_numbers = true)]
        work: Option<i32>,
        /// Minutes added to the short break
        #[arg(long = "break", allow_negative_numbers = true)]
        break_minutes: Option<i32>,
        /// Minutes added to the long break
        #[arg(long, allow_negative_numbers = true)]
        long_break: Option<i32>,
        /// Work intervals added before a long break
        #[arg(long, allow_negative_numbers = true)]
        cycles: Option<i32>,
    },
    /// Delete a preset owned by a subject
    Remove {
        /// Subject id (UUID)
        subject: SubjectId,
        /// Preset key
        key: String,
    },
}

pub fn run(action: PresetAction) -> CmdResult {
    let config = Config::load()?;

    match action {
        PresetAction::List { subject: None } => {
            println!("{}", serde_json::to_string_pretty(&config.presets)?);
        }
        PresetAction::List {
            subject: Some(subject),
        } => {
            let db = Arc::new(Database::open()?);
            let catalog = LayeredCatalog::new(db, config);
            let presets: BTreeMap<String, Preset> = catalog
                .keys(subject)
                .into_iter()
                .filter_map(|key| catalog.resolve(subject, &key).map(|p| (key, p)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&presets)?);
        }
        PresetAction::Add {
            subject,
            name,
            work,
            break_minutes,
            long_break,
            cycles,
        } => {
            validate_preset_name(&name)?;
            let template = &config.template;
            let preset = Preset::new(
                name.trim(),
                work.unwrap_or(template.work_minutes),
                break_minutes.unwrap_or(template.break_minutes),
                long_break.unwrap_or(template.long_break_minutes),
                cycles.unwrap_or(template.cycle_length),
            )?;
            let key = preset_key(&name);
            Database::open()?.save_preset(subject, &key, &preset)?;
            println!("{key}");
        }
        PresetAction::Rename { subject, key, name } => {
            let db = Database::open()?;
            owned(&db, &config, subject, &key)?;
            db.rename_preset(subject, &key, &name)?;
            println!("ok");
        }
        PresetAction::Edit {
            subject,
            key,
            work,
            break_minutes,
            long_break,
            cycles,
        } => {
            let db = Database::open()?;
            let mut preset = owned(&db, &config, subject, &key)?;
            let deltas = [
                (PresetField::Work, work),
                (PresetField::Break, break_minutes),
                (PresetField::LongBreak, long_break),
                (PresetField::CycleLength, cycles),
            ];
            for (field, delta) in deltas {
                let Some(delta) = delta else { continue };
                if let Some(updated) = db.adjust_preset(subject, &key, field, delta)? {
                    preset = updated;
                }
            }
            println!("{}", serde_json::to_string_pretty(&preset)?);
        }
        PresetAction::Remove { subject, key } => {
            if !Database::open()?.delete_preset(subject, &key)? {
                return Err(format!("no preset '{key}' for subject {subject}").into());
            }
            println!("ok");
        }
    }
    Ok(())
}

/// The subject's own copy of `key`, taken from the configured presets if needed.
fn owned(
    db: &Database,
    config: &Config,
    subject: SubjectId,
    key: &str,
) -> Result<Preset, Box<dyn std::error::Error>> {
    db.ensure_owned(subject, key, config)?
        .ok_or_else(|| format!("no preset '{key}' for subject {subject}").into())
}
