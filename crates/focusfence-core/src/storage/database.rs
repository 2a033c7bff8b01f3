//! SQLite-based focus statistics and subject-owned presets.
//!
//! Provides persistent storage for:
//! - Accumulated focus time and completed work intervals per subject
//! - Presets created by subjects, layered over the configured ones

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::adapters::{PersistenceSink, PresetCatalog};
use crate::error::{DatabaseError, Result};
use crate::position::SubjectId;
use crate::preset::{validate_preset_name, Preset, PresetField};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct FocusStats {
    pub total_focus_secs: u64,
    pub total_work_sessions: u64,
}

/// SQLite database for focus statistics and presets.
///
/// The connection sits behind a mutex so the database can be shared with
/// the engine as a collaborator.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/focusfence/focusfence.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("focusfence.db");
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS focus_stats (
                subject             TEXT PRIMARY KEY,
                total_focus_seconds INTEGER NOT NULL DEFAULT 0,
                total_work_sessions INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS presets (
                subject      TEXT NOT NULL,
                key          TEXT NOT NULL,
                name         TEXT NOT NULL,
                work         INTEGER NOT NULL,
                break        INTEGER NOT NULL,
                long_break   INTEGER NOT NULL,
                cycle_length INTEGER NOT NULL,
                PRIMARY KEY (subject, key)
            );",
        )
    }

    /// Add one completed work interval to the subject's totals.
    pub fn add_focus_session(&self, subject: SubjectId, focus_secs: u32) -> Result<()> {
        self.conn().execute(
            "INSERT INTO focus_stats (subject, total_focus_seconds, total_work_sessions)
             VALUES (?1, ?2, 1)
             ON CONFLICT(subject) DO UPDATE SET
                total_focus_seconds = total_focus_seconds + excluded.total_focus_seconds,
                total_work_sessions = total_work_sessions + 1",
            params![subject.to_string(), focus_secs],
        )?;
        Ok(())
    }

    pub fn focus_stats(&self, subject: SubjectId) -> Result<FocusStats> {
        let stats = self
            .conn()
            .query_row(
                "SELECT total_focus_seconds, total_work_sessions
                 FROM focus_stats WHERE subject = ?1",
                params![subject.to_string()],
                |row| {
                    Ok(FocusStats {
                        total_focus_secs: row.get(0)?,
                        total_work_sessions: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(stats.unwrap_or_default())
    }

    /// Insert or replace a subject-owned preset.
    pub fn save_preset(&self, subject: SubjectId, key: &str, preset: &Preset) -> Result<()> {
        validate_preset_name(&preset.name)?;
        preset.validate()?;
        self.conn().execute(
            "INSERT OR REPLACE INTO presets
                (subject, key, name, work, break, long_break, cycle_length)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                subject.to_string(),
                key,
                preset.name,
                preset.work_minutes,
                preset.break_minutes,
                preset.long_break_minutes,
                preset.cycle_length,
            ],
        )?;
        Ok(())
    }

    /// Returns whether a preset was removed.
    pub fn delete_preset(&self, subject: SubjectId, key: &str) -> Result<bool> {
        let removed = self.conn().execute(
            "DELETE FROM presets WHERE subject = ?1 AND key = ?2",
            params![subject.to_string(), key],
        )?;
        Ok(removed > 0)
    }

    /// The subject's own copy of `key`.
    ///
    /// When the subject does not own `key` yet, the preset `shared` resolves
    /// for it is copied into the subject's set first, so later edits never
    /// touch the shared definition. `None` if neither knows the key.
    pub fn ensure_owned(
        &self,
        subject: SubjectId,
        key: &str,
        shared: &dyn PresetCatalog,
    ) -> Result<Option<Preset>> {
        if let Some(own) = self.preset(subject, key)? {
            return Ok(Some(own));
        }
        let Some(preset) = shared.resolve(subject, key) else {
            return Ok(None);
        };
        self.save_preset(subject, key, &preset)?;
        tracing::debug!(%subject, preset = key, "copied shared preset");
        Ok(Some(preset))
    }

    /// Change the display name; the key stays. Returns whether a preset was renamed.
    pub fn rename_preset(&self, subject: SubjectId, key: &str, name: &str) -> Result<bool> {
        validate_preset_name(name)?;
        let renamed = self.conn().execute(
            "UPDATE presets SET name = ?1 WHERE subject = ?2 AND key = ?3",
            params![name.trim(), subject.to_string(), key],
        )?;
        Ok(renamed > 0)
    }

    /// Add `delta` to one numeric field, clamped to at least 1.
    ///
    /// Returns the updated preset, or `None` if the subject owns no such key.
    pub fn adjust_preset(
        &self,
        subject: SubjectId,
        key: &str,
        field: PresetField,
        delta: i32,
    ) -> Result<Option<Preset>> {
        let conn = self.conn();
        let current = conn
            .query_row(
                "SELECT name, work, break, long_break, cycle_length
                 FROM presets WHERE subject = ?1 AND key = ?2",
                params![subject.to_string(), key],
                row_to_preset,
            )
            .optional()?;
        let Some(current) = current else {
            return Ok(None);
        };

        let adjusted = current.adjusted(field, delta);
        conn.execute(
            &format!(
                "UPDATE presets SET {} = ?1 WHERE subject = ?2 AND key = ?3",
                field.column()
            ),
            params![adjusted.field(field), subject.to_string(), key],
        )?;
        Ok(Some(adjusted))
    }

    pub fn preset(&self, subject: SubjectId, key: &str) -> Result<Option<Preset>> {
        let preset = self
            .conn()
            .query_row(
                "SELECT name, work, break, long_break, cycle_length
                 FROM presets WHERE subject = ?1 AND key = ?2",
                params![subject.to_string(), key],
                row_to_preset,
            )
            .optional()?;
        Ok(preset)
    }

    pub fn presets(&self, subject: SubjectId) -> Result<BTreeMap<String, Preset>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT key, name, work, break, long_break, cycle_length
             FROM presets WHERE subject = ?1 ORDER BY key",
        )?;
        let rows = stmt.query_map(params![subject.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                Preset {
                    name: row.get(1)?,
                    work_minutes: row.get(2)?,
                    break_minutes: row.get(3)?,
                    long_break_minutes: row.get(4)?,
                    cycle_length: row.get(5)?,
                },
            ))
        })?;

        let mut presets = BTreeMap::new();
        for row in rows {
            let (key, preset) = row?;
            presets.insert(key, preset);
        }
        Ok(presets)
    }
}

fn row_to_preset(row: &rusqlite::Row<'_>) -> rusqlite::Result<Preset> {
    Ok(Preset {
        name: row.get(0)?,
        work_minutes: row.get(1)?,
        break_minutes: row.get(2)?,
        long_break_minutes: row.get(3)?,
        cycle_length: row.get(4)?,
    })
}

impl PersistenceSink for Database {
    fn record_focus_session(&self, subject: SubjectId, duration_secs: u32) -> Result<()> {
        self.add_focus_session(subject, duration_secs)
    }
}

impl PresetCatalog for Database {
    fn resolve(&self, subject: SubjectId, key: &str) -> Option<Preset> {
        match self.preset(subject, key) {
            Ok(preset) => preset,
            Err(e) => {
                tracing::warn!(%subject, preset = key, error = %e, "preset lookup failed");
                None
            }
        }
    }

    fn keys(&self, subject: SubjectId) -> Vec<String> {
        self.presets(subject)
            .map(|p| p.into_keys().collect())
            .unwrap_or_default()
    }
}
