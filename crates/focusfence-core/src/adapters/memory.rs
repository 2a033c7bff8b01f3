//! In-process collaborator implementations.
//!
//! Everything is kept behind a `Mutex` and recorded so callers can inspect
//! what the engine did. The CLI simulator prints these records; tests assert
//! on them.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use super::{
    Collaborators, NotificationSink, PersistenceSink, PositionProvider, PresetCatalog, VisualSink,
};
use crate::events::Notice;
use crate::position::{Position, SubjectId, Velocity};
use crate::preset::Preset;
use crate::session::SessionView;
use crate::storage::FocusStats;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Presets shared by every subject.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    presets: Mutex<HashMap<String, Preset>>,
}

impl MemoryCatalog {
    pub fn insert(&self, key: impl Into<String>, preset: Preset) {
        lock(&self.presets).insert(key.into(), preset);
    }
}

impl PresetCatalog for MemoryCatalog {
    fn resolve(&self, _subject: SubjectId, key: &str) -> Option<Preset> {
        lock(&self.presets).get(key).cloned()
    }

    fn keys(&self, _subject: SubjectId) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.presets).keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// What the world was asked to do to a subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Movement {
    Teleport { subject: SubjectId, to: Position },
    Push { subject: SubjectId, velocity: Velocity },
}

/// A toy world: positions are whatever the caller last placed.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    positions: Mutex<HashMap<SubjectId, Position>>,
    unreachable: Mutex<HashSet<SubjectId>>,
    movements: Mutex<Vec<Movement>>,
}

impl MemoryWorld {
    pub fn place(&self, subject: SubjectId, at: Position) {
        lock(&self.positions).insert(subject, at);
    }

    pub fn set_reachable(&self, subject: SubjectId, reachable: bool) {
        let mut set = lock(&self.unreachable);
        if reachable {
            set.remove(&subject);
        } else {
            set.insert(subject);
        }
    }

    pub fn movements(&self) -> Vec<Movement> {
        lock(&self.movements).clone()
    }

    pub fn teleports(&self, subject: SubjectId) -> usize {
        lock(&self.movements)
            .iter()
            .filter(|m| matches!(m, Movement::Teleport { subject: s, .. } if *s == subject))
            .count()
    }

    pub fn pushes(&self, subject: SubjectId) -> usize {
        lock(&self.movements)
            .iter()
            .filter(|m| matches!(m, Movement::Push { subject: s, .. } if *s == subject))
            .count()
    }
}

impl PositionProvider for MemoryWorld {
    fn current(&self, subject: SubjectId) -> Option<Position> {
        lock(&self.positions).get(&subject).cloned()
    }

    fn teleport(&self, subject: SubjectId, to: &Position) {
        lock(&self.positions).insert(subject, to.clone());
        lock(&self.movements).push(Movement::Teleport {
            subject,
            to: to.clone(),
        });
    }

    fn push(&self, subject: SubjectId, velocity: Velocity) {
        lock(&self.movements).push(Movement::Push { subject, velocity });
    }

    fn is_reachable(&self, subject: SubjectId) -> bool {
        !lock(&self.unreachable).contains(&subject)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    Warn,
    Announce,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivered {
    pub subject: SubjectId,
    pub delivery: Delivery,
    pub notice: Notice,
    pub key: &'static str,
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Delivered>>,
}

impl RecordingNotifier {
    pub fn delivered(&self) -> Vec<Delivered> {
        lock(&self.delivered).clone()
    }

    pub fn count(&self, subject: SubjectId, notice: Notice) -> usize {
        lock(&self.delivered)
            .iter()
            .filter(|d| d.subject == subject && d.notice == notice)
            .count()
    }

    /// Drain everything delivered so far.
    pub fn take(&self) -> Vec<Delivered> {
        std::mem::take(&mut *lock(&self.delivered))
    }

    fn record(&self, subject: SubjectId, delivery: Delivery, notice: Notice) {
        lock(&self.delivered).push(Delivered {
            subject,
            delivery,
            notice,
            key: notice.key(),
        });
    }
}

impl NotificationSink for RecordingNotifier {
    fn warn(&self, subject: SubjectId, notice: Notice) {
        self.record(subject, Delivery::Warn, notice);
    }

    fn announce(&self, subject: SubjectId, notice: Notice) {
        self.record(subject, Delivery::Announce, notice);
    }
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Mutex<Vec<(SubjectId, u32)>>,
}

impl MemoryLedger {
    pub fn records(&self, subject: SubjectId) -> Vec<u32> {
        lock(&self.records)
            .iter()
            .filter(|(s, _)| *s == subject)
            .map(|(_, secs)| *secs)
            .collect()
    }

    pub fn totals(&self, subject: SubjectId) -> FocusStats {
        self.records(subject)
            .into_iter()
            .fold(FocusStats::default(), |mut acc, secs| {
                acc.total_focus_secs += u64::from(secs);
                acc.total_work_sessions += 1;
                acc
            })
    }
}

impl PersistenceSink for MemoryLedger {
    fn record_focus_session(&self, subject: SubjectId, duration_secs: u32) -> crate::Result<()> {
        lock(&self.records).push((subject, duration_secs));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingVisuals {
    last: Mutex<HashMap<SubjectId, SessionView>>,
    refreshes: Mutex<HashMap<SubjectId, usize>>,
    cleared: Mutex<Vec<SubjectId>>,
}

impl RecordingVisuals {
    pub fn last_view(&self, subject: SubjectId) -> Option<SessionView> {
        lock(&self.last).get(&subject).cloned()
    }

    pub fn refresh_count(&self, subject: SubjectId) -> usize {
        lock(&self.refreshes).get(&subject).copied().unwrap_or(0)
    }

    pub fn was_cleared(&self, subject: SubjectId) -> bool {
        lock(&self.cleared).contains(&subject)
    }
}

impl VisualSink for RecordingVisuals {
    fn refresh(&self, subject: SubjectId, view: &SessionView) {
        lock(&self.last).insert(subject, view.clone());
        *lock(&self.refreshes).entry(subject).or_insert(0) += 1;
    }

    fn clear(&self, subject: SubjectId) {
        lock(&self.last).remove(&subject);
        lock(&self.cleared).push(subject);
    }
}

/// One of each in-memory collaborator, with typed handles kept for inspection.
#[derive(Clone, Default)]
pub struct MemoryHarness {
    pub catalog: Arc<MemoryCatalog>,
    pub world: Arc<MemoryWorld>,
    pub notifier: Arc<RecordingNotifier>,
    pub ledger: Arc<MemoryLedger>,
    pub visuals: Arc<RecordingVisuals>,
}

impl MemoryHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            presets: self.catalog.clone(),
            positions: self.world.clone(),
            notifications: self.notifier.clone(),
            persistence: self.ledger.clone(),
            visuals: self.visuals.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_records_teleports_and_moves_subject() {
        let world = MemoryWorld::default();
        let subject = SubjectId::new();
        world.place(subject, Position::new("overworld", 5.0, 0.0, 0.0));
        let home = Position::new("overworld", 0.0, 0.0, 0.0);
        world.teleport(subject, &home);
        assert_eq!(world.current(subject), Some(home));
        assert_eq!(world.teleports(subject), 1);
        assert_eq!(world.pushes(subject), 0);
    }

    #[test]
    fn reachability_toggles() {
        let world = MemoryWorld::default();
        let subject = SubjectId::new();
        assert!(world.is_reachable(subject));
        world.set_reachable(subject, false);
        assert!(!world.is_reachable(subject));
        world.set_reachable(subject, true);
        assert!(world.is_reachable(subject));
    }

    #[test]
    fn ledger_totals() {
        let ledger = MemoryLedger::default();
        let subject = SubjectId::new();
        ledger.record_focus_session(subject, 1500).unwrap();
        ledger.record_focus_session(subject, 1530).unwrap();
        ledger.record_focus_session(SubjectId::new(), 60).unwrap();
        assert_eq!(
            ledger.totals(subject),
            FocusStats {
                total_focus_secs: 3030,
                total_work_sessions: 2
            }
        );
    }
}
