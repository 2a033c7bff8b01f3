//! Collaborator interfaces the engine depends on.
//!
//! The host environment (a game server, a desktop shell, the CLI simulator)
//! implements these traits; the engine receives them once at construction.
//! [`memory`] provides in-process implementations used by the CLI and tests.

pub mod memory;

use std::sync::Arc;

use crate::events::Notice;
use crate::position::{Position, SubjectId, Velocity};
use crate::preset::Preset;
use crate::session::SessionView;

/// Preset lookup by key.
pub trait PresetCatalog: Send + Sync {
    fn resolve(&self, subject: SubjectId, key: &str) -> Option<Preset>;

    /// Keys visible to `subject`, for listings and completion.
    fn keys(&self, subject: SubjectId) -> Vec<String>;
}

/// Where subjects are and how to move them.
pub trait PositionProvider: Send + Sync {
    /// Current position, or `None` if the subject cannot be located.
    fn current(&self, subject: SubjectId) -> Option<Position>;

    fn teleport(&self, subject: SubjectId, to: &Position);

    /// Apply a velocity to the subject (soft pull-back).
    fn push(&self, subject: SubjectId, velocity: Velocity);

    /// Temporarily unreachable subjects are skipped by the scheduler.
    fn is_reachable(&self, subject: SubjectId) -> bool;

    fn same_world(&self, a: &Position, b: &Position) -> bool {
        a.world == b.world
    }
}

/// Message, sound and action-bar delivery.
pub trait NotificationSink: Send + Sync {
    fn warn(&self, subject: SubjectId, notice: Notice);
    fn announce(&self, subject: SubjectId, notice: Notice);
}

/// Durable focus statistics.
pub trait PersistenceSink: Send + Sync {
    /// Called exactly once per completed work interval.
    fn record_focus_session(&self, subject: SubjectId, duration_secs: u32) -> crate::Result<()>;
}

/// Boss bar / title / floating text rendering.
pub trait VisualSink: Send + Sync {
    fn refresh(&self, subject: SubjectId, view: &SessionView);
    fn clear(&self, subject: SubjectId);
}

impl<T: PresetCatalog + ?Sized> PresetCatalog for Arc<T> {
    fn resolve(&self, subject: SubjectId, key: &str) -> Option<Preset> {
        (**self).resolve(subject, key)
    }

    fn keys(&self, subject: SubjectId) -> Vec<String> {
        (**self).keys(subject)
    }
}

/// The engine's collaborators, injected once.
#[derive(Clone)]
pub struct Collaborators {
    pub presets: Arc<dyn PresetCatalog>,
    pub positions: Arc<dyn PositionProvider>,
    pub notifications: Arc<dyn NotificationSink>,
    pub persistence: Arc<dyn PersistenceSink>,
    pub visuals: Arc<dyn VisualSink>,
}

/// Catalog that consults `primary` first and falls back to `fallback`.
///
/// Used to layer subject-owned presets from the database over the presets
/// shipped in the configuration file.
pub struct LayeredCatalog<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> LayeredCatalog<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: PresetCatalog, F: PresetCatalog> PresetCatalog for LayeredCatalog<P, F> {
    fn resolve(&self, subject: SubjectId, key: &str) -> Option<Preset> {
        self.primary
            .resolve(subject, key)
            .or_else(|| self.fallback.resolve(subject, key))
    }

    fn keys(&self, subject: SubjectId) -> Vec<String> {
        let mut keys = self.primary.keys(subject);
        for key in self.fallback.keys(subject) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys.sort();
        keys
    }
}
