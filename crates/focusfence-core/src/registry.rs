//! Live sessions keyed by subject.
//!
//! The registry is the only owner of [`Session`] values and the only place
//! sessions are created or dropped. It is owned by the engine, which in turn
//! lives inside the scheduler task, so a plain `HashMap` is enough.

use std::collections::HashMap;

use crate::error::{CoreError, Result};
use crate::events::Effect;
use crate::machine;
use crate::position::SubjectId;
use crate::session::Session;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SubjectId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `session` for `subject` and enter `Work`.
    ///
    /// An existing session is stopped first, so the returned effects may
    /// contain its shutdown (e.g. a focus record) ahead of the new start.
    pub fn start(&mut self, subject: SubjectId, mut session: Session) -> Vec<Effect> {
        let mut effects = self
            .stop(subject)
            .map(|(_, effects)| effects)
            .unwrap_or_default();
        effects.extend(machine::start(&mut session));
        self.sessions.insert(subject, session);
        effects
    }

    /// Move the session to `Stopped` and remove it. `None` if absent.
    pub fn stop(&mut self, subject: SubjectId) -> Option<(Session, Vec<Effect>)> {
        let mut session = self.sessions.remove(&subject)?;
        let effects = machine::stop(&mut session);
        Some((session, effects))
    }

    pub fn get(&self, subject: SubjectId) -> Option<&Session> {
        self.sessions.get(&subject)
    }

    pub fn get_mut(&mut self, subject: SubjectId) -> Option<&mut Session> {
        self.sessions.get_mut(&subject)
    }

    pub fn contains(&self, subject: SubjectId) -> bool {
        self.sessions.contains_key(&subject)
    }

    /// Snapshot of live subject ids, so callers can mutate while iterating.
    pub fn subjects(&self) -> Vec<SubjectId> {
        let mut ids: Vec<SubjectId> = self.sessions.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn pause(&mut self, subject: SubjectId) -> Result<Vec<Effect>> {
        machine::pause(self.require(subject)?)
    }

    pub fn resume(&mut self, subject: SubjectId) -> Result<Vec<Effect>> {
        machine::resume(self.require(subject)?)
    }

    pub fn advance_after_completion(&mut self, subject: SubjectId) -> Result<Vec<Effect>> {
        machine::advance_after_completion(self.require(subject)?)
    }

    fn require(&mut self, subject: SubjectId) -> Result<&mut Session> {
        self.sessions
            .get_mut(&subject)
            .ok_or(CoreError::NotFound { subject })
    }
}
