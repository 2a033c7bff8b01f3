//! Engine - the single owner of all live sessions.
//!
//! The engine glues the pure parts together. It routes commands and
//! movement events to the state machine or the geofence guard, then applies
//! the returned [`Effect`]s to the injected collaborators in order.
//!
//! Every method is synchronous and takes `&mut self`; the
//! [`crate::scheduler::TickScheduler`] task owns the engine and serializes
//! commands with the 1 Hz tick.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adapters::Collaborators;
use crate::error::{CoreError, Result};
use crate::events::{Decision, Effect, Notice};
use crate::geofence::{GeofenceGuard, GeofencePolicy};
use crate::machine::{self, Entry};
use crate::position::{Position, SubjectId};
use crate::preset::Preset;
use crate::registry::SessionRegistry;
use crate::session::{Phase, Session, SessionView, VisualKind};
use crate::storage::Config;

/// Behaviour switches read from the configuration; replaced on reload.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Hard-block mode: any movement during work is cancelled outright.
    pub restrict_movement: bool,
    pub allow_chat: bool,
    pub bossbar_default: bool,
    pub title_default: bool,
    pub geofence: GeofencePolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            restrict_movement: config.restrictions.restrict_movement,
            allow_chat: config.restrictions.allow_chat,
            bossbar_default: config.display_defaults.bossbar,
            title_default: config.display_defaults.title,
            geofence: config.geofence_policy(),
        }
    }
}

/// An effect as applied to one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedEffect {
    pub subject: SubjectId,
    #[serde(flatten)]
    pub effect: Effect,
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    /// Sessions that consumed the tick.
    pub ticked: usize,
    /// Sessions frozen because their subject was unreachable.
    pub skipped: usize,
    pub effects: Vec<AppliedEffect>,
}

pub struct Engine {
    settings: EngineSettings,
    registry: SessionRegistry,
    guard: GeofenceGuard,
    collab: Collaborators,
}

impl Engine {
    pub fn new(settings: EngineSettings, collab: Collaborators) -> Self {
        Self {
            guard: GeofenceGuard::new(settings.geofence.clone()),
            settings,
            registry: SessionRegistry::new(),
            collab,
        }
    }

    pub fn from_config(config: &Config, collab: Collaborators) -> Self {
        Self::new(EngineSettings::from(config), collab)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Swap in freshly loaded configuration.
    ///
    /// Live sessions keep their anchors, timers and visual toggles; the new
    /// restrictions and geofence policy apply from the next event on.
    pub fn reload(&mut self, config: &Config) {
        self.settings = EngineSettings::from(config);
        self.guard.set_policy(self.settings.geofence.clone());
        info!(
            max_distance = self.settings.geofence.max_distance,
            restrict_movement = self.settings.restrict_movement,
            sessions = self.registry.len(),
            "configuration reloaded"
        );
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a session anchored at the subject's current position.
    ///
    /// Replaces any running session. A malformed preset or an unknown
    /// position refuses the start and leaves existing state untouched.
    pub fn start(
        &mut self,
        subject: SubjectId,
        preset: Preset,
        now: DateTime<Utc>,
    ) -> Result<SessionView> {
        preset.validate()?;
        let anchor = self
            .collab
            .positions
            .current(subject)
            .ok_or(CoreError::PositionUnavailable { subject })?;

        self.guard.clear(subject);
        let session = Session::new(
            preset,
            anchor,
            self.settings.bossbar_default,
            self.settings.title_default,
            now,
        );
        let mut effects = self.registry.start(subject, session);
        effects.push(Effect::Refresh);
        self.apply(subject, &effects);

        let view = self.require(subject)?.view();
        info!(%subject, preset = %view.preset_name, time_left = view.time_left, "session started");
        Ok(view)
    }

    /// Resolve `key` through the preset catalog and start with it.
    pub fn start_preset(
        &mut self,
        subject: SubjectId,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionView> {
        let preset = self
            .collab
            .presets
            .resolve(subject, key)
            .ok_or_else(|| CoreError::PresetNotFound(key.to_string()))?;
        self.start(subject, preset, now)
    }

    /// Stop and discard the subject's session. No-op if there is none.
    pub fn stop(&mut self, subject: SubjectId) -> Option<Session> {
        let (session, effects) = self.registry.stop(subject)?;
        self.guard.clear(subject);
        self.apply(subject, &effects);
        info!(%subject, "session stopped");
        Some(session)
    }

    /// The subject left for good; its session ends like an explicit stop.
    pub fn disconnect(&mut self, subject: SubjectId) -> Option<Session> {
        debug!(%subject, "subject disconnected");
        self.stop(subject)
    }

    pub fn pause(&mut self, subject: SubjectId) -> Result<()> {
        let effects = self.registry.pause(subject)?;
        self.apply(subject, &effects);
        self.refresh(subject);
        Ok(())
    }

    /// Resume a paused session. A subject that wandered off while paused is
    /// put back on its anchor first, without a grace period.
    pub fn resume(&mut self, subject: SubjectId) -> Result<()> {
        let session = self
            .registry
            .get(subject)
            .ok_or(CoreError::NotFound { subject })?;
        if session.phase() != Phase::Paused {
            return Err(CoreError::InvalidPhase {
                command: "resume",
                phase: session.phase(),
            });
        }

        if let Some(current) = self.collab.positions.current(subject) {
            let same_world = self.collab.positions.same_world(session.anchor(), &current);
            let correction = self
                .guard
                .correct_immediately(subject, session, &current, same_world);
            self.apply(subject, &correction);
        }

        let effects = self.registry.resume(subject)?;
        self.apply(subject, &effects);
        self.refresh(subject);
        Ok(())
    }

    /// Confirm the completion gate and enter the break.
    pub fn advance_after_completion(&mut self, subject: SubjectId) -> Result<()> {
        let effects = self.registry.advance_after_completion(subject)?;
        self.apply(subject, &effects);
        self.refresh(subject);
        Ok(())
    }

    /// Flip a visual toggle and return its new value.
    pub fn toggle_visual(&mut self, subject: SubjectId, kind: VisualKind) -> Result<bool> {
        let enabled = self
            .registry
            .get_mut(subject)
            .ok_or(CoreError::NotFound { subject })?
            .toggle_visual(kind);
        self.refresh(subject);
        Ok(enabled)
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Movement from `from` to `to`.
    ///
    /// In hard-block mode any change of coordinates during work is denied.
    /// Otherwise movement is always allowed and the geofence guard decides on
    /// warnings, nudges and teleports.
    pub fn on_move(
        &mut self,
        subject: SubjectId,
        from: &Position,
        to: &Position,
        now: DateTime<Utc>,
    ) -> Decision {
        let Some(session) = self.registry.get(subject) else {
            return Decision::Allow;
        };
        if session.phase() != Phase::Work {
            return Decision::Allow;
        }

        if self.settings.restrict_movement {
            if from.same_coordinates(to) {
                return Decision::Allow;
            }
            self.collab.notifications.warn(subject, Notice::CantMove);
            return Decision::Deny(Notice::CantMove);
        }

        self.check_position(subject, to, now);
        Decision::Allow
    }

    /// An explicit relocation request (command, portal, ender pearl).
    pub fn on_teleport_attempt(&mut self, subject: SubjectId, to: &Position) -> Decision {
        let Some(session) = self.registry.get(subject) else {
            return Decision::Allow;
        };
        let same_world = self.collab.positions.same_world(session.anchor(), to);
        let decision = self.guard.check_teleport(session, to, same_world);
        if let Decision::Deny(notice) = decision {
            debug!(%subject, "teleport denied");
            self.collab.notifications.warn(subject, notice);
        }
        decision
    }

    /// The subject arrived in another world; treated like a movement to its
    /// new position.
    pub fn on_world_change(&mut self, subject: SubjectId, now: DateTime<Utc>) {
        if !self.registry.contains(subject) {
            return;
        }
        if let Some(current) = self.collab.positions.current(subject) {
            self.check_position(subject, &current, now);
        }
    }

    /// Chat is muted during work unless the configuration allows it.
    pub fn on_chat(&mut self, subject: SubjectId) -> Decision {
        let working = self
            .registry
            .get(subject)
            .is_some_and(|s| s.phase() == Phase::Work);
        if working && !self.settings.allow_chat {
            self.collab.notifications.warn(subject, Notice::CantChat);
            Decision::Deny(Notice::CantChat)
        } else {
            Decision::Allow
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get_session(&self, subject: SubjectId) -> Option<&Session> {
        self.registry.get(subject)
    }

    pub fn session_view(&self, subject: SubjectId) -> Option<SessionView> {
        self.registry.get(subject).map(Session::view)
    }

    pub fn subjects(&self) -> Vec<SubjectId> {
        self.registry.subjects()
    }

    /// When the subject's current geofence violation began, if any.
    pub fn grace_started_at(&self, subject: SubjectId) -> Option<DateTime<Utc>> {
        self.guard.grace_started_at(subject)
    }

    // ── Clock ────────────────────────────────────────────────────────

    /// Advance every reachable session by one second.
    ///
    /// Unreachable subjects keep their session but do not consume the tick,
    /// so their remaining time is frozen until they come back.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        for subject in self.registry.subjects() {
            if !self.collab.positions.is_reachable(subject) {
                report.skipped += 1;
                continue;
            }
            let effects = self.tick_subject(subject);
            self.apply(subject, &effects);
            report.ticked += 1;
            report
                .effects
                .extend(effects.into_iter().map(|effect| AppliedEffect { subject, effect }));
        }
        if report.skipped > 0 {
            debug!(at = %now, skipped = report.skipped, "unreachable subjects skipped");
        }
        report
    }

    fn tick_subject(&mut self, subject: SubjectId) -> Vec<Effect> {
        let current = self.collab.positions.current(subject);
        let Some(session) = self.registry.get_mut(subject) else {
            return Vec::new();
        };
        let from = session.phase();
        let machine::Step { next, mut effects } = machine::tick(session);

        if let Some(next) = next {
            // Work resumes at the anchor when the break ends away from it.
            if next == Phase::Work && matches!(from, Phase::Break | Phase::LongBreak) {
                if let Some(current) = current.as_ref() {
                    let same_world = self.collab.positions.same_world(session.anchor(), current);
                    if self.guard.policy().is_too_far(session.anchor(), current, same_world) {
                        effects.push(Effect::Teleport {
                            to: session.anchor().clone(),
                        });
                        effects.push(Effect::warn(Notice::MovedTooFar));
                    }
                }
            }
            effects.extend(machine::transition(session, next, Entry::Cold));
        }

        if session.phase() != Phase::WorkCompleted {
            effects.push(Effect::Refresh);
        }
        effects
    }

    // ── Effects ──────────────────────────────────────────────────────

    fn check_position(&mut self, subject: SubjectId, to: &Position, now: DateTime<Utc>) {
        let Some(session) = self.registry.get(subject) else {
            return;
        };
        let same_world = self.collab.positions.same_world(session.anchor(), to);
        let effects = self
            .guard
            .check_movement(subject, session, to, same_world, now);
        self.apply(subject, &effects);
    }

    fn refresh(&self, subject: SubjectId) {
        if let Some(session) = self.registry.get(subject) {
            self.collab.visuals.refresh(subject, &session.view());
        }
    }

    fn require(&self, subject: SubjectId) -> Result<&Session> {
        self.registry
            .get(subject)
            .ok_or(CoreError::NotFound { subject })
    }

    fn apply(&mut self, subject: SubjectId, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::Announce { notice } => self.collab.notifications.announce(subject, *notice),
                Effect::Warn { notice } => self.collab.notifications.warn(subject, *notice),
                Effect::PhaseChanged { from, to } => {
                    info!(%subject, %from, %to, "phase changed");
                    if *from == Phase::Work {
                        self.guard.clear(subject);
                    }
                }
                Effect::RecordFocus { seconds } => {
                    if let Err(e) = self
                        .collab
                        .persistence
                        .record_focus_session(subject, *seconds)
                    {
                        warn!(%subject, seconds, error = %e, "failed to record focus session");
                    }
                }
                Effect::Teleport { to } => self.collab.positions.teleport(subject, to),
                Effect::Nudge { velocity } => self.collab.positions.push(subject, *velocity),
                Effect::Refresh => self.refresh(subject),
                Effect::ClearVisuals => self.collab.visuals.clear(subject),
            }
        }
    }
}
