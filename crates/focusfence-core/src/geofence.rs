//! Geofence guard - keeps a working subject near its session anchor.
//!
//! Leaving the allowed radius does not snap the subject back at once. The
//! guard starts a grace timer and nudges the subject towards the anchor on
//! every movement event; only when the violation outlasts the pull-back delay
//! is the subject teleported.
//!
//! ## Response ladder
//!
//! - **Warn**: first too-far movement starts the grace timer
//! - **Nudge**: velocity of [`NUDGE_STRENGTH`] pointing at the anchor
//! - **Teleport**: once `now - started > pull_back_delay`, then timer cleared
//!
//! Explicit teleport attempts skip the ladder and are denied outright.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::events::{Decision, Effect, Notice};
use crate::position::{Position, SubjectId};
use crate::session::{Phase, Session};

/// Magnitude of the corrective velocity applied while within the grace period.
pub const NUDGE_STRENGTH: f64 = 0.5;

/// Below this squared length the direction to the anchor is treated as zero.
const MIN_DIRECTION_LEN_SQ: f64 = 1.0e-12;

/// Spatial limits for working subjects.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofencePolicy {
    pub max_distance: f64,
    pub pull_back_delay: Duration,
}

impl Default for GeofencePolicy {
    fn default() -> Self {
        Self {
            max_distance: 10.0,
            pull_back_delay: Duration::milliseconds(2000),
        }
    }
}

impl GeofencePolicy {
    /// Whether `to` lies outside the allowed radius around `anchor`.
    /// A different world is always too far.
    pub fn is_too_far(&self, anchor: &Position, to: &Position, same_world: bool) -> bool {
        !same_world || to.distance_squared(anchor) > self.max_distance * self.max_distance
    }
}

/// Graduated pull-back with one grace timer per subject.
#[derive(Debug, Clone, Default)]
pub struct GeofenceGuard {
    policy: GeofencePolicy,
    pull_back_started: HashMap<SubjectId, DateTime<Utc>>,
}

impl GeofenceGuard {
    pub fn new(policy: GeofencePolicy) -> Self {
        Self {
            policy,
            pull_back_started: HashMap::new(),
        }
    }

    pub fn policy(&self) -> &GeofencePolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: GeofencePolicy) {
        self.policy = policy;
    }

    /// When the current violation began, if one is running.
    pub fn grace_started_at(&self, subject: SubjectId) -> Option<DateTime<Utc>> {
        self.pull_back_started.get(&subject).copied()
    }

    /// Drop the subject's grace timer. Called whenever its session goes away.
    pub fn clear(&mut self, subject: SubjectId) {
        self.pull_back_started.remove(&subject);
    }

    /// Evaluate a movement to `to` and return the corrective effects.
    ///
    /// Only sessions in `Work` are confined; any other phase short-circuits.
    pub fn check_movement(
        &mut self,
        subject: SubjectId,
        session: &Session,
        to: &Position,
        same_world: bool,
        now: DateTime<Utc>,
    ) -> Vec<Effect> {
        if session.phase() != Phase::Work {
            return Vec::new();
        }

        let anchor = session.anchor();
        if !self.policy.is_too_far(anchor, to, same_world) {
            if self.pull_back_started.remove(&subject).is_some() {
                debug!(%subject, "returned inside geofence, grace timer cleared");
            }
            return Vec::new();
        }

        let mut effects = Vec::new();
        let started = *self.pull_back_started.entry(subject).or_insert_with(|| {
            effects.push(Effect::warn(Notice::MovedTooFar));
            effects.push(Effect::warn(Notice::LeaveWarning));
            now
        });

        if now - started > self.policy.pull_back_delay {
            debug!(%subject, "grace period exceeded, teleporting to anchor");
            self.pull_back_started.remove(&subject);
            effects.push(Effect::Teleport { to: anchor.clone() });
        } else {
            effects.push(pull_back(anchor, to, same_world));
        }
        effects
    }

    /// Explicit relocation requests are denied when the destination is too far.
    pub fn check_teleport(&self, session: &Session, to: &Position, same_world: bool) -> Decision {
        if session.phase() == Phase::Work && self.policy.is_too_far(session.anchor(), to, same_world) {
            Decision::Deny(Notice::CantTeleport)
        } else {
            Decision::Allow
        }
    }

    /// Hard correction used before re-entering a phase from `Paused`; the
    /// grace period does not apply.
    pub fn correct_immediately(
        &mut self,
        subject: SubjectId,
        session: &Session,
        current: &Position,
        same_world: bool,
    ) -> Vec<Effect> {
        self.pull_back_started.remove(&subject);
        if self.policy.is_too_far(session.anchor(), current, same_world) {
            vec![
                Effect::warn(Notice::MovedTooFar),
                Effect::Teleport {
                    to: session.anchor().clone(),
                },
            ]
        } else {
            Vec::new()
        }
    }
}

/// Soft correction: push from `current` towards `anchor`, or teleport when no
/// direction exists (same spot, or a different world).
fn pull_back(anchor: &Position, current: &Position, same_world: bool) -> Effect {
    if !same_world {
        return Effect::Teleport { to: anchor.clone() };
    }
    let direction = current.towards(anchor);
    if direction.length_squared() < MIN_DIRECTION_LEN_SQ {
        return Effect::Teleport { to: anchor.clone() };
    }
    Effect::Nudge {
        velocity: direction.scaled_to(NUDGE_STRENGTH),
    }
}
