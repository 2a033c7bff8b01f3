use serde::{Deserialize, Serialize};

use crate::position::{Position, Velocity};
use crate::session::Phase;

/// Message/cue delivered to a subject through the notification sink.
///
/// The core never renders text; it only names what should be shown or played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    WorkStart,
    BreakStart,
    LongBreakStart,
    WorkCompleted,
    /// Played every tick during the last five seconds of a timed phase.
    CountdownWarning,
    /// Work interval ran out.
    NextCycle,
    /// A full macro-cycle finished; played on entering a long break.
    AllRoundsComplete,
    /// Stopped while work or a short break was still in progress.
    SessionIncomplete,
    MovedTooFar,
    LeaveWarning,
    CantMove,
    CantTeleport,
    CantChat,
}

impl Notice {
    /// Localization key understood by the message/sound layer.
    pub fn key(self) -> &'static str {
        match self {
            Notice::WorkStart => "messages.work_start",
            Notice::BreakStart => "messages.break_start",
            Notice::LongBreakStart => "messages.long_break_start",
            Notice::WorkCompleted => "messages.work_completed",
            Notice::CountdownWarning => "sounds.timer_end_warning",
            Notice::NextCycle => "sounds.next_cycle",
            Notice::AllRoundsComplete => "sounds.complete_all_rounds",
            Notice::SessionIncomplete => "sounds.session_fail",
            Notice::MovedTooFar => "actionbar.moved_too_far",
            Notice::LeaveWarning => "sounds.leave_warning",
            Notice::CantMove => "actionbar.cant_move",
            Notice::CantTeleport => "actionbar.cant_teleport",
            Notice::CantChat => "messages.cant_chat",
        }
    }
}

/// A side effect produced by the state machine or the geofence guard.
///
/// Transition functions stay pure: they mutate only the session and return
/// effects, which the engine then applies to its collaborators in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    Announce { notice: Notice },
    Warn { notice: Notice },
    PhaseChanged { from: Phase, to: Phase },
    /// Total focused seconds for one completed work interval.
    RecordFocus { seconds: u32 },
    Teleport { to: Position },
    Nudge { velocity: Velocity },
    /// Visual refresh requested by the phase itself.
    Refresh,
    ClearVisuals,
}

impl Effect {
    pub fn announce(notice: Notice) -> Self {
        Effect::Announce { notice }
    }

    pub fn warn(notice: Notice) -> Self {
        Effect::Warn { notice }
    }
}

/// Outcome of a movement, teleport or chat check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "notice", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny(Notice),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}
