//! Per-subject session state.
//!
//! A [`Session`] is plain data. All phase changes go through
//! [`crate::machine`]; the registry is the only owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::position::Position;
use crate::preset::Preset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Work,
    Break,
    LongBreak,
    Paused,
    /// Work interval ran out; waiting for the subject to confirm the break.
    WorkCompleted,
    Stopped,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Work => "work",
            Phase::Break => "break",
            Phase::LongBreak => "long_break",
            Phase::Paused => "paused",
            Phase::WorkCompleted => "work_completed",
            Phase::Stopped => "stopped",
        }
    }

    /// Phases that count down and can be paused.
    pub fn is_timed(self) -> bool {
        matches!(self, Phase::Work | Phase::Break | Phase::LongBreak)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which on-screen element a toggle applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualKind {
    BossBar,
    Title,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub(crate) phase: Phase,
    pub(crate) previous_phase: Option<Phase>,
    pub(crate) preset: Preset,
    pub(crate) work_secs: u32,
    pub(crate) break_secs: u32,
    pub(crate) long_break_secs: u32,
    pub(crate) cycle_length: u32,
    pub(crate) current_cycle: u32,
    pub(crate) time_left: u32,
    pub(crate) extra_time: u32,
    pub(crate) anchor: Position,
    pub(crate) bossbar_enabled: bool,
    pub(crate) title_enabled: bool,
    pub(crate) started_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session in `Stopped`; the registry enters `Work` right after.
    pub fn new(
        preset: Preset,
        anchor: Position,
        bossbar_enabled: bool,
        title_enabled: bool,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            phase: Phase::Stopped,
            previous_phase: None,
            work_secs: preset.work_secs(),
            break_secs: preset.break_secs(),
            long_break_secs: preset.long_break_secs(),
            cycle_length: preset.cycle_length.max(1),
            current_cycle: 1,
            time_left: preset.work_secs(),
            extra_time: 0,
            preset,
            anchor,
            bossbar_enabled,
            title_enabled,
            started_at,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn previous_phase(&self) -> Option<Phase> {
        self.previous_phase
    }

    pub fn preset(&self) -> &Preset {
        &self.preset
    }

    pub fn work_secs(&self) -> u32 {
        self.work_secs
    }

    pub fn break_secs(&self) -> u32 {
        self.break_secs
    }

    pub fn long_break_secs(&self) -> u32 {
        self.long_break_secs
    }

    pub fn cycle_length(&self) -> u32 {
        self.cycle_length
    }

    pub fn current_cycle(&self) -> u32 {
        self.current_cycle
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn extra_time(&self) -> u32 {
        self.extra_time
    }

    pub fn anchor(&self) -> &Position {
        &self.anchor
    }

    pub fn bossbar_enabled(&self) -> bool {
        self.bossbar_enabled
    }

    pub fn title_enabled(&self) -> bool {
        self.title_enabled
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_paused(&self) -> bool {
        self.phase == Phase::Paused
    }

    /// Phase shown to the subject: the interrupted phase while paused.
    pub fn display_phase(&self) -> Phase {
        match (self.phase, self.previous_phase) {
            (Phase::Paused, Some(prev)) => prev,
            (phase, _) => phase,
        }
    }

    /// Configured length of `phase` in seconds, if it has one.
    pub fn duration_of(&self, phase: Phase) -> Option<u32> {
        match phase {
            Phase::Work => Some(self.work_secs),
            Phase::Break => Some(self.break_secs),
            Phase::LongBreak => Some(self.long_break_secs),
            _ => None,
        }
    }

    /// Fraction of the displayed phase still remaining, clamped to 0..=1.
    pub fn progress(&self) -> f64 {
        match self.duration_of(self.display_phase()) {
            Some(total) if total > 0 => (self.time_left as f64 / total as f64).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    // ── Mutations open to the subject ────────────────────────────────

    /// Flip one visual toggle and return its new value.
    pub fn toggle_visual(&mut self, kind: VisualKind) -> bool {
        let flag = match kind {
            VisualKind::BossBar => &mut self.bossbar_enabled,
            VisualKind::Title => &mut self.title_enabled,
        };
        *flag = !*flag;
        *flag
    }

    pub fn view(&self) -> SessionView {
        SessionView::from(self)
    }
}

/// Read-only snapshot handed to the visual layer and printed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub preset_name: String,
    pub phase: Phase,
    pub display_phase: Phase,
    pub time_left: u32,
    /// `MM:SS`
    pub clock: String,
    pub current_cycle: u32,
    pub cycle_length: u32,
    pub extra_time: u32,
    pub progress: f64,
    pub bossbar_enabled: bool,
    pub title_enabled: bool,
}

impl From<&Session> for SessionView {
    fn from(s: &Session) -> Self {
        Self {
            preset_name: s.preset.name.clone(),
            phase: s.phase,
            display_phase: s.display_phase(),
            time_left: s.time_left,
            clock: format_clock(s.time_left),
            current_cycle: s.current_cycle,
            cycle_length: s.cycle_length,
            extra_time: s.extra_time,
            progress: s.progress(),
            bossbar_enabled: s.bossbar_enabled,
            title_enabled: s.title_enabled,
        }
    }
}

/// Format seconds as zero-padded `MM:SS`.
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
