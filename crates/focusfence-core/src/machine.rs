//! Session state machine.
//!
//! Every phase's behaviour lives in one `match` arm of [`tick`], [`enter`] or
//! [`exit`]. The functions mutate only the [`Session`] they are given and
//! return the side effects to perform; nothing here talks to collaborators.
//!
//! ## Transitions
//!
//! ```text
//! start ─> Work ──(0s)──> WorkCompleted ──advance──> Break ─────(0s)──> Work
//!                                            └─────> LongBreak ─(0s)──> Work
//! Work | Break | LongBreak ──pause──> Paused ──resume──> (previous phase)
//! any ──stop──> Stopped
//! ```
//!
//! A *cold* entry resets the phase timer and announces the phase. A
//! *resuming* entry (leaving `Paused`) does neither.

use crate::error::{CoreError, Result};
use crate::events::{Effect, Notice};
use crate::session::{Phase, Session};

/// Seconds before the end of a timed phase from which a warning plays each tick.
pub const COUNTDOWN_WARNING_SECS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Cold,
    Resuming,
}

/// Result of one tick: per-tick effects and the phase to move to, if the
/// current one ran out.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Step {
    pub next: Option<Phase>,
    pub effects: Vec<Effect>,
}

/// Per-phase tick. Does not perform the transition; see [`run_tick`].
pub fn tick(session: &mut Session) -> Step {
    match session.phase {
        Phase::Work | Phase::Break | Phase::LongBreak => {
            session.time_left = session.time_left.saturating_sub(1);
            if session.time_left == 0 {
                let next = if session.phase == Phase::Work {
                    Phase::WorkCompleted
                } else {
                    Phase::Work
                };
                let mut effects = Vec::new();
                if session.phase == Phase::Work {
                    effects.push(Effect::announce(Notice::NextCycle));
                }
                Step {
                    next: Some(next),
                    effects,
                }
            } else if session.time_left <= COUNTDOWN_WARNING_SECS {
                Step {
                    next: None,
                    effects: vec![Effect::announce(Notice::CountdownWarning)],
                }
            } else {
                Step::default()
            }
        }
        Phase::WorkCompleted => {
            session.extra_time = session.extra_time.saturating_add(1);
            Step {
                next: None,
                effects: vec![Effect::Refresh],
            }
        }
        Phase::Paused | Phase::Stopped => Step::default(),
    }
}

/// Tick and, if the phase ran out, enter the next one cold.
pub fn run_tick(session: &mut Session) -> Vec<Effect> {
    let Step { next, mut effects } = tick(session);
    if let Some(next) = next {
        effects.extend(transition(session, next, Entry::Cold));
    }
    effects
}

/// Phase-entry policy.
pub fn enter(session: &mut Session, from: Phase, entry: Entry) -> Vec<Effect> {
    let mut effects = Vec::new();
    match session.phase {
        Phase::Work => {
            if entry == Entry::Cold {
                session.time_left = session.work_secs;
                effects.push(Effect::announce(Notice::WorkStart));
            }
        }
        Phase::Break => {
            if entry == Entry::Cold {
                session.time_left = session.break_secs;
                effects.push(Effect::announce(Notice::BreakStart));
            }
        }
        Phase::LongBreak => {
            if entry == Entry::Cold {
                session.time_left = session.long_break_secs;
                session.current_cycle = 1;
                effects.push(Effect::announce(Notice::LongBreakStart));
                effects.push(Effect::announce(Notice::AllRoundsComplete));
            }
        }
        Phase::WorkCompleted => {
            if entry == Entry::Cold {
                session.extra_time = 0;
                effects.push(Effect::announce(Notice::WorkCompleted));
                effects.push(Effect::Refresh);
            }
        }
        Phase::Paused => {}
        Phase::Stopped => {
            if interrupted_active_phase(from, session.previous_phase) {
                effects.push(Effect::warn(Notice::SessionIncomplete));
            }
            effects.push(Effect::ClearVisuals);
        }
    }
    effects
}

/// Phase-exit policy. Leaving the completion gate is the only place focus
/// time is reported.
pub fn exit(session: &Session) -> Vec<Effect> {
    match session.phase {
        Phase::WorkCompleted => vec![Effect::RecordFocus {
            seconds: session.work_secs.saturating_add(session.extra_time),
        }],
        _ => Vec::new(),
    }
}

/// Move `session` to `to`, running exit and entry hooks. Re-entering the
/// current phase is a no-op.
pub fn transition(session: &mut Session, to: Phase, entry: Entry) -> Vec<Effect> {
    let from = session.phase;
    if from == to {
        return Vec::new();
    }
    let mut effects = exit(session);
    session.phase = to;
    effects.push(Effect::PhaseChanged { from, to });
    effects.extend(enter(session, from, entry));
    effects
}

// ── Commands ─────────────────────────────────────────────────────────

/// Begin the first work interval of a freshly created session.
pub fn start(session: &mut Session) -> Vec<Effect> {
    session.current_cycle = 1;
    session.previous_phase = None;
    transition(session, Phase::Work, Entry::Cold)
}

pub fn pause(session: &mut Session) -> Result<Vec<Effect>> {
    if !session.phase.is_timed() {
        return Err(CoreError::InvalidPhase {
            command: "pause",
            phase: session.phase,
        });
    }
    session.previous_phase = Some(session.phase);
    Ok(transition(session, Phase::Paused, Entry::Cold))
}

pub fn resume(session: &mut Session) -> Result<Vec<Effect>> {
    let target = match (session.phase, session.previous_phase) {
        (Phase::Paused, Some(prev)) => prev,
        (phase, _) => {
            return Err(CoreError::InvalidPhase {
                command: "resume",
                phase,
            })
        }
    };
    Ok(transition(session, target, Entry::Resuming))
}

/// Confirm the completion gate and start the break.
pub fn advance_after_completion(session: &mut Session) -> Result<Vec<Effect>> {
    if session.phase != Phase::WorkCompleted {
        return Err(CoreError::InvalidPhase {
            command: "advance",
            phase: session.phase,
        });
    }
    let next = if session.current_cycle >= session.cycle_length {
        Phase::LongBreak
    } else {
        session.current_cycle += 1;
        Phase::Break
    };
    Ok(transition(session, next, Entry::Cold))
}

pub fn stop(session: &mut Session) -> Vec<Effect> {
    transition(session, Phase::Stopped, Entry::Cold)
}

fn interrupted_active_phase(from: Phase, previous: Option<Phase>) -> bool {
    match from {
        Phase::Work | Phase::Break => true,
        Phase::Paused => matches!(previous, Some(Phase::Work | Phase::Break)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use crate::preset::Preset;
    use chrono::Utc;
    use proptest::prelude::*;

    fn started(preset: Preset) -> Session {
        let mut s = Session::new(
            preset,
            Position::new("overworld", 0.0, 64.0, 0.0),
            true,
            true,
            Utc::now(),
        );
        start(&mut s);
        s
    }

    fn preset(work: u32, brk: u32, long: u32, cycles: u32) -> Preset {
        Preset::new("test", work, brk, long, cycles).unwrap()
    }

    fn tick_n(s: &mut Session, n: u32) -> Vec<Effect> {
        let mut all = Vec::new();
        for _ in 0..n {
            all.extend(run_tick(s));
        }
        all
    }

    fn focus_records(effects: &[Effect]) -> Vec<u32> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::RecordFocus { seconds } => Some(*seconds),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn start_enters_work_with_full_time() {
        let s = started(Preset::default());
        assert_eq!(s.phase(), Phase::Work);
        assert_eq!(s.time_left(), 1500);
        assert_eq!(s.current_cycle(), 1);
    }

    #[test]
    fn start_announces_work() {
        let mut s = Session::new(
            Preset::default(),
            Position::new("overworld", 0.0, 0.0, 0.0),
            true,
            true,
            Utc::now(),
        );
        let effects = start(&mut s);
        assert!(effects.contains(&Effect::announce(Notice::WorkStart)));
        assert!(effects.contains(&Effect::PhaseChanged {
            from: Phase::Stopped,
            to: Phase::Work
        }));
    }

    #[test]
    fn work_exhaustion_goes_to_completion_gate() {
        let mut s = started(Preset::default());
        tick_n(&mut s, 1499);
        assert_eq!(s.phase(), Phase::Work);
        assert_eq!(s.time_left(), 1);

        let effects = run_tick(&mut s);
        assert_eq!(s.phase(), Phase::WorkCompleted);
        assert_eq!(s.time_left(), 0);
        assert_eq!(s.extra_time(), 0);
        assert!(effects.contains(&Effect::announce(Notice::NextCycle)));
        assert!(focus_records(&effects).is_empty());
    }

    #[test]
    fn countdown_warning_in_last_five_seconds() {
        let mut s = started(preset(1, 1, 1, 2));
        let early = tick_n(&mut s, 54);
        assert!(!early.contains(&Effect::announce(Notice::CountdownWarning)));

        let warnings = (0..5)
            .map(|_| run_tick(&mut s))
            .filter(|e| e.contains(&Effect::announce(Notice::CountdownWarning)))
            .count();
        // 5, 4, 3, 2, 1 remaining
        assert_eq!(warnings, 5);
        assert_eq!(s.time_left(), 1);
    }

    #[test]
    fn completion_gate_counts_extra_time_and_records_once() {
        let mut s = started(preset(1, 1, 1, 4));
        tick_n(&mut s, 60);
        assert_eq!(s.phase(), Phase::WorkCompleted);

        let gate_effects = tick_n(&mut s, 30);
        assert_eq!(s.extra_time(), 30);
        assert_eq!(s.time_left(), 0);
        assert!(focus_records(&gate_effects).is_empty());

        let effects = advance_after_completion(&mut s).unwrap();
        assert_eq!(focus_records(&effects), vec![90]);
        assert_eq!(s.phase(), Phase::Break);
        assert_eq!(s.current_cycle(), 2);
        assert_eq!(s.time_left(), 60);

        let later = tick_n(&mut s, 10);
        assert!(focus_records(&later).is_empty());
    }

    #[test]
    fn last_cycle_advances_to_long_break_and_resets_cycle() {
        let mut s = started(preset(1, 1, 2, 2));
        tick_n(&mut s, 60);
        advance_after_completion(&mut s).unwrap();
        assert_eq!(s.phase(), Phase::Break);
        assert_eq!(s.current_cycle(), 2);

        tick_n(&mut s, 60);
        assert_eq!(s.phase(), Phase::Work);
        assert_eq!(s.time_left(), 60);

        tick_n(&mut s, 60);
        let effects = advance_after_completion(&mut s).unwrap();
        assert_eq!(s.phase(), Phase::LongBreak);
        assert_eq!(s.current_cycle(), 1);
        assert_eq!(s.time_left(), 120);
        assert!(effects.contains(&Effect::announce(Notice::AllRoundsComplete)));

        tick_n(&mut s, 120);
        assert_eq!(s.phase(), Phase::Work);
        assert_eq!(s.current_cycle(), 1);
    }

    #[test]
    fn entering_long_break_resets_cycle_regardless_of_value() {
        let mut s = started(preset(1, 1, 1, 3));
        s.current_cycle = 3;
        s.phase = Phase::Break;
        transition(&mut s, Phase::LongBreak, Entry::Cold);
        assert_eq!(s.current_cycle(), 1);
    }

    #[test]
    fn pause_then_resume_is_a_pure_continuation() {
        let mut s = started(Preset::default());
        tick_n(&mut s, 100);
        let before = (s.phase(), s.time_left());

        let paused = pause(&mut s).unwrap();
        assert_eq!(s.phase(), Phase::Paused);
        assert_eq!(s.previous_phase(), Some(Phase::Work));
        assert!(!paused.iter().any(|e| matches!(e, Effect::Announce { .. })));

        let resumed = resume(&mut s).unwrap();
        assert_eq!((s.phase(), s.time_left()), before);
        assert!(!resumed.contains(&Effect::announce(Notice::WorkStart)));
    }

    #[test]
    fn paused_ticks_do_nothing() {
        let mut s = started(Preset::default());
        pause(&mut s).unwrap();
        let effects = tick_n(&mut s, 500);
        assert!(effects.is_empty());
        assert_eq!(s.time_left(), 1500);
    }

    #[test]
    fn resume_while_not_paused_is_rejected() {
        let mut s = started(Preset::default());
        let err = resume(&mut s).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidPhase {
                command: "resume",
                phase: Phase::Work
            }
        ));
        assert_eq!(s.phase(), Phase::Work);
    }

    #[test]
    fn pause_rejected_outside_timed_phases() {
        let mut s = started(preset(1, 1, 1, 1));
        tick_n(&mut s, 60);
        assert!(pause(&mut s).is_err());
        assert_eq!(s.phase(), Phase::WorkCompleted);

        let mut s = started(Preset::default());
        pause(&mut s).unwrap();
        assert!(pause(&mut s).is_err());
        assert_eq!(s.previous_phase(), Some(Phase::Work));
    }

    #[test]
    fn advance_rejected_outside_completion_gate() {
        let mut s = started(Preset::default());
        assert!(advance_after_completion(&mut s).is_err());
        assert_eq!(s.current_cycle(), 1);
    }

    #[test]
    fn resume_into_long_break_keeps_time() {
        let mut s = started(preset(1, 1, 3, 1));
        tick_n(&mut s, 60);
        advance_after_completion(&mut s).unwrap();
        tick_n(&mut s, 30);
        pause(&mut s).unwrap();
        let effects = resume(&mut s).unwrap();
        assert_eq!(s.phase(), Phase::LongBreak);
        assert_eq!(s.time_left(), 150);
        assert!(!effects.contains(&Effect::announce(Notice::LongBreakStart)));
    }

    #[test]
    fn stopping_active_work_signals_incomplete() {
        let mut s = started(Preset::default());
        let effects = stop(&mut s);
        assert_eq!(s.phase(), Phase::Stopped);
        assert!(effects.contains(&Effect::warn(Notice::SessionIncomplete)));
        assert!(effects.contains(&Effect::ClearVisuals));
    }

    #[test]
    fn stopping_paused_break_signals_incomplete() {
        let mut s = started(preset(1, 1, 1, 4));
        tick_n(&mut s, 60);
        advance_after_completion(&mut s).unwrap();
        pause(&mut s).unwrap();
        let effects = stop(&mut s);
        assert!(effects.contains(&Effect::warn(Notice::SessionIncomplete)));
    }

    #[test]
    fn stopping_long_break_or_gate_is_not_incomplete() {
        let mut s = started(preset(1, 1, 1, 1));
        tick_n(&mut s, 60);
        let effects = stop(&mut s);
        assert!(!effects.contains(&Effect::warn(Notice::SessionIncomplete)));
        // Leaving the gate still reports the finished interval.
        assert_eq!(focus_records(&effects), vec![60]);

        let mut s = started(preset(1, 1, 1, 1));
        tick_n(&mut s, 60);
        advance_after_completion(&mut s).unwrap();
        assert_eq!(s.phase(), Phase::LongBreak);
        pause(&mut s).unwrap();
        let effects = stop(&mut s);
        assert!(!effects.contains(&Effect::warn(Notice::SessionIncomplete)));
    }

    #[test]
    fn stop_twice_is_noop() {
        let mut s = started(Preset::default());
        stop(&mut s);
        assert!(stop(&mut s).is_empty());
        assert_eq!(s.phase(), Phase::Stopped);
    }

    proptest! {
        #[test]
        fn countdown_invariants_hold(
            work in 1u32..4,
            brk in 1u32..3,
            long in 1u32..3,
            cycles in 1u32..5,
            ticks in 0u32..2000,
        ) {
            let mut s = started(preset(work, brk, long, cycles));
            let mut recorded = 0usize;
            let mut completions = 0usize;
            for _ in 0..ticks {
                let effects = run_tick(&mut s);
                if s.phase() == Phase::WorkCompleted {
                    completions += 1;
                    recorded += focus_records(&advance_after_completion(&mut s).unwrap()).len();
                }
                recorded += focus_records(&effects).len();
                let limit = s.duration_of(s.phase()).unwrap_or(0);
                prop_assert!(s.time_left() <= limit);
                prop_assert!(s.current_cycle() >= 1 && s.current_cycle() <= s.cycle_length());
            }
            prop_assert_eq!(recorded, completions);
        }
    }
}
