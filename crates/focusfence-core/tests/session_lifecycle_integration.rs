//! Integration tests for the session lifecycle.
//!
//! These tests drive the engine through complete work/break cycles against
//! the in-memory collaborators and check what reaches them.

use chrono::Utc;
use focusfence_core::adapters::memory::MemoryHarness;
use focusfence_core::{Effect, Engine, EngineSettings, Notice, Phase, Position, Preset, SubjectId};

fn engine_with_subject() -> (Engine, MemoryHarness, SubjectId) {
    let harness = MemoryHarness::new();
    let subject = SubjectId::new();
    harness
        .world
        .place(subject, Position::new("overworld", 0.0, 64.0, 0.0));
    let engine = Engine::new(EngineSettings::default(), harness.collaborators());
    (engine, harness, subject)
}

fn run_ticks(engine: &mut Engine, n: u32) {
    for _ in 0..n {
        engine.tick(Utc::now());
    }
}

#[test]
fn test_classic_work_interval_ends_at_gate() {
    let (mut engine, _harness, subject) = engine_with_subject();
    let view = engine.start(subject, Preset::default(), Utc::now()).unwrap();
    assert_eq!(view.time_left, 1500);
    assert_eq!(view.phase, Phase::Work);

    run_ticks(&mut engine, 1499);
    assert_eq!(engine.get_session(subject).unwrap().time_left(), 1);
    assert_eq!(engine.get_session(subject).unwrap().phase(), Phase::Work);

    run_ticks(&mut engine, 1);
    let session = engine.get_session(subject).unwrap();
    assert_eq!(session.phase(), Phase::WorkCompleted);
    assert_eq!(session.time_left(), 0);
}

#[test]
fn test_macro_cycle_resets_on_long_break() {
    let (mut engine, harness, subject) = engine_with_subject();
    let preset = Preset::new("Quick", 1, 1, 1, 2).unwrap();
    engine.start(subject, preset, Utc::now()).unwrap();

    // Cycle 1: work, gate, break
    run_ticks(&mut engine, 60);
    engine.advance_after_completion(subject).unwrap();
    assert_eq!(engine.get_session(subject).unwrap().phase(), Phase::Break);
    run_ticks(&mut engine, 60);

    // Cycle 2: work, gate, long break
    assert_eq!(engine.get_session(subject).unwrap().current_cycle(), 2);
    run_ticks(&mut engine, 60);
    engine.advance_after_completion(subject).unwrap();
    let session = engine.get_session(subject).unwrap();
    assert_eq!(session.phase(), Phase::LongBreak);
    assert_eq!(session.current_cycle(), 1);
    assert_eq!(harness.notifier.count(subject, Notice::AllRoundsComplete), 1);

    run_ticks(&mut engine, 60);
    let session = engine.get_session(subject).unwrap();
    assert_eq!(session.phase(), Phase::Work);
    assert_eq!(session.time_left(), 60);
    assert_eq!(harness.ledger.records(subject), vec![60, 60]);
}

#[test]
fn test_focus_recorded_once_including_gate_time() {
    let (mut engine, harness, subject) = engine_with_subject();
    engine
        .start(subject, Preset::new("Quick", 1, 1, 1, 4).unwrap(), Utc::now())
        .unwrap();
    run_ticks(&mut engine, 60 + 45);
    assert!(harness.ledger.records(subject).is_empty());

    engine.advance_after_completion(subject).unwrap();
    run_ticks(&mut engine, 30);
    assert_eq!(harness.ledger.records(subject), vec![105]);
    assert_eq!(harness.ledger.totals(subject).total_work_sessions, 1);
}

#[test]
fn test_stopping_at_gate_still_records_focus() {
    let (mut engine, harness, subject) = engine_with_subject();
    engine
        .start(subject, Preset::new("Quick", 1, 1, 1, 4).unwrap(), Utc::now())
        .unwrap();
    run_ticks(&mut engine, 62);
    engine.stop(subject).unwrap();

    assert_eq!(harness.ledger.records(subject), vec![62]);
    // Already done working: no incomplete-session warning.
    assert_eq!(harness.notifier.count(subject, Notice::SessionIncomplete), 0);
}

#[test]
fn test_stop_from_every_phase() {
    let phases: [fn(&mut Engine, SubjectId); 4] = [
        |_, _| {},
        |e, s| e.pause(s).unwrap(),
        |e, _| run_ticks(e, 60),
        |e, s| {
            run_ticks(e, 60);
            e.advance_after_completion(s).unwrap();
        },
    ];
    for prepare in phases {
        let (mut engine, harness, subject) = engine_with_subject();
        engine
            .start(subject, Preset::new("Quick", 1, 1, 1, 4).unwrap(), Utc::now())
            .unwrap();
        prepare(&mut engine, subject);

        let stopped = engine.stop(subject).unwrap();
        assert_eq!(stopped.phase(), Phase::Stopped);
        assert!(engine.get_session(subject).is_none());
        assert!(engine.stop(subject).is_none());
        assert!(harness.visuals.was_cleared(subject));
    }
}

#[test]
fn test_restart_replaces_session() {
    let (mut engine, harness, subject) = engine_with_subject();
    engine.start(subject, Preset::default(), Utc::now()).unwrap();
    run_ticks(&mut engine, 100);

    harness
        .world
        .place(subject, Position::new("overworld", 5.0, 64.0, 5.0));
    engine
        .start(subject, Preset::new("Short", 15, 3, 10, 4).unwrap(), Utc::now())
        .unwrap();

    let session = engine.get_session(subject).unwrap();
    assert_eq!(session.time_left(), 900);
    assert_eq!(session.anchor(), &Position::new("overworld", 5.0, 64.0, 5.0));
    assert_eq!(engine.len(), 1);
    assert_eq!(harness.notifier.count(subject, Notice::SessionIncomplete), 1);
}

#[test]
fn test_subjects_tick_independently() {
    let (mut engine, harness, alice) = engine_with_subject();
    let bob = SubjectId::new();
    harness
        .world
        .place(bob, Position::new("overworld", 100.0, 64.0, 100.0));

    engine.start(alice, Preset::default(), Utc::now()).unwrap();
    engine.start(bob, Preset::default(), Utc::now()).unwrap();
    run_ticks(&mut engine, 5);
    engine.pause(bob).unwrap();
    let report = engine.tick(Utc::now());

    assert_eq!(report.ticked, 2);
    assert_eq!(engine.get_session(alice).unwrap().time_left(), 1494);
    assert_eq!(engine.get_session(bob).unwrap().time_left(), 1495);
    assert!(report
        .effects
        .iter()
        .all(|applied| applied.effect == Effect::Refresh));
}
