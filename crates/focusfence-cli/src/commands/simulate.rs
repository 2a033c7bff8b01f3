//! `simulate`: drive one subject through an in-memory world.
//!
//! Every observable outcome is printed to stdout as one JSON object per line,
//! tagged with the simulated second `t` it happened at.

use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Args;
use focusfence_core::adapters::memory::MemoryHarness;
use focusfence_core::{
    Collaborators, Config, Effect, Engine, EngineHandle, Phase, Position, PositionProvider,
    SubjectId, TickScheduler, TICK_INTERVAL,
};
use serde::Serialize;

use super::CmdResult;

/// Simulated seconds of each 30 s wander cycle at which the subject steps away.
const WANDER_STEPS: std::ops::Range<u64> = 10..16;
const WANDER_STRIDE: f64 = 4.0;

#[derive(Args)]
pub struct SimulateArgs {
    /// Preset key from the configuration
    #[arg(long, default_value = "classic")]
    pub preset: String,
    /// Number of one-second ticks to run
    #[arg(long, default_value_t = 60)]
    pub ticks: u64,
    /// Walk away from the anchor periodically during work
    #[arg(long)]
    pub wander: bool,
    /// Seconds spent at the completion gate before confirming the break
    #[arg(long, default_value_t = 5)]
    pub gate_secs: u32,
    /// Tick on the wall clock through the scheduler task instead of instantly
    #[arg(long)]
    pub realtime: bool,
}

#[derive(Serialize)]
struct Line<T: Serialize> {
    t: u64,
    event: &'static str,
    #[serde(flatten)]
    body: T,
}

fn emit<T: Serialize>(t: u64, event: &'static str, body: T) -> CmdResult {
    println!("{}", serde_json::to_string(&Line { t, event, body })?);
    Ok(())
}

/// Prints what the in-memory collaborators recorded since the last flush.
struct Recorder {
    harness: MemoryHarness,
    subject: SubjectId,
    movements_seen: usize,
    records_seen: usize,
}

impl Recorder {
    fn new(harness: MemoryHarness, subject: SubjectId) -> Self {
        Self {
            harness,
            subject,
            movements_seen: 0,
            records_seen: 0,
        }
    }

    fn flush(&mut self, t: u64) -> CmdResult {
        for delivered in self.harness.notifier.take() {
            emit(t, "notice", delivered)?;
        }

        let movements = self.harness.world.movements();
        for movement in &movements[self.movements_seen..] {
            emit(t, "movement", movement)?;
        }
        self.movements_seen = movements.len();

        let records = self.harness.ledger.records(self.subject);
        for seconds in &records[self.records_seen..] {
            emit(t, "focus_recorded", serde_json::json!({ "seconds": seconds }))?;
        }
        self.records_seen = records.len();
        Ok(())
    }

    fn finish(&mut self, t: u64) -> CmdResult {
        self.flush(t)?;
        emit(t, "finished", self.harness.ledger.totals(self.subject))
    }
}

/// Next step of the wander walk, or `None` if the subject stays put.
fn wander_step(t: u64, current: &Position) -> Option<Position> {
    if !WANDER_STEPS.contains(&(t % 30)) {
        return None;
    }
    let mut to = current.clone();
    to.x += WANDER_STRIDE;
    Some(to)
}

pub fn run(args: SimulateArgs) -> CmdResult {
    // A broken config file should not keep the sandbox from running.
    let config = Config::load_or_default();
    let harness = MemoryHarness::new();
    let subject = SubjectId::new();
    harness
        .world
        .place(subject, Position::new("overworld", 0.0, 64.0, 0.0));

    let collab = Collaborators {
        presets: Arc::new(config.clone()),
        ..harness.collaborators()
    };
    let engine = Engine::from_config(&config, collab);

    if args.realtime {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_time()
            .build()?;
        runtime.block_on(run_realtime(engine, harness, subject, &args))
    } else {
        run_instant(engine, harness, subject, &args)
    }
}

fn run_instant(
    mut engine: Engine,
    harness: MemoryHarness,
    subject: SubjectId,
    args: &SimulateArgs,
) -> CmdResult {
    let start = Utc::now();
    let mut recorder = Recorder::new(harness.clone(), subject);

    let view = engine.start_preset(subject, &args.preset, start)?;
    emit(0, "started", view)?;
    recorder.flush(0)?;

    for t in 1..=args.ticks {
        let now = start + Duration::seconds(t as i64);
        let report = engine.tick(now);
        for applied in &report.effects {
            if matches!(applied.effect, Effect::PhaseChanged { .. }) {
                emit(t, "effect", applied)?;
            }
        }

        let Some(session) = engine.get_session(subject) else {
            break;
        };
        match session.phase() {
            Phase::WorkCompleted if session.extra_time() >= args.gate_secs => {
                engine.advance_after_completion(subject)?;
            }
            Phase::Work if args.wander => {
                if let Some(from) = harness.world.current(subject) {
                    if let Some(to) = wander_step(t, &from) {
                        harness.world.place(subject, to.clone());
                        let decision = engine.on_move(subject, &from, &to, now);
                        if !decision.is_allowed() {
                            harness.world.place(subject, from);
                        }
                        emit(t, "move", decision)?;
                    }
                }
            }
            _ => {}
        }
        recorder.flush(t)?;
    }

    engine.stop(subject);
    recorder.finish(args.ticks)
}

async fn run_realtime(
    engine: Engine,
    harness: MemoryHarness,
    subject: SubjectId,
    args: &SimulateArgs,
) -> CmdResult {
    let (handle, task) = TickScheduler::spawn(engine);
    let mut recorder = Recorder::new(harness.clone(), subject);

    let view = handle.start_preset(subject, &args.preset).await?;
    emit(0, "started", view)?;
    recorder.flush(0)?;

    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.tick().await;
    for t in 1..=args.ticks {
        interval.tick().await;
        step_realtime(&handle, &harness, subject, t, args).await?;
        recorder.flush(t)?;
    }

    handle.stop(subject).await?;
    handle.shutdown().await;
    task.await?;
    recorder.finish(args.ticks)
}

async fn step_realtime(
    handle: &EngineHandle,
    harness: &MemoryHarness,
    subject: SubjectId,
    t: u64,
    args: &SimulateArgs,
) -> CmdResult {
    let Some(view) = handle.session_view(subject).await? else {
        return Ok(());
    };
    match view.phase {
        Phase::WorkCompleted if view.extra_time >= args.gate_secs => {
            handle.advance_after_completion(subject).await?;
        }
        Phase::Work if args.wander => {
            if let Some(from) = harness.world.current(subject) {
                if let Some(to) = wander_step(t, &from) {
                    harness.world.place(subject, to.clone());
                    let decision = handle.on_move(subject, from.clone(), to).await?;
                    if !decision.is_allowed() {
                        harness.world.place(subject, from);
                    }
                    emit(t, "move", decision)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wander_walks_only_inside_window() {
        let here = Position::new("overworld", 0.0, 64.0, 0.0);
        assert!(wander_step(9, &here).is_none());
        assert_eq!(wander_step(10, &here).unwrap().x, 4.0);
        assert_eq!(wander_step(45, &here).unwrap().x, 4.0);
        assert!(wander_step(16, &here).is_none());
    }
}
