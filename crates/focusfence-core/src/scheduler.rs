//! Tick scheduler - the actor that owns the [`Engine`].
//!
//! A single tokio task holds the engine and selects between a 1 Hz interval
//! and a command queue. Every external event reaches the engine through
//! [`EngineHandle`], so ticks and commands are never interleaved mid-update.
//!
//! ```ignore
//! let (handle, task) = TickScheduler::spawn(engine);
//! handle.start_preset(subject, "classic").await?;
//! // ...
//! handle.shutdown().await;
//! let engine = task.await?;
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::{Engine, TickReport};
use crate::error::{CoreError, Result};
use crate::events::Decision;
use crate::position::{Position, SubjectId};
use crate::preset::Preset;
use crate::session::{Session, SessionView, VisualKind};
use crate::storage::Config;

/// One tick per second.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

const COMMAND_QUEUE_CAPACITY: usize = 256;

type Job = Box<dyn FnOnce(&mut Engine, DateTime<Utc>) + Send>;

enum Command {
    Run(Job),
    Shutdown,
}

pub struct TickScheduler;

impl TickScheduler {
    /// Move `engine` into a new task ticking at [`TICK_INTERVAL`].
    ///
    /// The join handle yields the engine back once the scheduler stops,
    /// either after [`EngineHandle::shutdown`] or when every handle is dropped.
    pub fn spawn(engine: Engine) -> (EngineHandle, JoinHandle<Engine>) {
        Self::spawn_with_period(engine, TICK_INTERVAL)
    }

    pub fn spawn_with_period(engine: Engine, period: Duration) -> (EngineHandle, JoinHandle<Engine>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let task = tokio::spawn(run(engine, rx, period));
        (EngineHandle { tx }, task)
    }
}

async fn run(mut engine: Engine, mut rx: mpsc::Receiver<Command>, period: Duration) -> Engine {
    // First tick one period after start, not immediately.
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_ms = period.as_millis() as u64, "tick scheduler started");

    loop {
        tokio::select! {
            biased;
            command = rx.recv() => match command {
                Some(Command::Run(job)) => job(&mut engine, Utc::now()),
                Some(Command::Shutdown) => {
                    debug!("scheduler shutdown requested");
                    break;
                }
                None => {
                    debug!("all engine handles dropped");
                    break;
                }
            },
            _ = interval.tick() => {
                let TickReport { ticked, skipped, .. } = engine.tick(Utc::now());
                debug!(ticked, skipped, "tick");
            }
        }
    }

    info!(sessions = engine.len(), "tick scheduler stopped");
    engine
}

/// Cloneable, async front door to the engine task.
///
/// Each call is queued and answered once the engine has run it. Every method
/// fails with [`CoreError::SchedulerClosed`] after the scheduler stopped.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
}

impl EngineHandle {
    /// Run `f` inside the engine task with the current time.
    pub async fn call<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Engine, DateTime<Utc>) -> R + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |engine, now| {
            // The caller may have given up waiting; nothing to do then.
            let _ = reply.send(f(engine, now));
        });
        self.tx
            .send(Command::Run(job))
            .await
            .map_err(|_| CoreError::SchedulerClosed)?;
        response.await.map_err(|_| CoreError::SchedulerClosed)
    }

    pub async fn start(&self, subject: SubjectId, preset: Preset) -> Result<SessionView> {
        self.call(move |engine, now| engine.start(subject, preset, now))
            .await?
    }

    pub async fn start_preset(&self, subject: SubjectId, key: &str) -> Result<SessionView> {
        let key = key.to_string();
        self.call(move |engine, now| engine.start_preset(subject, &key, now))
            .await?
    }

    pub async fn stop(&self, subject: SubjectId) -> Result<Option<Session>> {
        self.call(move |engine, _| engine.stop(subject)).await
    }

    pub async fn disconnect(&self, subject: SubjectId) -> Result<Option<Session>> {
        self.call(move |engine, _| engine.disconnect(subject)).await
    }

    pub async fn pause(&self, subject: SubjectId) -> Result<()> {
        self.call(move |engine, _| engine.pause(subject)).await?
    }

    pub async fn resume(&self, subject: SubjectId) -> Result<()> {
        self.call(move |engine, _| engine.resume(subject)).await?
    }

    pub async fn advance_after_completion(&self, subject: SubjectId) -> Result<()> {
        self.call(move |engine, _| engine.advance_after_completion(subject))
            .await?
    }

    pub async fn toggle_visual(&self, subject: SubjectId, kind: VisualKind) -> Result<bool> {
        self.call(move |engine, _| engine.toggle_visual(subject, kind))
            .await?
    }

    pub async fn on_move(&self, subject: SubjectId, from: Position, to: Position) -> Result<Decision> {
        self.call(move |engine, now| engine.on_move(subject, &from, &to, now))
            .await
    }

    pub async fn on_teleport_attempt(&self, subject: SubjectId, to: Position) -> Result<Decision> {
        self.call(move |engine, _| engine.on_teleport_attempt(subject, &to))
            .await
    }

    pub async fn on_world_change(&self, subject: SubjectId) -> Result<()> {
        self.call(move |engine, now| engine.on_world_change(subject, now))
            .await
    }

    pub async fn on_chat(&self, subject: SubjectId) -> Result<Decision> {
        self.call(move |engine, _| engine.on_chat(subject)).await
    }

    /// Apply a reloaded configuration between two ticks.
    pub async fn reload(&self, config: Config) -> Result<()> {
        self.call(move |engine, _| engine.reload(&config)).await
    }

    pub async fn get_session(&self, subject: SubjectId) -> Result<Option<Session>> {
        self.call(move |engine, _| engine.get_session(subject).cloned())
            .await
    }

    pub async fn session_view(&self, subject: SubjectId) -> Result<Option<SessionView>> {
        self.call(move |engine, _| engine.session_view(subject))
            .await
    }

    /// Ask the scheduler to stop after the commands already queued.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
