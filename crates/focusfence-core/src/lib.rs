//! # Focusfence Core Library
//!
//! Per-subject focus timers with spatial confinement. Each subject runs an
//! independent work/break cycle driven by a 1 Hz clock, must confirm the end
//! of a work interval before its break starts, and is kept near the point
//! where the session began while working.
//!
//! ## Architecture
//!
//! - **State machine** ([`machine`]): enum-dispatched phase table over plain
//!   [`Session`] data; every transition returns a list of [`Effect`]s
//! - **Geofence** ([`geofence`]): grace timer, nudges and hard pull-back
//! - **Engine** ([`Engine`]): owns the sessions and applies effects to the
//!   injected collaborators
//! - **Scheduler** ([`TickScheduler`]): tokio task owning the engine; commands
//!   and ticks are serialized through one queue
//! - **Storage**: TOML configuration and SQLite focus statistics / presets
//!
//! ## Key Components
//!
//! - [`Engine`] / [`EngineHandle`]: synchronous core and its async front door
//! - [`Config`]: restrictions, display defaults and named presets
//! - [`Database`]: focus statistics and subject-owned presets
//! - [`adapters`]: collaborator traits plus in-memory implementations

pub mod adapters;
pub mod engine;
pub mod error;
pub mod events;
pub mod geofence;
pub mod machine;
pub mod position;
pub mod preset;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod storage;

pub use adapters::{
    Collaborators, LayeredCatalog, NotificationSink, PersistenceSink, PositionProvider,
    PresetCatalog, VisualSink,
};
pub use engine::{AppliedEffect, Engine, EngineSettings, TickReport};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use events::{Decision, Effect, Notice};
pub use geofence::{GeofenceGuard, GeofencePolicy};
pub use position::{Position, SubjectId, Velocity};
pub use preset::{Preset, PresetField};
pub use registry::SessionRegistry;
pub use scheduler::{EngineHandle, TickScheduler, TICK_INTERVAL};
pub use session::{Phase, Session, SessionView, VisualKind};
pub use storage::{Config, Database, FocusStats};
