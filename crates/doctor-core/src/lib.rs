//! # Doctor Core
//!
//! The layout simulator: geometry, floating objects, the document
//! surface, style commands, level goals and the session that ties them
//! together.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Session                           │
//! │  ┌────────────┐ ┌────────────┐ ┌───────────────────────┐ │
//! │  │ LevelPack  │ │   Config   │ │  SuccessEvaluator     │ │
//! │  └────────────┘ └────────────┘ └───────────────────────┘ │
//! │        │                                                  │
//! │  ┌─────┴─────────────┐  ┌────────────────────┐           │
//! │  │  StyleDispatcher  │  │ FloatingController │           │
//! │  └─────┬─────────────┘  └─────────┬──────────┘           │
//! │  ┌─────┴──────────────────────────┴──────────┐           │
//! │  │   DocumentSurface ──► PageGeometry        │           │
//! │  └───────────────────────────────────────────┘           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Learning: Stateless Transformers
//!
//! `StyleDispatcher` and the geometry functions read values and return
//! new ones. Only `Session` holds mutable state, so every change has
//! exactly one place where it is applied.

pub mod command;
pub mod config;
pub mod dispatch;
pub mod evaluator;
pub mod event;
pub mod floating;
pub mod geometry;
pub mod keymap;
pub mod level;
pub mod session;
pub mod state;
pub mod surface;
pub mod timer;

pub use command::{Command, CommandError};
pub use config::{Config, ConfigError};
pub use dispatch::{DispatchInput, FloatingRequest, Outcome, StyleDispatcher};
pub use evaluator::{GoalContext, SuccessEvaluator};
pub use event::{EventBus, EventHandler, SessionEvent};
pub use floating::{FloatingController, FloatingObject, ObjectKind, Point, PointerId, Size, WrapMode};
pub use geometry::{compute_padding, compute_page_count, Padding, PageGeometry};
pub use keymap::{Key, KeyAction, KeyPress, Keymap, Modifiers};
pub use level::{Goal, LevelConfig, LevelError, LevelPack, Narrative};
pub use session::{Phase, PointerTarget, Session, SessionObserver, SessionSnapshot};
pub use state::{HorizontalPosition, Margins, PageNumberPosition, SimulatorState, VerticalPosition};
pub use surface::{estimate_height, preview, DocumentSurface, PageStack};
pub use timer::{Clock, ManualClock, SystemClock};

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Document error: {0}")]
    Document(#[from] doctor_document::DocumentError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Level error: {0}")]
    Level(#[from] LevelError),

    #[error("Floating object not found: {0}")]
    ObjectNotFound(String),

    #[error("Object {0} is already being dragged")]
    DragInProgress(String),

    #[error("No level with index {0}")]
    UnknownLevel(usize),

    #[error("Level pack is empty")]
    NoLevels,

    #[error("The session is not accepting input right now")]
    NotActive,

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
