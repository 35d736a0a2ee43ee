//! Session orchestration.
//!
//! ## Learning: The Facade Pattern
//!
//! `Session` is the only thing a front-end talks to. It owns the
//! simulator state, the document surface and the floating objects, and
//! routes every input through the dispatcher, the floating controller
//! or the text surface.
//!
//! ## Phases
//!
//! ```text
//! Loading(i) ──► Active ──► Success{remaining} ──► Loading(i + 1) ...
//!                                     │
//!                                     └── last level ──► Complete
//! ```

use doctor_document::{Document, Selection};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

use crate::command::Command;
use crate::config::Config;
use crate::dispatch::{DispatchInput, FloatingRequest, Outcome, StyleDispatcher};
use crate::evaluator::{GoalContext, SuccessEvaluator};
use crate::event::{EventBus, SessionEvent};
use crate::floating::{FloatingController, FloatingObject, Point, PointerId};
use crate::geometry::PageGeometry;
use crate::keymap::{Key, KeyAction, KeyPress, Keymap};
use crate::level::{LevelConfig, LevelPack};
use crate::state::{SimulatorState, TAB_LAYOUT};
use crate::surface::{estimate_height, DocumentSurface, PageStack};
use crate::timer::{Clock, Countdown, SystemClock};
use crate::{CoreError, CoreResult};

/// Where the session is in its level sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Loading(usize),
    Active,
    /// Goal met; seconds left before advancing
    Success { remaining: u8 },
    /// Every level solved
    Complete,
    Exited,
}

/// Callbacks for the surrounding application.
pub trait SessionObserver {
    /// The last level was solved.
    fn on_level_complete(&mut self, _final_score: u32) {}

    /// The player asked to leave.
    fn on_exit(&mut self) {}

    /// Called on every advance with the new level index.
    fn on_progress_update(&mut self, _level_index: usize) {}
}

/// What a pointer went down on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    Object(String),
    /// The page or the text surface
    Background,
}

/// Serializable view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub level_index: usize,
    pub level_id: String,
    pub phase: Phase,
    pub state: SimulatorState,
    pub content: String,
    pub objects: Vec<FloatingObject>,
    pub selected_object: Option<String>,
    pub selection: Option<(usize, usize)>,
    pub page_count: usize,
    pub score: u32,
}

/// A play-through of a level pack.
pub struct Session {
    config: Config,
    levels: LevelPack,
    index: usize,
    phase: Phase,
    state: SimulatorState,
    surface: DocumentSurface,
    floating: FloatingController,
    selection: Option<Selection>,
    dispatcher: StyleDispatcher,
    keymap: Keymap,
    evaluator: SuccessEvaluator,
    countdown: Countdown,
    clock: Arc<dyn Clock>,
    events: EventBus,
    observer: Option<Box<dyn SessionObserver>>,
    score: u32,
}

impl Session {
    /// Starts a session on the wall clock.
    pub fn new(config: Config, levels: LevelPack) -> CoreResult<Self> {
        Self::with_clock(config, levels, Arc::new(SystemClock))
    }

    /// Starts a session at `config.session.start_level` with an injected clock.
    pub fn with_clock(mut config: Config, levels: LevelPack, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        if levels.is_empty() {
            return Err(CoreError::NoLevels);
        }
        config.validate()?;
        let start = config.session.start_level;
        let mut session = Self {
            state: SimulatorState::new(&config.zoom),
            floating: FloatingController::new(config.floating),
            dispatcher: StyleDispatcher::new(config.zoom),
            keymap: Keymap::from_config(&config),
            evaluator: SuccessEvaluator::new(config.session.debounce()),
            countdown: Countdown::default(),
            surface: DocumentSurface::new(),
            selection: None,
            index: start,
            phase: Phase::Loading(start),
            events: EventBus::new(),
            observer: None,
            score: 0,
            clock,
            config,
            levels,
        };
        session.load(start)?;
        Ok(session)
    }

    pub fn set_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // ==================== Accessors ====================

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn level_index(&self) -> usize {
        self.index
    }

    pub fn level(&self) -> Option<&LevelConfig> {
        self.levels.get(self.index)
    }

    pub fn levels(&self) -> &LevelPack {
        &self.levels
    }

    pub fn state(&self) -> &SimulatorState {
        &self.state
    }

    pub fn document(&self) -> &Document {
        self.surface.document()
    }

    pub fn content(&self) -> String {
        self.surface.content()
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn floating(&self) -> &FloatingController {
        &self.floating
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn has_succeeded(&self) -> bool {
        self.evaluator.has_succeeded()
    }

    // ==================== Level Sequencing ====================

    /// Loads a level, resetting everything that belongs to the previous one.
    pub fn load(&mut self, index: usize) -> CoreResult<()> {
        let level = self.levels.get(index).ok_or(CoreError::UnknownLevel(index))?;
        let mut surface = DocumentSurface::new();
        surface.set_content(&level.initial_content)?;
        let images = level.initial_images.clone();
        let id = level.id.clone();

        self.phase = Phase::Loading(index);
        self.evaluator.reset();
        self.countdown.cancel();
        self.index = index;
        self.state = SimulatorState::new(&self.config.zoom);
        self.surface = surface;
        self.floating.load(images);
        self.selection = None;
        self.phase = Phase::Active;

        tracing::info!("Loaded level {} ({})", index, id);
        self.events.emit(SessionEvent::LevelLoaded { index, id });
        Ok(())
    }

    pub fn restart_level(&mut self) -> CoreResult<()> {
        self.load(self.index)
    }

    pub fn jump_to_level(&mut self, index: usize) -> CoreResult<()> {
        self.load(index)?;
        if let Some(observer) = self.observer.as_mut() {
            observer.on_progress_update(index);
        }
        Ok(())
    }

    /// Moves to the next level, or completes the session after the last.
    pub fn advance(&mut self) -> CoreResult<()> {
        if matches!(self.phase, Phase::Complete | Phase::Exited) {
            return Ok(());
        }
        self.countdown.cancel();
        let next = self.index + 1;
        if next < self.levels.len() {
            self.load(next)?;
            self.events.emit(SessionEvent::Advanced { index: next });
            if let Some(observer) = self.observer.as_mut() {
                observer.on_progress_update(next);
            }
            return Ok(());
        }

        self.evaluator.reset();
        self.phase = Phase::Complete;
        tracing::info!("Session complete with score {}", self.score);
        self.events.emit(SessionEvent::Completed { score: self.score });
        if let Some(observer) = self.observer.as_mut() {
            observer.on_level_complete(self.score);
        }
        Ok(())
    }

    /// Skips the rest of the success countdown.
    pub fn continue_now(&mut self) -> CoreResult<()> {
        if matches!(self.phase, Phase::Success { .. }) {
            self.advance()?;
        }
        Ok(())
    }

    /// Leaves the session. Pending timers are dropped.
    pub fn exit(&mut self) {
        if self.phase == Phase::Exited {
            return;
        }
        self.evaluator.reset();
        self.countdown.cancel();
        self.phase = Phase::Exited;
        self.events.emit(SessionEvent::Exited);
        if let Some(observer) = self.observer.as_mut() {
            observer.on_exit();
        }
    }

    // ==================== Timers ====================

    /// Runs whatever timers are due.
    pub fn tick(&mut self) -> CoreResult<()> {
        let now = self.clock.now();
        match self.phase {
            Phase::Active => {
                let Some(level) = self.levels.get(self.index) else {
                    return Ok(());
                };
                let ctx = GoalContext {
                    document: self.surface.document(),
                    objects: self.floating.objects(),
                    state: &self.state,
                };
                if self.evaluator.poll(now, &level.goal, &ctx) {
                    self.succeed(now)?;
                }
            }
            Phase::Success { .. } => {
                for remaining in self.countdown.advance(now) {
                    self.phase = Phase::Success { remaining };
                    self.events.emit(SessionEvent::CountdownTick(remaining));
                }
                if !self.countdown.is_running() {
                    self.advance()?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// The next instant at which `tick` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Active => self.evaluator.deadline(),
            Phase::Success { .. } => self.countdown.next_deadline(),
            _ => None,
        }
    }

    fn succeed(&mut self, now: Instant) -> CoreResult<()> {
        let seconds = self.config.session.countdown_secs;
        self.score += self.config.session.points_per_level;
        self.phase = Phase::Success { remaining: seconds };
        tracing::info!("Level {} solved", self.index);
        self.events.emit(SessionEvent::Succeeded { index: self.index });
        self.countdown.start(now, seconds);
        if seconds == 0 {
            self.advance()?;
        }
        Ok(())
    }

    fn changed(&mut self, affects_success: bool) {
        self.events.emit(SessionEvent::Changed);
        if affects_success && self.phase == Phase::Active {
            self.evaluator.schedule(self.clock.now());
        }
    }

    fn ensure_active(&self) -> CoreResult<()> {
        if self.phase == Phase::Active {
            Ok(())
        } else {
            Err(CoreError::NotActive)
        }
    }

    // ==================== Commands ====================

    /// Runs a toolbar command.
    ///
    /// User errors are emitted as [`SessionEvent::UserError`] and returned;
    /// nothing is changed in that case.
    pub fn dispatch(&mut self, command: &Command) -> CoreResult<()> {
        self.ensure_active()?;
        let input = DispatchInput {
            document: self.surface.document(),
            selection: self.selection,
            state: &self.state,
            selected_object: self.floating.selected(),
        };
        let outcome = match self.dispatcher.dispatch(command, input) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!("{} rejected: {}", command, err);
                self.events.emit(SessionEvent::UserError(err.to_string()));
                return Err(err.into());
            }
        };
        if self.apply(outcome)? {
            tracing::debug!("Applied {}", command);
            self.changed(command.affects_success());
        }
        Ok(())
    }

    fn apply(&mut self, outcome: Outcome) -> CoreResult<bool> {
        match outcome {
            Outcome::Document {
                document,
                selection,
            } => {
                self.surface.replace_document(document);
                self.selection = selection;
            }
            Outcome::State(state) => {
                if state == self.state {
                    return Ok(false);
                }
                self.state = state;
            }
            Outcome::Floating(FloatingRequest::Insert { kind, source }) => {
                self.floating.insert(kind, source);
                self.state.active_tab = TAB_LAYOUT.to_string();
            }
            Outcome::Floating(FloatingRequest::Delete { id }) => {
                self.floating.delete(&id)?;
            }
            Outcome::Floating(FloatingRequest::SetWrap { id, mode }) => {
                self.floating.set_wrap_mode(&id, mode)?;
            }
            Outcome::Unchanged => return Ok(false),
        }
        Ok(true)
    }

    // ==================== Text ====================

    /// Moves the text selection. `None` means focus left the surface.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection.map(|s| s.clamp(self.surface.document().len()));
    }

    pub fn select_all(&mut self) {
        self.selection = Some(Selection::new(0, self.surface.document().len()));
    }

    /// Types text at the selection, replacing selected text.
    pub fn type_text(&mut self, text: &str) -> CoreResult<()> {
        self.ensure_active()?;
        let Some(selection) = self.selection else {
            return Ok(());
        };
        if !selection.is_cursor() {
            self.surface.delete(selection)?;
        }
        self.surface.insert_text(selection.start, text)?;
        self.selection = Some(Selection::cursor(selection.start + text.chars().count()));
        self.changed(true);
        Ok(())
    }

    /// Backspace in the text surface.
    pub fn delete_backward(&mut self) -> CoreResult<()> {
        self.delete_text(true)
    }

    /// Delete in the text surface.
    pub fn delete_forward(&mut self) -> CoreResult<()> {
        self.delete_text(false)
    }

    fn delete_text(&mut self, backward: bool) -> CoreResult<()> {
        self.ensure_active()?;
        let Some(selection) = self.selection else {
            return Ok(());
        };
        let len = self.surface.document().len();
        let target = match (selection.is_cursor(), backward) {
            (false, _) => selection,
            (true, true) if selection.start > 0 => Selection::new(selection.start - 1, selection.start),
            (true, false) if selection.start < len => Selection::new(selection.start, selection.start + 1),
            _ => return Ok(()),
        };
        self.surface.delete(target)?;
        self.selection = Some(Selection::cursor(target.start));
        self.changed(true);
        Ok(())
    }

    // ==================== Keyboard ====================

    /// Handles a key press: shortcuts, object deletion, then text.
    pub fn handle_key(&mut self, key: KeyPress) -> CoreResult<KeyAction> {
        let action = self.keymap.process(key, self.floating.selected().is_some());
        match &action {
            KeyAction::Command(command) => self.dispatch(command)?,
            KeyAction::DeleteObject => {
                self.ensure_active()?;
                if let Some(removed) = self.floating.handle_delete_key() {
                    tracing::debug!("Deleted {} from keyboard", removed.id);
                    self.changed(true);
                }
            }
            KeyAction::PassThrough if key.modifiers.is_empty() || (key.modifiers.shift && !key.modifiers.ctrl) => {
                match key.key {
                    Key::Backspace => self.delete_backward()?,
                    Key::Delete => self.delete_forward()?,
                    Key::Char(c) => self.type_text(&c.to_string())?,
                    Key::Escape => self.floating.deselect(),
                    Key::Enter => {}
                }
            }
            KeyAction::PassThrough => {}
        }
        Ok(action)
    }

    // ==================== Pointer ====================

    /// Pointer press. Pressing an object selects it and starts a drag.
    pub fn pointer_down(&mut self, pointer: PointerId, target: PointerTarget, at: Point) -> CoreResult<()> {
        self.ensure_active()?;
        match target {
            PointerTarget::Object(id) => {
                self.floating.begin_drag(&id, pointer, at)?;
                self.state.active_tab = TAB_LAYOUT.to_string();
            }
            PointerTarget::Background => self.floating.deselect(),
        }
        self.changed(false);
        Ok(())
    }

    /// Pointer motion; only the transient drag offset changes.
    pub fn pointer_move(&mut self, pointer: PointerId, at: Point) {
        self.floating.update_drag(pointer, at, self.state.zoom);
    }

    /// Pointer release. Outside the active phase the drag is dropped unapplied.
    pub fn pointer_up(&mut self, pointer: PointerId, at: Point) {
        if self.phase != Phase::Active {
            self.floating.cancel_drag(pointer);
            return;
        }
        if self.floating.commit_drag(pointer, at, self.state.zoom).is_some() {
            self.changed(true);
        }
    }

    pub fn pointer_cancel(&mut self, pointer: PointerId) {
        self.floating.cancel_drag(pointer);
    }

    /// Selects an object without dragging it.
    pub fn select_object(&mut self, id: &str) -> CoreResult<()> {
        self.ensure_active()?;
        self.floating.select(id)?;
        self.state.active_tab = TAB_LAYOUT.to_string();
        self.changed(false);
        Ok(())
    }

    // ==================== Rendering ====================

    pub fn report_rendered_height(&mut self, height: f64) {
        self.surface.report_rendered_height(height);
    }

    /// Measures the content with [`estimate_height`] and reports it.
    pub fn measure(&mut self) {
        let padding = self.geometry().padding;
        let height = estimate_height(self.surface.document(), &padding, self.config.page.width);
        self.surface.report_rendered_height(height);
    }

    pub fn geometry(&self) -> PageGeometry {
        PageGeometry::compute(
            &self.config.page,
            &self.config.margins,
            self.state.margins,
            self.floating.objects(),
            self.surface.rendered_height(),
        )
    }

    pub fn render(&self) -> PageStack {
        self.surface
            .render(&self.state, &self.floating, &self.config.page, &self.config.margins)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            level_index: self.index,
            level_id: self.level().map(|l| l.id.clone()).unwrap_or_default(),
            phase: self.phase,
            state: self.state.clone(),
            content: self.surface.content(),
            objects: self.floating.objects().to_vec(),
            selected_object: self.floating.selected().map(str::to_string),
            selection: self.selection.map(|s| (s.start, s.end)),
            page_count: self.geometry().page_count,
            score: self.score,
        }
    }

    pub fn snapshot_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }
}
