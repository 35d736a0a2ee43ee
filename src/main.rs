//! # Layout Doctor
//!
//! A headless player for the layout puzzles. Reads one action per line
//! from stdin, or from a script file, and prints what happened.
//!
//! ## Quick Start
//!
//! ```bash
//! # Play interactively
//! cargo run
//!
//! # Replay a script on a simulated clock
//! cargo run -- --script solve.txt
//!
//! # Start on a later level of a custom pack
//! cargo run -- --levels my-levels.toml --level 2
//! ```

mod script;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doctor_core::{
    preview, Clock, Config, CoreError, EventHandler, LevelPack, ManualClock, Point, PointerId, PointerTarget, Session,
    SessionEvent,
};
use doctor_document::Selection;
use script::{Action, HELP};

/// Layout Doctor - fix the page, watch it reflow
#[derive(Parser, Debug)]
#[command(name = "layout-doctor")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Level pack in TOML (defaults to the built-in cases)
    #[arg(short, long, value_name = "FILE")]
    levels: Option<PathBuf>,

    /// Level index to start on
    #[arg(long, value_name = "N")]
    level: Option<usize>,

    /// Run actions from a file on a simulated clock
    #[arg(short, long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting Layout Doctor v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => Config::load_from(path).with_context(|| format!("reading config {}", path.display()))?,
        None => Config::load(),
    };
    if let Some(level) = args.level {
        config.session.start_level = level;
    }

    let levels = match &args.levels {
        Some(path) => LevelPack::load_from(path).with_context(|| format!("reading levels {}", path.display()))?,
        None => LevelPack::builtin(),
    };

    match &args.script {
        Some(path) => {
            let source = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading script {}", path.display()))?;
            let clock = ManualClock::new();
            let session = Session::with_clock(config, levels, Arc::new(clock.clone()))?;
            Player::new(session, Some(clock)).run_script(&source).await
        }
        None => Player::new(Session::new(config, levels)?, None).run_interactive().await,
    }
}

/// Drives a session and prints its events.
struct Player {
    session: Session,
    /// Present when time is simulated
    clock: Option<ManualClock>,
    events: EventHandler,
    next_pointer: u64,
}

impl Player {
    fn new(session: Session, clock: Option<ManualClock>) -> Self {
        let events = EventHandler::new(session.subscribe());
        let player = Self {
            session,
            clock,
            events,
            next_pointer: 1,
        };
        player.print_level();
        player
    }

    async fn run_script(mut self, source: &str) -> anyhow::Result<()> {
        for (number, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            println!("> {line}");
            let action: Action = line
                .parse()
                .with_context(|| format!("line {}: {}", number + 1, line))?;
            if !self.perform(action).await? {
                break;
            }
        }
        Ok(())
    }

    async fn run_interactive(mut self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let deadline = self.session.next_deadline();
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match line.parse::<Action>() {
                        Ok(action) => {
                            if !self.perform(action).await? {
                                break;
                            }
                        }
                        Err(err) => println!("! {err}"),
                    }
                }
                _ = sleep_until(deadline) => {
                    self.session.tick()?;
                    self.flush_events();
                }
            }
        }
        self.session.exit();
        Ok(())
    }

    /// Runs one action. Returns false once the session is over.
    async fn perform(&mut self, action: Action) -> anyhow::Result<bool> {
        match self.apply(action).await {
            Ok(()) => {}
            // Already reported through the event stream
            Err(CoreError::Command(_)) => {}
            Err(
                err @ (CoreError::NotActive
                | CoreError::ObjectNotFound(_)
                | CoreError::DragInProgress(_)
                | CoreError::UnknownLevel(_)),
            ) => println!("! {err}"),
            Err(err) => return Err(err.into()),
        }
        self.session.measure();
        Ok(self.flush_events())
    }

    async fn apply(&mut self, action: Action) -> Result<(), CoreError> {
        match action {
            Action::Command(command) => self.session.dispatch(&command)?,
            Action::Select(start, end) => self.session.set_selection(Some(Selection::new(start, end))),
            Action::Cursor(offset) => self.session.set_selection(Some(Selection::cursor(offset))),
            Action::SelectAll => self.session.select_all(),
            Action::Type(text) => self.session.type_text(&text)?,
            Action::Key(key) => {
                self.session.handle_key(key)?;
            }
            Action::Click(id) => self.session.select_object(&id)?,
            Action::ClickPage => {
                let pointer = self.pointer();
                self.session.pointer_down(pointer, PointerTarget::Background, Point::default())?;
                self.session.pointer_up(pointer, Point::default());
            }
            Action::Drag { id, dx, dy } => {
                let pointer = self.pointer();
                let end = Point::new(dx, dy);
                self.session.pointer_down(pointer, PointerTarget::Object(id), Point::default())?;
                self.session.pointer_move(pointer, end);
                self.session.pointer_up(pointer, end);
            }
            Action::Wait(duration) => self.wait(duration).await?,
            Action::Continue => self.session.continue_now()?,
            Action::Restart => self.session.restart_level()?,
            Action::Level(index) => self.session.jump_to_level(index)?,
            Action::Show => {
                self.session.measure();
                println!("{}", preview(self.session.document(), &self.session.render()));
            }
            Action::Snapshot => println!("{}", self.session.snapshot_json()?),
            Action::Levels => {
                for (index, level) in self.session.levels().levels.iter().enumerate() {
                    let marker = if index == self.session.level_index() { "*" } else { " " };
                    println!("{marker} {index}: {} ({})", level.title, level.id);
                }
            }
            Action::Keys => {
                for (key, command) in self.session.keymap().bindings() {
                    println!("{key:<14} {}", command.display_name());
                }
            }
            Action::Help => println!("{HELP}"),
            Action::Exit => self.session.exit(),
        }
        Ok(())
    }

    /// Lets time pass, firing every timer that falls due on the way.
    async fn wait(&mut self, duration: Duration) -> Result<(), CoreError> {
        let Some(clock) = &self.clock else {
            tokio::time::sleep(duration).await;
            return self.session.tick();
        };
        let target = clock.now() + duration;
        while let Some(deadline) = self.session.next_deadline().filter(|d| *d <= target) {
            clock.advance(deadline.saturating_duration_since(clock.now()));
            self.session.tick()?;
        }
        clock.advance(target.saturating_duration_since(clock.now()));
        Ok(())
    }

    fn pointer(&mut self) -> PointerId {
        self.next_pointer += 1;
        PointerId(self.next_pointer)
    }

    /// Prints queued events. Returns false once the session is over.
    fn flush_events(&mut self) -> bool {
        let mut running = true;
        for event in self.events.drain() {
            match event {
                SessionEvent::LevelLoaded { .. } => self.print_level(),
                SessionEvent::Changed => {}
                SessionEvent::UserError(message) => println!("! {message}"),
                SessionEvent::Succeeded { index } => println!("Level {index} solved!"),
                SessionEvent::CountdownTick(remaining) => println!("Next case in {remaining}..."),
                SessionEvent::Advanced { index } => tracing::debug!("Advanced to level {}", index),
                SessionEvent::Completed { score } => {
                    println!("All cases solved. Score: {score}");
                    running = false;
                }
                SessionEvent::Exited => running = false,
            }
        }
        running
    }

    fn print_level(&self) {
        let Some(level) = self.session.level() else {
            return;
        };
        let story = &level.narrative;
        println!("== Case {}: {} ==", self.session.level_index() + 1, level.title);
        if !story.complaint.is_empty() {
            println!("{}: \"{}\"", story.sender, story.complaint);
        }
        if !story.instruction.is_empty() {
            println!("Task: {}", story.instruction);
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
