//! Level success evaluation.
//!
//! [`Goal::is_met`] is a pure predicate. [`SuccessEvaluator`] wraps it in
//! the debounce and the one-shot success transition:
//!
//! ```text
//! change ──► schedule(now) ──► ... 500 ms quiet ... ──► check ──► Succeeded (once)
//!               ▲    │
//!               └────┘ every change restarts the wait
//! ```

use doctor_document::{BlockKind, Document};
use std::time::{Duration, Instant};

use crate::floating::FloatingObject;
use crate::level::Goal;
use crate::state::{PageNumberPosition, SimulatorState};
use crate::timer::Debounce;

// ==================== Goals ====================

/// Everything a goal can look at.
#[derive(Debug, Clone, Copy)]
pub struct GoalContext<'a> {
    pub document: &'a Document,
    pub objects: &'a [FloatingObject],
    pub state: &'a SimulatorState,
}

impl Goal {
    pub fn is_met(&self, ctx: &GoalContext<'_>) -> bool {
        match self {
            Goal::ImageReflow { image_id, min_x } => ctx
                .objects
                .iter()
                .find(|o| &o.id == image_id)
                .is_some_and(|o| o.wrap.reflows_text() && o.position.x > *min_x),
            Goal::HeadingCount { min } => ctx.document.count_blocks(BlockKind::Heading1) >= *min,
            Goal::TableOfContents => ctx.document.contains_block(BlockKind::TableOfContents),
            Goal::Margins { value } => ctx.state.margins == *value,
            Goal::PageNumber {
                vertical,
                horizontal,
            } => ctx.state.page_numbers == Some(PageNumberPosition::new(*vertical, *horizontal)),
            Goal::Final {
                title_phrase,
                heading_word,
            } => {
                ctx.state.page_numbers_active()
                    && ctx.document.contains_phrase(title_phrase)
                    && ctx.document.has_block_with_word(BlockKind::Heading1, heading_word)
            }
        }
    }
}

// ==================== Debounced Check ====================

/// Debounced success checking with a one-time transition.
#[derive(Debug, Clone)]
pub struct SuccessEvaluator {
    debounce: Debounce,
    succeeded: bool,
}

impl SuccessEvaluator {
    pub fn new(delay: Duration) -> Self {
        Self {
            debounce: Debounce::new(delay),
            succeeded: false,
        }
    }

    /// A relevant change happened; restart the quiet period.
    pub fn schedule(&mut self, now: Instant) {
        if !self.succeeded {
            self.debounce.schedule(now);
        }
    }

    /// Drops any pending check and re-arms the transition for a new level.
    pub fn reset(&mut self) {
        self.debounce.cancel();
        self.succeeded = false;
    }

    pub fn has_succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Runs the check if the debounce expired. Returns true only on the
    /// transition into success.
    pub fn poll(&mut self, now: Instant, goal: &Goal, ctx: &GoalContext<'_>) -> bool {
        if !self.debounce.fire(now) {
            return false;
        }
        self.record(goal.is_met(ctx))
    }

    /// Feeds a check result. Only the first `true` counts.
    pub fn record(&mut self, met: bool) -> bool {
        if met && !self.succeeded {
            self.succeeded = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::floating::{ObjectKind, Point, Size, WrapMode};
    use crate::state::{HorizontalPosition, Margins, VerticalPosition};
    use crate::timer::{Clock, ManualClock};

    fn check(goal: &Goal, document: &Document, objects: &[FloatingObject], state: &SimulatorState) -> bool {
        goal.is_met(&GoalContext {
            document,
            objects,
            state,
        })
    }

    #[test]
    fn test_image_reflow_goal() {
        let goal = Goal::ImageReflow {
            image_id: "img".to_string(),
            min_x: 250.0,
        };
        let document = Document::new();
        let state = SimulatorState::default();
        let mut image = FloatingObject {
            id: "img".to_string(),
            kind: ObjectKind::Image,
            source: String::new(),
            position: Point::new(300.0, 100.0),
            size: Size::new(200.0, 150.0),
            wrap: WrapMode::Front,
        };
        assert!(!check(&goal, &document, std::slice::from_ref(&image), &state));
        image.wrap = WrapMode::Tight;
        assert!(check(&goal, &document, std::slice::from_ref(&image), &state));
        image.position.x = 250.0;
        assert!(!check(&goal, &document, std::slice::from_ref(&image), &state));
        assert!(!check(&goal, &document, &[], &state));
    }

    #[test]
    fn test_heading_goal_counts_structure() {
        let goal = Goal::HeadingCount { min: 3 };
        let state = SimulatorState::default();
        let styled = Document::from_markup("<p><strong>A</strong></p><h1>B</h1><h1>C</h1>").unwrap();
        assert!(!check(&goal, &styled, &[], &state));
        let headings = Document::from_markup("<h1><em>A</em></h1><h1>B</h1><h1>C</h1>").unwrap();
        assert!(check(&goal, &headings, &[], &state));
    }

    #[test]
    fn test_page_number_goal_is_exact() {
        let goal = Goal::PageNumber {
            vertical: VerticalPosition::Bottom,
            horizontal: HorizontalPosition::Center,
        };
        let document = Document::new();
        let mut state = SimulatorState::default();
        assert!(!check(&goal, &document, &[], &state));
        state.page_numbers = Some(PageNumberPosition::new(VerticalPosition::Top, HorizontalPosition::Center));
        assert!(!check(&goal, &document, &[], &state));
        state.page_numbers = Some(PageNumberPosition::new(VerticalPosition::Bottom, HorizontalPosition::Center));
        assert!(check(&goal, &document, &[], &state));
    }

    #[test]
    fn test_final_goal() {
        let goal = Goal::Final {
            title_phrase: "space travel report".to_string(),
            heading_word: "summary".to_string(),
        };
        let mut state = SimulatorState::default();
        let document =
            Document::from_markup("<p class=\"title\">Space  <b>Travel</b> Report</p><h1>Short summary</h1>").unwrap();
        assert!(!check(&goal, &document, &[], &state));
        state.page_numbers = Some(PageNumberPosition::new(VerticalPosition::Top, HorizontalPosition::Left));
        assert!(check(&goal, &document, &[], &state));

        let no_heading = Document::from_markup("<p>Space Travel Report</p><p>Summary</p>").unwrap();
        assert!(!check(&goal, &no_heading, &[], &state));
    }

    #[test]
    fn test_margins_goal() {
        let goal = Goal::Margins { value: Margins::Narrow };
        let document = Document::new();
        let mut state = SimulatorState::default();
        assert!(!check(&goal, &document, &[], &state));
        state.margins = Margins::Narrow;
        assert!(check(&goal, &document, &[], &state));
    }

    #[test]
    fn test_success_fires_once_until_reset() {
        let clock = ManualClock::new();
        let goal = Goal::TableOfContents;
        let document = Document::from_markup("<nav class=\"toc\"><p>A .......... 1</p></nav>").unwrap();
        let state = SimulatorState::default();
        let ctx = GoalContext {
            document: &document,
            objects: &[],
            state: &state,
        };
        let mut evaluator = SuccessEvaluator::new(Duration::from_millis(500));

        evaluator.schedule(clock.now());
        assert!(!evaluator.poll(clock.now(), &goal, &ctx));
        clock.advance(Duration::from_millis(500));
        assert!(evaluator.poll(clock.now(), &goal, &ctx));

        for _ in 0..3 {
            evaluator.schedule(clock.now());
            clock.advance(Duration::from_millis(500));
            assert!(!evaluator.poll(clock.now(), &goal, &ctx));
        }

        evaluator.reset();
        evaluator.schedule(clock.now());
        clock.advance(Duration::from_millis(500));
        assert!(evaluator.poll(clock.now(), &goal, &ctx));
    }
}
