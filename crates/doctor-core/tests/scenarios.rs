//! End-to-end level scenarios driven through the public session API.

use doctor_core::{
    Command, CommandError, Config, CoreError, HorizontalPosition, LevelPack, ManualClock, Margins,
    Phase, Point, PointerId, PointerTarget, Session, VerticalPosition, WrapMode,
};
use doctor_document::Selection;
use std::sync::Arc;
use std::time::Duration;

const DEBOUNCE: Duration = Duration::from_millis(500);

fn start_at(level: usize) -> (Session, ManualClock) {
    let clock = ManualClock::new();
    let mut config = Config::default();
    config.session.start_level = level;
    let session = Session::with_clock(config, LevelPack::builtin(), Arc::new(clock.clone())).unwrap();
    (session, clock)
}

/// Lets the debounce run out and processes timers.
fn settle(session: &mut Session, clock: &ManualClock) {
    clock.advance(DEBOUNCE);
    session.tick().unwrap();
}

fn succeeded(session: &Session) -> bool {
    matches!(session.phase(), Phase::Success { .. })
}

/// Puts the cursor inside the block whose text is `text`.
fn click_into(session: &mut Session, text: &str) {
    let document = session.document();
    let span = document
        .spans()
        .into_iter()
        .find(|s| document.text_of(s.block) == text)
        .unwrap_or_else(|| panic!("no block with text {text:?}"));
    session.set_selection(Some(Selection::cursor(span.start + 1)));
}

fn drag(session: &mut Session, id: &str, from: Point, to: Point) {
    session
        .pointer_down(PointerId(1), PointerTarget::Object(id.to_string()), from)
        .unwrap();
    session.pointer_move(PointerId(1), to);
    session.pointer_up(PointerId(1), to);
}

#[test]
fn image_reflow_needs_square_wrap_and_position() {
    let (mut session, clock) = start_at(0);
    let image = session.floating().get("img-bakery").unwrap().clone();
    assert_eq!(image.position.x, 60.0);
    assert_eq!(image.wrap, WrapMode::Front);

    drag(&mut session, "img-bakery", Point::new(100.0, 150.0), Point::new(340.0, 150.0));
    assert_eq!(session.floating().get("img-bakery").unwrap().position.x, 300.0);
    settle(&mut session, &clock);
    assert!(!succeeded(&session), "front wrap must not pass");

    session.dispatch(&Command::SetWrapMode(WrapMode::Square)).unwrap();
    settle(&mut session, &clock);
    assert!(succeeded(&session));

    // The image sits right of centre, so the right padding grows
    let padding = session.geometry().padding;
    assert_eq!(padding.right, 794.0 - 300.0 + 10.0);
}

#[test]
fn drag_distance_is_independent_of_zoom() {
    let (mut session, _clock) = start_at(0);
    for _ in 0..10 {
        session.dispatch(&Command::ZoomIn).unwrap_or(());
    }
    assert_eq!(session.state().zoom, 200);

    drag(&mut session, "img-bakery", Point::new(0.0, 0.0), Point::new(100.0, 40.0));
    let position = session.floating().get("img-bakery").unwrap().position;
    assert_eq!((position.x, position.y), (110.0, 140.0));
}

#[test]
fn three_headings_pass_after_debounce() {
    let (mut session, clock) = start_at(1);

    for text in ["Introduction", "Method"] {
        click_into(&mut session, text);
        session.dispatch(&Command::Heading { level: 1 }).unwrap();
    }
    settle(&mut session, &clock);
    assert!(!succeeded(&session));

    click_into(&mut session, "Conclusion");
    session.dispatch(&Command::Heading { level: 1 }).unwrap();
    session.tick().unwrap();
    assert!(!succeeded(&session), "must wait for the quiet period");
    settle(&mut session, &clock);
    assert!(succeeded(&session));
}

#[test]
fn converting_a_heading_again_does_not_duplicate_it() {
    let (mut session, _clock) = start_at(1);
    click_into(&mut session, "Method");
    session.dispatch(&Command::Heading { level: 1 }).unwrap();
    session.dispatch(&Command::Heading { level: 1 }).unwrap();
    let document = session.document();
    assert_eq!(document.count_blocks(doctor_document::BlockKind::Heading1), 1);
    assert_eq!(document.top_level_blocks().len(), 6);
}

#[test]
fn typed_spacing_survives_heading_conversion() {
    let (mut session, _clock) = start_at(1);
    let end = session.document().spans()[0].end;
    session.set_selection(Some(Selection::cursor(end)));
    session.type_text("  two").unwrap();

    session.dispatch(&Command::Heading { level: 1 }).unwrap();
    let document = session.document();
    let heading = document.top_level_blocks()[0];
    assert_eq!(document.block_kind(heading), Some(doctor_document::BlockKind::Heading1));
    assert_eq!(document.text_of(heading), "Introduction  two");
}

#[test]
fn toc_without_headings_leaves_content_untouched() {
    let (mut session, _clock) = start_at(1);
    click_into(&mut session, "Method");
    let before = session.content();

    let err = session.dispatch(&Command::TableOfContents).unwrap_err();
    assert!(matches!(err, CoreError::Command(CommandError::NoHeadings)));
    assert_eq!(session.content(), before);
}

#[test]
fn toc_level_passes_once_inserted() {
    let (mut session, clock) = start_at(2);
    click_into(&mut session, "Volcanoes");
    session.dispatch(&Command::TableOfContents).unwrap();
    assert!(session.content().contains("<nav class=\"toc\">"));
    assert!(session.content().contains("Famous eruptions .......... 2"));
    settle(&mut session, &clock);
    assert!(succeeded(&session));
}

#[test]
fn margins_level_needs_narrow() {
    let (mut session, clock) = start_at(3);
    session.dispatch(&Command::SetMargins(Margins::Wide)).unwrap();
    settle(&mut session, &clock);
    assert!(!succeeded(&session));
    assert_eq!(session.geometry().padding.left, 80.0);

    session.dispatch(&Command::SetMargins(Margins::Narrow)).unwrap();
    settle(&mut session, &clock);
    assert!(succeeded(&session));
}

fn place_page_numbers(session: &mut Session, vertical: VerticalPosition, horizontal: HorizontalPosition) {
    session.dispatch(&Command::PageNumber).unwrap();
    session.dispatch(&Command::ChoosePageNumberVertical(vertical)).unwrap();
    session.dispatch(&Command::ChoosePageNumberHorizontal(horizontal)).unwrap();
    session.dispatch(&Command::ConfirmPageNumber).unwrap();
}

#[test]
fn page_number_position_must_be_bottom_center() {
    let (mut session, clock) = start_at(4);

    place_page_numbers(&mut session, VerticalPosition::Top, HorizontalPosition::Center);
    settle(&mut session, &clock);
    assert!(!succeeded(&session));
    let marker = session.render().pages[0].page_number.clone().unwrap();
    assert_eq!(marker.text, "- 1 -");

    place_page_numbers(&mut session, VerticalPosition::Bottom, HorizontalPosition::Center);
    settle(&mut session, &clock);
    assert!(succeeded(&session));
}

#[test]
fn incomplete_page_number_choice_is_rejected() {
    let (mut session, _clock) = start_at(4);
    session.dispatch(&Command::PageNumber).unwrap();
    session
        .dispatch(&Command::ChoosePageNumberVertical(VerticalPosition::Bottom))
        .unwrap();
    let err = session.dispatch(&Command::ConfirmPageNumber).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Command(CommandError::IncompletePageNumberPosition { .. })
    ));
    assert!(!session.state().page_numbers_active());
}

#[test]
fn final_level_completes_the_session() {
    let (mut session, clock) = start_at(5);
    click_into(&mut session, "Summary");
    session.dispatch(&Command::Heading { level: 1 }).unwrap();
    place_page_numbers(&mut session, VerticalPosition::Bottom, HorizontalPosition::Right);
    settle(&mut session, &clock);
    assert!(succeeded(&session));

    clock.advance(Duration::from_secs(3));
    session.tick().unwrap();
    assert_eq!(session.phase(), Phase::Complete);
    assert_eq!(session.score(), 100);
}

#[test]
fn success_fires_once_and_rearms_after_level_change() {
    let (mut session, clock) = start_at(3);
    let mut events = session.subscribe();

    session.dispatch(&Command::SetMargins(Margins::Narrow)).unwrap();
    settle(&mut session, &clock);
    settle(&mut session, &clock);
    assert_eq!(session.score(), 100);
    assert!(matches!(
        session.dispatch(&Command::SetMargins(Margins::Normal)),
        Err(CoreError::NotActive)
    ));

    session.continue_now().unwrap();
    assert_eq!(session.level_index(), 4);
    place_page_numbers(&mut session, VerticalPosition::Bottom, HorizontalPosition::Center);
    settle(&mut session, &clock);
    assert!(succeeded(&session));
    assert_eq!(session.score(), 200);

    let mut successes = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, doctor_core::SessionEvent::Succeeded { .. }) {
            successes += 1;
        }
    }
    assert_eq!(successes, 2);
}
