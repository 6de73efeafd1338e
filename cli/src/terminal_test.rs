use super::*;
use campus::registration::ButtonState;

fn render(f: impl FnOnce(&mut TerminalView<Vec<u8>>)) -> String {
    let mut view = TerminalView::new(Vec::new(), "http://campus.test/", true);
    f(&mut view);
    String::from_utf8(view.into_inner()).unwrap()
}

#[test]
fn button_line_marks_disabled_states() {
    let out = render(|v| v.render_button(&ButtonDescriptor::for_state(ButtonState::Full, false)));
    assert_eq!(out, "[full] Event Full (disabled)\n");

    let out = render(|v| v.render_button(&ButtonDescriptor::for_state(ButtonState::Available, false)));
    assert_eq!(out, "[available] Register for Event\n");
}

#[test]
fn waitlist_panel_shows_position() {
    let out = render(|v| {
        v.render_status_panel(Some(StatusPanel::Waitlisted { position: Some(2) }));
        v.render_status_panel(None);
    });
    assert_eq!(out, "You're on the waiting list (Position: 2)\n");
}

#[test]
fn alerts_and_field_errors() {
    let out = render(|v| {
        v.show_alert(AlertKind::Danger, "Event is full");
        v.mark_field_invalid("email", "Enter a valid email.");
    });
    assert_eq!(out, "error: Event is full\n  email: Enter a valid email.\n");
}

#[test]
fn relative_navigation_is_resolved_against_base_url() {
    let out = render(|v| {
        v.navigate("/events/event/7/");
        v.navigate("https://elsewhere.test/");
    });
    assert_eq!(out, "-> http://campus.test/events/event/7/\n-> https://elsewhere.test/\n");
}

#[tokio::test]
async fn assume_yes_confirms_without_prompting() {
    let mut view = TerminalView::new(Vec::new(), "http://campus.test", true);
    assert!(view.confirm("Delete?").await);
    assert!(view.into_inner().is_empty());
}
