use super::*;
use crate::registration::ButtonState;
use crate::test_helpers::{ScriptedTransport, busy_body, client_with_csrf, client_without_csrf};
use crate::net::transport::Method;
use time::macros::datetime;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ViewEvent {
    Button(ButtonState),
    Panel(Option<StatusPanel>),
    Alert(AlertKind, String),
    ClearAlerts,
    FieldInvalid(String, String),
    Busy(bool),
    Confirm(String),
    OpenModal,
    HideModal,
    Navigate(String),
}

#[derive(Default)]
struct RecordingView {
    events: Vec<ViewEvent>,
    decline_confirm: bool,
}

impl RecordingView {
    fn alerts(&self) -> Vec<(AlertKind, String)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Alert(kind, msg) => Some((*kind, msg.clone())),
                _ => None,
            })
            .collect()
    }

    fn navigations(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Navigate(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl RegistrationView for RecordingView {
    fn render_button(&mut self, button: &ButtonDescriptor) {
        self.events.push(ViewEvent::Button(button.state));
    }

    fn render_status_panel(&mut self, panel: Option<StatusPanel>) {
        self.events.push(ViewEvent::Panel(panel));
    }

    fn show_alert(&mut self, kind: AlertKind, message: &str) {
        self.events.push(ViewEvent::Alert(kind, message.to_owned()));
    }

    fn clear_alerts(&mut self) {
        self.events.push(ViewEvent::ClearAlerts);
    }

    fn mark_field_invalid(&mut self, field: &str, message: &str) {
        self.events
            .push(ViewEvent::FieldInvalid(field.to_owned(), message.to_owned()));
    }

    fn set_controls_busy(&mut self, busy: bool) {
        self.events.push(ViewEvent::Busy(busy));
    }

    async fn confirm(&mut self, prompt: &str) -> bool {
        self.events.push(ViewEvent::Confirm(prompt.to_owned()));
        !self.decline_confirm
    }

    fn open_modal(&mut self) {
        self.events.push(ViewEvent::OpenModal);
    }

    fn hide_modal(&mut self) {
        self.events.push(ViewEvent::HideModal);
    }

    fn navigate(&mut self, url: &str) {
        self.events.push(ViewEvent::Navigate(url.to_owned()));
    }
}

const EVENT_ID: u64 = 7;

fn fixed_clock() -> Clock {
    Arc::new(|| datetime!(2026-10-15 12:00 UTC))
}

fn controller(transport: &ScriptedTransport) -> RegistrationController<ScriptedTransport, RecordingView> {
    RegistrationController::new(EVENT_ID, client_with_csrf(transport), RecordingView::default(), RegistrationConfig::default())
        .with_clock(fixed_clock())
}

fn status_json(spots_left: i64, user_status: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "total_spots": 10,
        "spots_left": spots_left,
        "event_start_date": "2026-11-01T18:00:00Z",
        "registration_open": true,
        "user_status": user_status
    })
}

fn form() -> Vec<(String, String)> {
    vec![("email".to_owned(), "ada@example.com".to_owned())]
}

// =============================================================
// Status
// =============================================================

#[tokio::test]
async fn refresh_renders_full_event_as_disabled() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, status_json(0, serde_json::json!({ "is_registered": false })));
    let mut ctl = controller(&transport);

    let button = ctl.refresh_status().await.unwrap();

    assert_eq!(button.state, ButtonState::Full);
    assert!(button.disabled);
    assert_eq!(button.label, "Event Full");
    assert_eq!(ctl.status_seq(), 1);
    assert_eq!(ctl.view().events, vec![ViewEvent::Button(ButtonState::Full), ViewEvent::Panel(None)]);
    assert_eq!(transport.requests()[0].path, "/events/api/event/7/status/");
}

#[tokio::test]
async fn refresh_shows_waitlist_panel_with_position() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        200,
        status_json(0, serde_json::json!({ "is_registered": true, "status": "waitlist", "waitlist_position": 4 })),
    );
    let mut ctl = controller(&transport);

    ctl.refresh_status().await.unwrap();

    assert_eq!(
        ctl.view().events,
        vec![
            ViewEvent::Button(ButtonState::Waitlist),
            ViewEvent::Panel(Some(StatusPanel::Waitlisted { position: Some(4) })),
        ]
    );
}

#[tokio::test]
async fn refresh_treats_started_event_as_past() {
    let transport = ScriptedTransport::new();
    let mut json = status_json(5, serde_json::json!({ "is_registered": false }));
    json["event_start_date"] = serde_json::json!("2026-10-01T09:00:00Z");
    transport.push_json(200, json);
    let mut ctl = controller(&transport);

    let button = ctl.refresh_status().await.unwrap();
    assert_eq!(button.state, ButtonState::Past);
}

#[tokio::test]
async fn failed_refresh_keeps_previous_rendering() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, status_json(3, serde_json::json!({ "is_registered": false })));
    transport.push_network_error("connection reset");
    let mut ctl = controller(&transport);

    ctl.refresh_status().await.unwrap();
    let err = ctl.refresh_status().await.unwrap_err();

    assert!(matches!(err, ClientError::Network(_)));
    assert_eq!(ctl.status_seq(), 1);
    assert_eq!(ctl.view().events.len(), 2);
    assert_eq!(ctl.current_button().map(|b| b.state), Some(ButtonState::Available));
}

#[tokio::test]
async fn open_modal_follows_current_button() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, status_json(3, serde_json::json!({ "is_registered": false })));
    transport.push_json(200, status_json(0, serde_json::json!({ "is_registered": false })));
    let mut ctl = controller(&transport);

    assert!(!ctl.open_modal());

    ctl.refresh_status().await.unwrap();
    assert!(ctl.open_modal());
    assert_eq!(ctl.view().events.last(), Some(&ViewEvent::OpenModal));

    ctl.refresh_status().await.unwrap();
    assert!(!ctl.open_modal());
}

#[tokio::test(start_paused = true)]
async fn polling_refreshes_until_shutdown() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, status_json(3, serde_json::json!({ "is_registered": false })));
    transport.push_network_error("timeout");
    transport.push_json(200, status_json(0, serde_json::json!({ "is_registered": false })));
    let mut ctl = controller(&transport);

    let (tx, rx) = watch::channel(false);
    let stop = async move {
        tokio::time::sleep(Duration::from_secs(65)).await;
        tx.send(true).unwrap();
    };
    tokio::join!(ctl.run_polling(rx), stop);

    // Ticks at 0s, 30s and 60s; the middle one failed.
    assert_eq!(transport.request_count(), 3);
    assert_eq!(ctl.status_seq(), 2);
    assert_eq!(ctl.current_button().map(|b| b.state), Some(ButtonState::Full));
}

#[tokio::test]
async fn polling_does_not_start_after_shutdown() {
    let transport = ScriptedTransport::new();
    let mut ctl = controller(&transport);
    let (_tx, rx) = watch::channel(true);

    ctl.run_polling(rx).await;

    assert_eq!(transport.request_count(), 0);
}

// =============================================================
// Register
// =============================================================

#[tokio::test(start_paused = true)]
async fn successful_registration_alerts_then_redirects() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, serde_json::json!({ "success": true, "message": "You are registered", "status": "registered" }));
    let mut ctl = controller(&transport);

    let start = Instant::now();
    let response = ctl.submit_registration(&form()).await.unwrap();

    assert_eq!(response.status.as_deref(), Some("registered"));
    assert_eq!(start.elapsed(), Duration::from_millis(1500));
    assert_eq!(
        ctl.view().events,
        vec![
            ViewEvent::ClearAlerts,
            ViewEvent::Busy(true),
            ViewEvent::Busy(false),
            ViewEvent::Alert(AlertKind::Success, "You are registered".into()),
            ViewEvent::HideModal,
            ViewEvent::Navigate("/events/event/7/".into()),
        ]
    );

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.path, "/events/event/7/register/");
    assert_eq!(request.header_value("X-CSRFToken"), Some("test-token"));
}

#[tokio::test(start_paused = true)]
async fn configured_redirect_url_wins() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, serde_json::json!({ "success": true, "message": "ok" }));
    let config = RegistrationConfig { redirect_url: Some("/dashboard/".into()), ..RegistrationConfig::default() };
    let mut ctl = RegistrationController::new(EVENT_ID, client_with_csrf(&transport), RecordingView::default(), config);

    ctl.submit_registration(&form()).await.unwrap();

    assert_eq!(ctl.view().navigations(), vec!["/dashboard/".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn busy_registration_is_retried() {
    let transport = ScriptedTransport::new();
    transport.push_json(409, busy_body());
    transport.push_json(200, serde_json::json!({ "success": true, "message": "Added to waiting list", "status": "waitlist" }));
    let mut ctl = controller(&transport);

    ctl.submit_registration(&form()).await.unwrap();

    assert_eq!(transport.request_count(), 2);
    assert_eq!(ctl.view().alerts(), vec![(AlertKind::Success, "Added to waiting list".to_owned())]);
}

#[tokio::test]
async fn field_errors_mark_each_field() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        400,
        serde_json::json!({
            "success": false,
            "errors": { "email": ["This field is required.", "Enter a valid email."], "name": "Too long" }
        }),
    );
    let mut ctl = controller(&transport);

    let err = ctl.submit_registration(&form()).await.unwrap_err();

    assert!(matches!(err, ClientError::Validation { .. }));
    let view = ctl.view();
    assert!(view.events.contains(&ViewEvent::FieldInvalid(
        "email".into(),
        "This field is required. Enter a valid email.".into()
    )));
    assert!(view.events.contains(&ViewEvent::FieldInvalid("name".into(), "Too long".into())));
    assert!(view.alerts().is_empty());
    assert!(view.navigations().is_empty());
    assert_eq!(view.events.iter().filter(|e| **e == ViewEvent::Busy(false)).count(), 1);
}

#[tokio::test]
async fn empty_error_object_shows_generic_message() {
    let transport = ScriptedTransport::new();
    transport.push_json(400, serde_json::json!({ "success": false, "errors": {} }));
    let mut ctl = controller(&transport);

    ctl.submit_registration(&form()).await.unwrap_err();

    assert_eq!(
        ctl.view().alerts(),
        vec![(AlertKind::Danger, "Registration failed. Please check your details.".to_owned())]
    );
}

#[tokio::test]
async fn plain_rejection_shows_server_message() {
    let transport = ScriptedTransport::new();
    transport.push_json(400, serde_json::json!({ "success": false, "error": "Registration deadline has passed" }));
    let mut ctl = controller(&transport);

    ctl.submit_registration(&form()).await.unwrap_err();

    assert_eq!(ctl.view().alerts(), vec![(AlertKind::Danger, "Registration deadline has passed".to_owned())]);
}

#[tokio::test]
async fn network_failure_shows_unexpected_error() {
    let transport = ScriptedTransport::new();
    transport.push_network_error("connection refused");
    let mut ctl = controller(&transport);

    let err = ctl.submit_registration(&form()).await.unwrap_err();

    assert!(matches!(err, ClientError::Network(_)));
    assert_eq!(transport.request_count(), 1);
    assert_eq!(
        ctl.view().alerts(),
        vec![(AlertKind::Danger, "An unexpected error occurred. Please try again.".to_owned())]
    );
    assert_eq!(ctl.view().events.last(), Some(&ViewEvent::Alert(AlertKind::Danger, "An unexpected error occurred. Please try again.".into())));
}

#[tokio::test]
async fn missing_csrf_sends_nothing() {
    let transport = ScriptedTransport::new();
    let mut ctl =
        RegistrationController::new(EVENT_ID, client_without_csrf(&transport), RecordingView::default(), RegistrationConfig::default());

    let err = ctl.submit_registration(&form()).await.unwrap_err();
    assert!(matches!(err, ClientError::MissingCsrfToken));
    let err = ctl.cancel_registration().await.unwrap_err();
    assert!(matches!(err, ClientError::MissingCsrfToken));

    assert_eq!(transport.request_count(), 0);
    assert!(ctl.view().events.is_empty());
}

// =============================================================
// Cancel
// =============================================================

#[tokio::test(start_paused = true)]
async fn cancel_succeeds_after_two_busy_replies() {
    let transport = ScriptedTransport::new();
    transport.push_json(409, busy_body());
    transport.push_json(409, busy_body());
    transport.push_json(200, serde_json::json!({ "success": true, "message": "Registration cancelled successfully" }));
    transport.push_json(200, status_json(1, serde_json::json!({ "is_registered": false })));
    let mut ctl = controller(&transport);

    let start = Instant::now();
    let response = ctl.cancel_registration().await.unwrap();

    assert!(response.is_some());
    // 1s + 2s of backoff, then the redirect delay.
    assert_eq!(start.elapsed(), Duration::from_millis(4500));

    let paths: Vec<String> = transport.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(
        paths,
        vec![
            "/events/event/7/cancel/",
            "/events/event/7/cancel/",
            "/events/event/7/cancel/",
            "/events/api/event/7/status/",
        ]
    );

    let view = ctl.view();
    assert_eq!(view.events[0], ViewEvent::Confirm(CANCEL_CONFIRM_PROMPT.into()));
    assert_eq!(view.alerts(), vec![(AlertKind::Success, "Registration cancelled successfully".to_owned())]);
    assert!(view.events.contains(&ViewEvent::Panel(None)));
    assert!(view.events.contains(&ViewEvent::Button(ButtonState::Available)));
    assert_eq!(view.navigations(), vec!["/events/event/7/".to_owned()]);
}

#[tokio::test]
async fn declined_cancel_sends_nothing() {
    let transport = ScriptedTransport::new();
    let view = RecordingView { decline_confirm: true, ..RecordingView::default() };
    let mut ctl = RegistrationController::new(EVENT_ID, client_with_csrf(&transport), view, RegistrationConfig::default());

    let outcome = ctl.cancel_registration().await.unwrap();

    assert!(outcome.is_none());
    assert_eq!(transport.request_count(), 0);
    assert_eq!(ctl.view().events, vec![ViewEvent::Confirm(CANCEL_CONFIRM_PROMPT.into())]);
}

#[tokio::test(start_paused = true)]
async fn cancel_gives_up_when_always_busy() {
    let transport = ScriptedTransport::new();
    for _ in 0..3 {
        transport.push_json(409, busy_body());
    }
    let mut ctl = controller(&transport);

    let err = ctl.cancel_registration().await.unwrap_err();

    assert!(matches!(err, ClientError::Busy { attempts: 3, .. }));
    assert_eq!(transport.request_count(), 3);
    assert_eq!(
        ctl.view().alerts(),
        vec![(AlertKind::Danger, "Event is currently being processed. Please try again later.".to_owned())]
    );
    assert!(ctl.view().navigations().is_empty());
}

#[tokio::test]
async fn cancel_rejection_without_message_uses_fallback() {
    let transport = ScriptedTransport::new();
    transport.push_json(400, serde_json::json!({ "success": false }));
    let mut ctl = controller(&transport);

    ctl.cancel_registration().await.unwrap_err();

    assert_eq!(ctl.view().alerts(), vec![(AlertKind::Danger, "Failed to cancel registration".to_owned())]);
}

#[tokio::test]
async fn cancel_network_failure_message() {
    let transport = ScriptedTransport::new();
    transport.push_network_error("dns failure");
    let mut ctl = controller(&transport);

    ctl.cancel_registration().await.unwrap_err();

    assert_eq!(
        ctl.view().alerts(),
        vec![(AlertKind::Danger, "An error occurred while cancelling registration".to_owned())]
    );
}

// =============================================================
// Event management
// =============================================================

#[tokio::test(start_paused = true)]
async fn delete_event_returns_to_event_list() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, serde_json::json!({ "status": "success", "message": "Event deleted successfully" }));
    let mut ctl = controller(&transport);

    assert!(ctl.delete_event().await.unwrap());

    assert_eq!(transport.requests()[0].method, Method::Delete);
    assert_eq!(transport.requests()[0].path, "/events/7/delete/");
    assert_eq!(ctl.view().alerts(), vec![(AlertKind::Success, "Event deleted successfully".to_owned())]);
    assert_eq!(ctl.view().navigations(), vec!["/events/".to_owned()]);
}

#[tokio::test]
async fn update_event_failure_shows_server_error() {
    let transport = ScriptedTransport::new();
    transport.push_json(400, serde_json::json!({ "error": "Invalid date", "details": "end before start" }));
    let mut ctl = controller(&transport);

    let err = ctl
        .update_event(&[("title".to_owned(), "New title".to_owned())])
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Rejected { ref details, .. } if details.as_deref() == Some("end before start")));
    assert_eq!(ctl.view().alerts(), vec![(AlertKind::Danger, "Invalid date".to_owned())]);
    assert_eq!(transport.requests()[0].method, Method::Patch);
}

#[test]
fn status_panel_only_for_registered_users() {
    let mut status = RegistrationStatus { is_registered: false, ..RegistrationStatus::default() };
    assert_eq!(status_panel(&status), None);

    status.is_registered = true;
    status.status = Some(RegistrationState::Registered);
    assert_eq!(status_panel(&status), Some(StatusPanel::Registered));

    status.status = Some(RegistrationState::Waitlist);
    status.waitlist_position = Some(2);
    assert_eq!(status_panel(&status), Some(StatusPanel::Waitlisted { position: Some(2) }));
}
