//! Registration status controller for one event page.
//!
//! DESIGN
//! ======
//! One controller per event page owns every piece of per-page state: the last
//! applied snapshot, a count of applied snapshots, and the injected config.
//! Operations take `&mut self`, so a poll can never race a submission on the
//! same controller and a stale poll can never overwrite a newer snapshot.
//!
//! ERROR HANDLING
//! ==============
//! Every failure is turned into a view notification (alert or field marker)
//! and also returned so callers can report it. A missing CSRF token is a
//! precondition failure: it is logged and the action aborts before the view
//! is touched or a request is sent.
//!
//! SYSTEM CONTEXT
//! ==============
//! `run_polling` re-fetches the status on a fixed interval until a shutdown
//! signal arrives. Submissions go through `submit_with_retry`, so a record
//! locked by a concurrent write is retried with linear backoff.

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::button::ButtonDescriptor;
use super::retry::submit_with_retry;
use super::status::{RegistrationState, RegistrationStatus};
use super::view::{AlertKind, RegistrationView, StatusPanel};
use crate::config::RegistrationConfig;
use crate::error::ClientError;
use crate::net::api::{ApiClient, EVENT_LIST_PAGE, event_page};
use crate::net::transport::Transport;
use crate::net::types::{ActionResponse, EventUpdateResponse};

/// Source of "now" for past-event detection.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

pub const CANCEL_CONFIRM_PROMPT: &str = "Are you sure you want to cancel your registration?";
pub const DELETE_EVENT_CONFIRM_PROMPT: &str = "Are you sure you want to delete this event?";

const REGISTER_SUCCESS_FALLBACK: &str = "Registration successful";
const REGISTER_VALIDATION_FALLBACK: &str = "Registration failed. Please check your details.";
const REGISTER_TRANSPORT_FAILURE: &str = "An unexpected error occurred. Please try again.";
const CANCEL_SUCCESS_FALLBACK: &str = "Registration cancelled successfully";
const CANCEL_FAILURE_FALLBACK: &str = "Failed to cancel registration";
const CANCEL_TRANSPORT_FAILURE: &str = "An error occurred while cancelling registration";
const DELETE_FAILURE_FALLBACK: &str = "Failed to delete event";
const UPDATE_FAILURE_FALLBACK: &str = "Failed to update event";

pub struct RegistrationController<T, V> {
    event_id: u64,
    api: ApiClient<T>,
    view: V,
    config: RegistrationConfig,
    clock: Clock,
    last_status: Option<RegistrationStatus>,
    status_seq: u64,
}

impl<T: Transport, V: RegistrationView> RegistrationController<T, V> {
    pub fn new(event_id: u64, api: ApiClient<T>, view: V, config: RegistrationConfig) -> Self {
        Self {
            event_id,
            api,
            view,
            config,
            clock: Arc::new(OffsetDateTime::now_utc),
            last_status: None,
            status_seq: 0,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn event_id(&self) -> u64 {
        self.event_id
    }

    #[must_use]
    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    #[must_use]
    pub fn last_status(&self) -> Option<&RegistrationStatus> {
        self.last_status.as_ref()
    }

    /// Number of status snapshots applied so far.
    #[must_use]
    pub fn status_seq(&self) -> u64 {
        self.status_seq
    }

    /// Descriptor for the last applied snapshot.
    #[must_use]
    pub fn current_button(&self) -> Option<ButtonDescriptor> {
        self.last_status
            .as_ref()
            .map(|status| ButtonDescriptor::for_status(status, (self.clock)()))
    }

    fn redirect_target(&self) -> String {
        self.config
            .redirect_url
            .clone()
            .unwrap_or_else(|| event_page(self.event_id))
    }

    fn require_csrf(&self, action: &'static str) -> Result<(), ClientError> {
        if self.api.has_csrf() {
            return Ok(());
        }
        tracing::error!(event_id = self.event_id, action, "CSRF token not found; aborting");
        Err(ClientError::MissingCsrfToken)
    }

    // =========================================================================
    // STATUS
    // =========================================================================

    /// Fetch the status snapshot and re-render button and status panel.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; the view keeps its previous rendering.
    pub async fn refresh_status(&mut self) -> Result<ButtonDescriptor, ClientError> {
        let response = match self.api.event_status(self.event_id).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(event_id = self.event_id, error = %e, "status fetch failed");
                return Err(e);
            }
        };

        let status = RegistrationStatus::from_response(&response);
        let button = ButtonDescriptor::for_status(&status, (self.clock)());
        self.view.render_button(&button);
        self.view.render_status_panel(status_panel(&status));

        self.last_status = Some(status);
        self.status_seq += 1;
        tracing::debug!(
            event_id = self.event_id,
            state = button.state.as_str(),
            seq = self.status_seq,
            "status applied"
        );
        Ok(button)
    }

    /// Poll the status endpoint until `shutdown` turns `true` or its sender
    /// is dropped. The first poll happens immediately.
    pub async fn run_polling(&mut self, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }

        let mut ticker = tokio::time::interval(self.config.poll_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures are already logged; the next tick retries.
                    let _ = self.refresh_status().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!(event_id = self.event_id, "status polling stopped");
                        break;
                    }
                }
            }
        }
    }

    /// Open the registration modal when the current button allows it.
    pub fn open_modal(&mut self) -> bool {
        match self.current_button() {
            Some(button) if button.opens_modal && !button.disabled => {
                self.view.open_modal();
                true
            }
            Some(_) => false,
            None => {
                tracing::warn!(event_id = self.event_id, "modal requested before status was loaded");
                false
            }
        }
    }

    // =========================================================================
    // REGISTER / CANCEL
    // =========================================================================

    /// Submit the registration form, retrying while the event is busy.
    ///
    /// On success the server message is shown, then after the redirect delay
    /// the modal is hidden and the view navigates away.
    ///
    /// # Errors
    ///
    /// Returns the final submission error after it has been shown.
    pub async fn submit_registration(&mut self, form: &[(String, String)]) -> Result<ActionResponse, ClientError> {
        self.require_csrf("register")?;
        self.view.clear_alerts();
        self.view.set_controls_busy(true);

        let api = &self.api;
        let event_id = self.event_id;
        let result = submit_with_retry(&self.config.retry, move || api.register(event_id, form)).await;

        self.view.set_controls_busy(false);

        match result {
            Ok(response) => {
                let message = response
                    .message
                    .clone()
                    .unwrap_or_else(|| REGISTER_SUCCESS_FALLBACK.to_owned());
                tracing::info!(
                    event_id,
                    status = response.status.as_deref().unwrap_or("registered"),
                    "registration submitted"
                );
                self.view.show_alert(AlertKind::Success, &message);
                self.finish_with_redirect(true).await;
                Ok(response)
            }
            Err(err) => {
                tracing::warn!(event_id, code = err.error_code(), error = %err, "registration failed");
                self.show_registration_error(&err);
                Err(err)
            }
        }
    }

    fn show_registration_error(&mut self, err: &ClientError) {
        match err {
            ClientError::Validation { fields } if fields.is_empty() => {
                self.view.show_alert(AlertKind::Danger, REGISTER_VALIDATION_FALLBACK);
            }
            ClientError::Validation { fields } => {
                for (field, messages) in fields {
                    self.view.mark_field_invalid(field, &messages.join(" "));
                }
            }
            ClientError::Network(_) | ClientError::Parse(_) | ClientError::HttpStatus { .. } => {
                self.view.show_alert(AlertKind::Danger, REGISTER_TRANSPORT_FAILURE);
            }
            other => {
                let message = other
                    .alert_message()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| REGISTER_VALIDATION_FALLBACK.to_owned());
                self.view.show_alert(AlertKind::Danger, &message);
            }
        }
    }

    /// Cancel the user's registration after confirmation.
    ///
    /// Returns `Ok(None)` when the user declines the confirmation.
    ///
    /// # Errors
    ///
    /// Returns the final cancellation error after it has been shown.
    pub async fn cancel_registration(&mut self) -> Result<Option<ActionResponse>, ClientError> {
        self.require_csrf("cancel")?;
        if !self.view.confirm(CANCEL_CONFIRM_PROMPT).await {
            tracing::debug!(event_id = self.event_id, "cancellation declined");
            return Ok(None);
        }

        self.view.clear_alerts();
        self.view.set_controls_busy(true);

        let api = &self.api;
        let event_id = self.event_id;
        let result = submit_with_retry(&self.config.retry, move || api.cancel(event_id)).await;

        self.view.set_controls_busy(false);

        match result {
            Ok(response) => {
                tracing::info!(
                    event_id,
                    waitlist_promoted = response.waitlist_promoted.unwrap_or(false),
                    "registration cancelled"
                );
                self.view.render_status_panel(None);
                // A stale button is acceptable here; the page navigates away next.
                let _ = self.refresh_status().await;
                let message = response
                    .message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| CANCEL_SUCCESS_FALLBACK.to_owned());
                self.view.show_alert(AlertKind::Success, &message);
                self.finish_with_redirect(false).await;
                Ok(Some(response))
            }
            Err(err) => {
                if let ClientError::Rejected { details: Some(details), .. } = &err {
                    tracing::warn!(event_id, details = %details, "cancellation error details");
                }
                tracing::warn!(event_id, code = err.error_code(), error = %err, "cancellation failed");
                let message = match &err {
                    ClientError::Network(_) | ClientError::Parse(_) | ClientError::HttpStatus { .. } => {
                        CANCEL_TRANSPORT_FAILURE.to_owned()
                    }
                    other => other
                        .alert_message()
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| CANCEL_FAILURE_FALLBACK.to_owned()),
                };
                self.view.show_alert(AlertKind::Danger, &message);
                Err(err)
            }
        }
    }

    async fn finish_with_redirect(&mut self, hide_modal: bool) {
        tokio::time::sleep(self.config.redirect_delay).await;
        if hide_modal {
            self.view.hide_modal();
        }
        let target = self.redirect_target();
        self.view.navigate(&target);
    }

    // =========================================================================
    // EVENT MANAGEMENT
    // =========================================================================

    /// Delete the event after confirmation, then return to the event list.
    ///
    /// Returns `Ok(false)` when the user declines.
    ///
    /// # Errors
    ///
    /// Returns the server or transport error after it has been shown.
    pub async fn delete_event(&mut self) -> Result<bool, ClientError> {
        self.require_csrf("delete_event")?;
        if !self.view.confirm(DELETE_EVENT_CONFIRM_PROMPT).await {
            return Ok(false);
        }

        match self.api.delete_event(self.event_id).await {
            Ok(message) => {
                tracing::info!(event_id = self.event_id, "event deleted");
                self.view.show_alert(AlertKind::Success, &message);
                tokio::time::sleep(self.config.redirect_delay).await;
                self.view.navigate(EVENT_LIST_PAGE);
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(event_id = self.event_id, error = %err, "event delete failed");
                let message = err
                    .alert_message()
                    .unwrap_or_else(|| DELETE_FAILURE_FALLBACK.to_owned());
                self.view.show_alert(AlertKind::Danger, &message);
                Err(err)
            }
        }
    }

    /// Apply a partial update to the event.
    ///
    /// # Errors
    ///
    /// Returns the server or transport error after it has been shown.
    pub async fn update_event(&mut self, form: &[(String, String)]) -> Result<EventUpdateResponse, ClientError> {
        self.require_csrf("update_event")?;
        self.view.clear_alerts();
        self.view.set_controls_busy(true);
        let result = self.api.update_event(self.event_id, form).await;
        self.view.set_controls_busy(false);

        match result {
            Ok(reply) => {
                let message = reply
                    .message
                    .clone()
                    .unwrap_or_else(|| "Event updated successfully".to_owned());
                tracing::info!(event_id = self.event_id, "event updated");
                self.view.show_alert(AlertKind::Success, &message);
                Ok(reply)
            }
            Err(err) => {
                if let ClientError::Rejected { details: Some(details), .. } = &err {
                    tracing::warn!(event_id = self.event_id, details = %details, "event update error details");
                }
                let message = err
                    .alert_message()
                    .unwrap_or_else(|| UPDATE_FAILURE_FALLBACK.to_owned());
                self.view.show_alert(AlertKind::Danger, &message);
                Err(err)
            }
        }
    }
}

/// Panel for a registered user; `None` hides it.
#[must_use]
pub fn status_panel(status: &RegistrationStatus) -> Option<StatusPanel> {
    if !status.is_registered {
        return None;
    }
    Some(match status.status {
        Some(RegistrationState::Waitlist) => StatusPanel::Waitlisted { position: status.waitlist_position },
        _ => StatusPanel::Registered,
    })
}
