//! Presentation seam for the registration controller.
//!
//! The controller never touches markup; it describes what to show and a view
//! implementation (browser bridge, terminal, test recorder) draws it.

use async_trait::async_trait;

use super::button::ButtonDescriptor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertKind {
    Success,
    Danger,
}

impl AlertKind {
    /// Bootstrap alert modifier (`alert-success`, `alert-danger`).
    #[must_use]
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Success => "alert-success",
            Self::Danger => "alert-danger",
        }
    }
}

/// Registration summary shown above the button for registered users.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusPanel {
    Registered,
    Waitlisted { position: Option<u32> },
}

impl StatusPanel {
    #[must_use]
    pub fn headline(self) -> String {
        match self {
            Self::Registered => "You're registered!".to_owned(),
            Self::Waitlisted { position: Some(position) } => {
                format!("You're on the waiting list (Position: {position})")
            }
            Self::Waitlisted { position: None } => "You're on the waiting list".to_owned(),
        }
    }
}

#[async_trait]
pub trait RegistrationView: Send {
    /// Replace the button's class, icon, label and enabled state.
    fn render_button(&mut self, button: &ButtonDescriptor);

    /// Show the registered/waitlisted panel, or remove it with `None`.
    fn render_status_panel(&mut self, panel: Option<StatusPanel>);

    fn show_alert(&mut self, kind: AlertKind, message: &str);

    /// Remove alerts and per-field validation markers.
    fn clear_alerts(&mut self);

    fn mark_field_invalid(&mut self, field: &str, message: &str);

    /// Disable (`true`) or re-enable (`false`) submit and cancel controls.
    fn set_controls_busy(&mut self, busy: bool);

    /// Ask the user to confirm a destructive action.
    async fn confirm(&mut self, prompt: &str) -> bool;

    fn open_modal(&mut self);

    fn hide_modal(&mut self);

    fn navigate(&mut self, url: &str);
}
