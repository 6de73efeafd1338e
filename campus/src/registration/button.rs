//! Registration button state machine.
//!
//! DESIGN
//! ======
//! States are checked in a fixed priority order and the first match wins, so
//! every snapshot lands in exactly one state (a past event that is also full
//! is `Past`). Each state maps to a static descriptor; the view renders the
//! descriptor wholesale, which keeps rendering idempotent.

#[cfg(test)]
#[path = "button_test.rs"]
mod button_test;

use time::OffsetDateTime;

use super::status::{RegistrationState, RegistrationStatus};

/// Mutually exclusive button states, listed in priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ButtonState {
    Past,
    Closed,
    Registered,
    Waitlist,
    Available,
    Full,
}

impl ButtonState {
    pub const ALL: [Self; 6] = [Self::Past, Self::Closed, Self::Registered, Self::Waitlist, Self::Available, Self::Full];

    /// Select the state for `status` at time `now`.
    #[must_use]
    pub fn select(status: &RegistrationStatus, now: OffsetDateTime) -> Self {
        if status.has_started(now) {
            Self::Past
        } else if !status.registration_open {
            Self::Closed
        } else if status.is_registered && status.status == Some(RegistrationState::Registered) {
            Self::Registered
        } else if status.is_registered {
            Self::Waitlist
        } else if status.has_capacity() {
            Self::Available
        } else {
            Self::Full
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Past => "past",
            Self::Closed => "closed",
            Self::Registered => "registered",
            Self::Waitlist => "waitlist",
            Self::Available => "available",
            Self::Full => "full",
        }
    }
}

/// Everything a view needs to draw the registration button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonDescriptor {
    pub state: ButtonState,
    /// Bootstrap button style class.
    pub class: &'static str,
    /// Font Awesome icon class.
    pub icon: &'static str,
    pub label: &'static str,
    pub opens_modal: bool,
    pub disabled: bool,
}

impl ButtonDescriptor {
    /// Static descriptor for `state`.
    ///
    /// `Full` is the only state whose affordance depends on the snapshot: it
    /// offers a waitlist sign-up when the server says the waitlist is open and
    /// is disabled otherwise.
    #[must_use]
    pub fn for_state(state: ButtonState, waitlist_open: bool) -> Self {
        let (class, icon, label, opens_modal, disabled) = match state {
            ButtonState::Past => ("btn-secondary", "fa-calendar-times", "Event Ended", false, true),
            ButtonState::Closed => ("btn-secondary", "fa-lock", "Registration Closed", false, true),
            ButtonState::Registered => ("btn-danger", "fa-times", "Cancel Registration", true, false),
            ButtonState::Waitlist => ("btn-danger", "fa-clock", "On Waiting List", true, false),
            ButtonState::Available => ("btn-success", "fa-user-plus", "Register for Event", true, false),
            ButtonState::Full if waitlist_open => ("btn-warning", "fa-user-plus", "Join Waiting List", true, false),
            ButtonState::Full => ("btn-warning", "fa-ban", "Event Full", false, true),
        };
        Self { state, class, icon, label, opens_modal, disabled }
    }

    /// Select the state and build its descriptor in one step.
    #[must_use]
    pub fn for_status(status: &RegistrationStatus, now: OffsetDateTime) -> Self {
        Self::for_state(ButtonState::select(status, now), status.waitlist_open)
    }

    /// Inner markup in the `<i class="fas ..."></i> Label` form the templates use.
    #[must_use]
    pub fn inner_html(&self) -> String {
        format!("<i class=\"fas {}\"></i> {}", self.icon, self.label)
    }
}
