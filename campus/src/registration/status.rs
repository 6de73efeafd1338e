//! Event registration status snapshot.
//!
//! Built from the status endpoint reply with explicit defaults. The client
//! never computes capacity itself; it only interprets what the server sent.

#[cfg(test)]
#[path = "status_test.rs"]
mod status_test;

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::net::types::StatusResponse;

/// The user's registration status, meaningful only when registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationState {
    Registered,
    Waitlist,
}

impl RegistrationState {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "registered" => Some(Self::Registered),
            "waitlist" => Some(Self::Waitlist),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Waitlist => "waitlist",
        }
    }
}

/// Server-reported registration snapshot for one event and the current user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationStatus {
    /// Capacity ceiling; `None` means unlimited.
    pub max_participants: Option<i64>,
    /// Remaining capacity; only meaningful when `max_participants` is set.
    pub spots_left: i64,
    pub is_registered: bool,
    /// Only meaningful when `is_registered`.
    pub status: Option<RegistrationState>,
    pub waitlist_position: Option<u32>,
    pub event_start_date: Option<OffsetDateTime>,
    pub registration_open: bool,
    /// Whether a full event still accepts waitlist sign-ups.
    pub waitlist_open: bool,
}

impl Default for RegistrationStatus {
    fn default() -> Self {
        Self {
            max_participants: None,
            spots_left: 0,
            is_registered: false,
            status: None,
            waitlist_position: None,
            event_start_date: None,
            registration_open: true,
            waitlist_open: false,
        }
    }
}

impl RegistrationStatus {
    /// Interpret a status endpoint reply.
    ///
    /// Missing `registration_open` means open; an unparseable start date is
    /// dropped with a warning rather than failing the whole refresh. A start
    /// date without an offset is taken as UTC.
    #[must_use]
    pub fn from_response(resp: &StatusResponse) -> Self {
        let event_start_date = resp.event_start_date.as_deref().and_then(|raw| {
            parse_start_date(raw)
                .map_err(|e| tracing::warn!(error = %e, raw, "unparseable event_start_date; ignoring"))
                .ok()
        });

        let user = &resp.user_status;
        let status = if user.is_registered {
            user.status.as_deref().and_then(RegistrationState::parse)
        } else {
            None
        };

        Self {
            max_participants: resp.total_spots,
            spots_left: resp.spots_left.unwrap_or(0).max(0),
            is_registered: user.is_registered,
            status,
            waitlist_position: user.waitlist_position,
            event_start_date,
            registration_open: resp.registration_open.unwrap_or(true),
            waitlist_open: resp.is_waitlist_open.unwrap_or(false),
        }
    }

    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        self.max_participants.is_none()
    }

    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.is_unlimited() || self.spots_left > 0
    }

    #[must_use]
    pub fn has_started(&self, now: OffsetDateTime) -> bool {
        self.event_start_date.is_some_and(|start| start < now)
    }
}

/// RFC 3339, or a naive ISO 8601 datetime (no offset) read as UTC.
fn parse_start_date(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(raw, &Rfc3339).or_else(|rfc_err| {
        PrimitiveDateTime::parse(
            raw,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"),
        )
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|_| rfc_err)
    })
}
