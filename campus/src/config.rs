//! Client configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Every knob the page scripts used to hard-code (retry count, backoff base,
//! poll interval, redirect delay) is a typed field with a `DEFAULT_*` constant.
//! Parsing goes through a lookup function so tests can supply values without
//! mutating the process environment.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_MS: u64 = 1000;
pub const DEFAULT_BUSY_MARKER: &str = "currently being processed";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_REDIRECT_DELAY_MS: u64 = 1500;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Bounded linear backoff for busy responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Wait before retry `n` is `base_delay * n`.
    pub base_delay: Duration,
    /// Substring of the server error that marks a transient lock.
    pub busy_marker: String,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
            busy_marker: DEFAULT_BUSY_MARKER.to_owned(),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt numbered `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    #[must_use]
    pub fn is_busy_message(&self, message: &str) -> bool {
        !self.busy_marker.is_empty() && message.contains(&self.busy_marker)
    }
}

/// Per-page settings for the registration controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationConfig {
    pub retry: RetryPolicy,
    pub poll_interval: Duration,
    pub redirect_delay: Duration,
    /// Where to navigate after a successful submit; defaults to the event page.
    pub redirect_url: Option<String>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            redirect_delay: Duration::from_millis(DEFAULT_REDIRECT_DELAY_MS),
            redirect_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub csrf_token: Option<String>,
    /// Raw `Cookie` header value carrying the server session.
    pub session_cookie: Option<String>,
    pub timeouts: HttpTimeouts,
    pub registration: RegistrationConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            csrf_token: None,
            session_cookie: None,
            timeouts: HttpTimeouts::default(),
            registration: RegistrationConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `CAMPUS_BASE_URL`: server origin, default `http://127.0.0.1:8000`
    /// - `CAMPUS_CSRF_TOKEN`: token echoed in `X-CSRFToken`
    /// - `CAMPUS_SESSION_COOKIE`: raw cookie header for the server session
    /// - `CAMPUS_RETRY_MAX_ATTEMPTS`: default 3
    /// - `CAMPUS_RETRY_BASE_MS`: default 1000
    /// - `CAMPUS_BUSY_MARKER`: default `currently being processed`
    /// - `CAMPUS_POLL_INTERVAL_SECS`: default 30
    /// - `CAMPUS_REDIRECT_DELAY_MS`: default 1500
    /// - `CAMPUS_REDIRECT_URL`: post-submit navigation target
    /// - `CAMPUS_REQUEST_TIMEOUT_SECS`: default 30
    /// - `CAMPUS_CONNECT_TIMEOUT_SECS`: default 10
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("CAMPUS_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();

        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "CAMPUS_RETRY_MAX_ATTEMPTS", DEFAULT_RETRY_MAX_ATTEMPTS).max(1),
            base_delay: Duration::from_millis(parse_or(&lookup, "CAMPUS_RETRY_BASE_MS", DEFAULT_RETRY_BASE_MS)),
            busy_marker: lookup("CAMPUS_BUSY_MARKER").unwrap_or_else(|| DEFAULT_BUSY_MARKER.to_owned()),
        };

        let registration = RegistrationConfig {
            retry,
            poll_interval: Duration::from_secs(
                parse_or(&lookup, "CAMPUS_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS).max(1),
            ),
            redirect_delay: Duration::from_millis(parse_or(&lookup, "CAMPUS_REDIRECT_DELAY_MS", DEFAULT_REDIRECT_DELAY_MS)),
            redirect_url: non_empty(lookup("CAMPUS_REDIRECT_URL")),
        };

        let timeouts = HttpTimeouts {
            request: Duration::from_secs(parse_or(&lookup, "CAMPUS_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)),
            connect: Duration::from_secs(parse_or(&lookup, "CAMPUS_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)),
        };

        Self {
            base_url,
            csrf_token: non_empty(lookup("CAMPUS_CSRF_TOKEN")),
            session_cookie: non_empty(lookup("CAMPUS_SESSION_COOKIE")),
            timeouts,
            registration,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
