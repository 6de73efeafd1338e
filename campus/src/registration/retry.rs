//! Retry-on-busy submission.
//!
//! DESIGN
//! ======
//! The server answers concurrent registration writes with a rejection whose
//! message contains a busy marker. Only that outcome is retried; every other
//! failure (validation, network, plain rejection) returns on the first
//! attempt. Attempts are spaced with a linear backoff of
//! `base_delay * attempt` and nothing waits after the final attempt.
//!
//! ERROR HANDLING
//! ==============
//! When every attempt came back busy the last server message is returned
//! inside `ClientError::Busy` together with the attempt count.

#[cfg(test)]
#[path = "retry_test.rs"]
mod retry_test;

use std::future::Future;

use crate::config::RetryPolicy;
use crate::error::ClientError;

/// Server message carried by a busy rejection, if `err` is one.
fn busy_message<'a>(policy: &RetryPolicy, err: &'a ClientError) -> Option<&'a str> {
    match err {
        ClientError::Rejected { message, .. } if policy.is_busy_message(message) => Some(message),
        ClientError::Busy { message, .. } => Some(message),
        _ => None,
    }
}

/// Run `op` until it succeeds, fails with a non-busy error, or the policy's
/// attempt budget is spent.
///
/// # Errors
///
/// Returns the first non-busy error unchanged, or `ClientError::Busy` when
/// all `policy.max_attempts` attempts were rejected as busy.
pub async fn submit_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let err = match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "submission succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let Some(message) = busy_message(policy, &err) else {
            return Err(err);
        };

        if attempt >= max_attempts {
            tracing::warn!(attempts = attempt, message, "server still busy; giving up");
            return Err(ClientError::Busy { attempts: attempt, message: message.to_owned() });
        }

        let delay = policy.delay_after(attempt);
        tracing::warn!(attempt, max_attempts, delay_ms = delay.as_millis(), "server busy; retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
