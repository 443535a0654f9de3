//! Fixed-interval polling until a condition holds.
//!
//! ```text
//! Idle -> Attempting -> Success
//!              |
//!              +-> WaitingInterval -> Attempting
//!              +-> Exhausted (PollError::Timeout)
//! ```
//!
//! A `watch` channel can be supplied as a cancellation signal. It is checked before each
//! attempt and raced against both the in-flight attempt and the interval sleep.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{ParseError, PollError};
use crate::fields::lookup_path;

/// Intervals below this are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// `None` polls until the condition holds or the poll is cancelled.
    pub max_attempts: Option<u32>,
    pub cancel: Option<watch::Receiver<bool>>,
}

impl PollOptions {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            cancel: None,
        }
    }

    /// At least one attempt is always made.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    /// Stops polling once the channel carries `true`.
    pub fn cancel_on(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_POLL_INTERVAL)
    }
}

/// Calls `poller` with 1-based attempt numbers until `condition` accepts a result.
///
/// Errors from `poller` are returned unchanged and end the poll. Exhausting
/// `max_attempts` yields [`PollError::Timeout`]; a cancellation signal yields
/// [`PollError::Cancelled`]. No last-seen value is returned on either.
pub async fn poll_until<T, E, F, Fut, C>(
    mut poller: F,
    mut condition: C,
    options: PollOptions,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(&T) -> bool,
    E: From<PollError>,
{
    let interval = options.effective_interval();
    let max_attempts = options.max_attempts;
    let mut cancel = options.cancel;
    let mut attempt = 0;

    loop {
        if cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Err(PollError::Cancelled { attempts: attempt }.into());
        }

        attempt += 1;
        debug!(attempt, "Poll attempt");
        let value = match cancel.as_mut() {
            Some(rx) => tokio::select! {
                result = poller(attempt) => result?,
                _ = cancelled(rx) => return Err(PollError::Cancelled { attempts: attempt }.into()),
            },
            None => poller(attempt).await?,
        };

        if condition(&value) {
            info!(attempt, "Poll condition met");
            return Ok(value);
        }
        if max_attempts.is_some_and(|max| attempt >= max) {
            warn!(attempt, "Poll attempts exhausted");
            return Err(PollError::Timeout { attempts: attempt }.into());
        }

        match cancel.as_mut() {
            Some(rx) => tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancelled(rx) => return Err(PollError::Cancelled { attempts: attempt }.into()),
            },
            None => tokio::time::sleep(interval).await,
        }
    }
}

/// Resolves once the flag turns `true`. A dropped sender can no longer cancel.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// A `path=value` predicate over JSON, e.g. `status=arrived` or `ports.pod.ata=null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UntilCondition {
    path: String,
    expected: String,
}

impl UntilCondition {
    pub fn matches(&self, value: &Value) -> bool {
        match lookup_path(value, &self.path) {
            Some(Value::String(text)) => text == &self.expected,
            Some(other) => other.to_string() == self.expected,
            None => false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }
}

impl FromStr for UntilCondition {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, expected) = s
            .split_once('=')
            .ok_or_else(|| ParseError::InvalidCondition(s.into()))?;
        let path = path.trim();
        if path.is_empty() {
            return Err(ParseError::InvalidCondition(s.into()));
        }
        Ok(Self {
            path: path.to_string(),
            expected: expected.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Poll(PollError),
        Upstream(&'static str),
    }

    impl From<PollError> for TestError {
        fn from(err: PollError) -> Self {
            TestError::Poll(err)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempt_budget() {
        let calls = Cell::new(0);
        let start = Instant::now();
        let out: Result<u32, TestError> = poll_until(
            |attempt| {
                calls.set(calls.get() + 1);
                async move { Ok(attempt) }
            },
            |_| false,
            PollOptions::new(Duration::from_millis(250)).max_attempts(2),
        )
        .await;
        assert_eq!(out, Err(TestError::Poll(PollError::Timeout { attempts: 2 })));
        assert_eq!(calls.get(), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_success_does_not_wait() {
        let start = Instant::now();
        let out: Result<&str, TestError> = poll_until(
            |_| async { Ok("arrived") },
            |status| *status == "arrived",
            PollOptions::new(Duration::from_secs(30)),
        )
        .await;
        assert_eq!(out, Ok("arrived"));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn floors_short_intervals() {
        let start = Instant::now();
        let out: Result<u32, TestError> = poll_until(
            |attempt| async move { Ok(attempt) },
            |attempt| *attempt == 3,
            PollOptions::new(Duration::from_millis(10)),
        )
        .await;
        assert_eq!(out, Ok(3));
        assert_eq!(start.elapsed(), MIN_POLL_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_errors_pass_through() {
        let out: Result<u32, TestError> = poll_until(
            |attempt| async move {
                if attempt == 2 { Err(TestError::Upstream("503")) } else { Ok(attempt) }
            },
            |_| false,
            PollOptions::new(Duration::from_millis(250)),
        )
        .await;
        assert_eq!(out, Err(TestError::Upstream("503")));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_wait() {
        let (tx, rx) = watch::channel(false);
        let calls = Cell::new(0);
        let cancel = async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            tx.send(true).unwrap();
        };
        let poll = poll_until::<u32, TestError, _, _, _>(
            |attempt| {
                calls.set(calls.get() + 1);
                async move { Ok(attempt) }
            },
            |_| false,
            PollOptions::new(Duration::from_secs(2)).cancel_on(rx),
        );
        let ((), out) = tokio::join!(cancel, poll);
        assert_eq!(out, Err(TestError::Poll(PollError::Cancelled { attempts: 2 })));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn already_cancelled_makes_no_attempt() {
        let (_tx, rx) = watch::channel(true);
        let out: Result<u32, TestError> = poll_until(
            |_| async { Ok(1) },
            |_| true,
            PollOptions::new(Duration::from_secs(1)).cancel_on(rx),
        )
        .await;
        assert_eq!(out, Err(TestError::Poll(PollError::Cancelled { attempts: 0 })));
    }

    #[test]
    fn until_condition_matches_paths() {
        let cond: UntilCondition = "status = arrived".parse().unwrap();
        assert!(cond.matches(&json!({ "status": "arrived" })));
        assert!(!cond.matches(&json!({ "status": "in_transit" })));
        assert!(!cond.matches(&json!({})));

        let flag: UntilCondition = "container.availableForPickup=true".parse().unwrap();
        assert!(flag.matches(&json!({ "container": { "availableForPickup": true } })));

        assert!("no-equals".parse::<UntilCondition>().is_err());
        assert!("=x".parse::<UntilCondition>().is_err());
    }
}
