//! Bounded exponential-backoff retry for calls that can fail with a transient overload.
//!
//! The invoker knows nothing about the wrapped call: the caller supplies the operation,
//! a predicate saying which errors are transient, and a hook for retry notices.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

pub const MAX_ATTEMPTS: u32 = 3;
pub const INITIAL_DELAY: Duration = Duration::from_millis(1000);
pub const BACKOFF_FACTOR: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_delay: INITIAL_DELAY,
            backoff_factor: BACKOFF_FACTOR,
        }
    }
}

/// Labels used in retry notices and in the exhausted-retries error.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    /// What the call is about, e.g. the resume's file name.
    pub subject: &'a str,
    /// What the call does, e.g. "Spam Detection".
    pub operation: &'a str,
}

/// Emitted before each backoff sleep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryNotice {
    pub subject: String,
    pub operation: String,
    /// Attempts made so far (all failed).
    pub attempt: u32,
    pub max_attempts: u32,
    pub next_delay: Duration,
}

impl fmt::Display for RetryNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Attempt {} of {} failed. Retrying in {}s...",
            self.attempt,
            self.max_attempts,
            self.next_delay.as_secs_f64()
        )
    }
}

#[derive(Debug)]
pub enum RetryError<E> {
    /// A non-transient failure, returned as-is on the attempt it happened.
    Fatal(E),
    /// Every attempt failed transiently. Carries the last error.
    Exhausted {
        subject: String,
        operation: String,
        attempts: u32,
        last: E,
    },
}

impl<E> RetryError<E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// The underlying error of the final attempt.
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Fatal(e) => e.fmt(f),
            RetryError::Exhausted {
                subject,
                operation,
                attempts,
                ..
            } => write!(
                f,
                "Failed {operation} for {subject} after {attempts} retries."
            ),
        }
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetryError::Fatal(e) => e.source(),
            RetryError::Exhausted { last, .. } => Some(last),
        }
    }
}

/// Runs `operation` until it succeeds, fails non-transiently, or runs out of attempts.
///
/// Between attempts the delay starts at `policy.initial_delay` and is multiplied by
/// `policy.backoff_factor` after every sleep. `on_retry` fires once per sleep, before it.
pub async fn invoke<T, E, Op, Fut, P, N>(
    policy: &RetryPolicy,
    ctx: CallContext<'_>,
    is_transient: P,
    mut on_retry: N,
    mut operation: Op,
) -> Result<T, RetryError<E>>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    N: FnMut(&RetryNotice),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_transient(&err) {
            return Err(RetryError::Fatal(err));
        }
        if attempt >= max_attempts {
            return Err(RetryError::Exhausted {
                subject: ctx.subject.to_string(),
                operation: ctx.operation.to_string(),
                attempts: attempt,
                last: err,
            });
        }

        let notice = RetryNotice {
            subject: ctx.subject.to_string(),
            operation: ctx.operation.to_string(),
            attempt,
            max_attempts,
            next_delay: delay,
        };
        warn!(
            subject = ctx.subject,
            operation = ctx.operation,
            "Service overloaded: {notice}"
        );
        on_retry(&notice);

        tokio::time::sleep(delay).await;
        delay *= policy.backoff_factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    const CTX: CallContext<'static> = CallContext {
        subject: "resume.txt",
        operation: "Parsing Resume",
    };

    fn overloaded() -> LlmError {
        LlmError::Api {
            status: 503,
            message: "503 Service Unavailable".to_string(),
        }
    }

    fn bad_request() -> LlmError {
        LlmError::Api {
            status: 400,
            message: "invalid document".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_after_backoff() {
        let calls = AtomicU32::new(0);
        let mut notices = Vec::new();
        let started = Instant::now();

        let result = invoke(
            &RetryPolicy::default(),
            CTX,
            LlmError::is_overloaded,
            |n| notices.push(n.clone()),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n <= 2 {
                        Err(overloaded())
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
        let delays: Vec<_> = notices.iter().map(|n| n.next_delay).collect();
        assert_eq!(
            delays,
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
        assert_eq!(notices[0].attempt, 1);
        assert_eq!(notices[1].attempt, 2);
        assert_eq!(
            notices[0].to_string(),
            "Attempt 1 of 3 failed. Retrying in 1s..."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_overloads_exhaust_without_fourth_attempt() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = invoke(
            &RetryPolicy::default(),
            CTX,
            LlmError::is_overloaded,
            |_| {},
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(overloaded()) }
            },
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        assert!(err.last_error().is_overloaded());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            err.to_string(),
            "Failed Parsing Resume for resume.txt after 3 retries."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let mut retried = false;
        let started = Instant::now();

        let result: Result<(), _> = invoke(
            &RetryPolicy::default(),
            CTX,
            LlmError::is_overloaded,
            |_| retried = true,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(bad_request()) }
            },
        )
        .await;

        match result {
            Err(RetryError::Fatal(LlmError::Api { status, .. })) => assert_eq!(status, 400),
            other => panic!("expected fatal error, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!retried);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt_makes_one_call() {
        let calls = AtomicU32::new(0);

        let result = invoke(
            &RetryPolicy::default(),
            CTX,
            LlmError::is_overloaded,
            |_| {},
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, LlmError>("parsed") }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "parsed");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
