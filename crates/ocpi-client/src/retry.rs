//! Bounded retransmission of a single logical request.
//!
//! One attempt plus `max_retries` retries. The loop continues only while
//! attempts remain and the last attempt's transport outcome is a reason for
//! retransmission. The last attempt is returned as-is.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::envelope::TransportOutcome;
use crate::error::OcpiResult;
use crate::transport::TransportResponse;

/// HTTP statuses treated as transient.
const RETRANSMISSION_STATUSES: &[u16] = &[408, 425, 429, 500, 502, 503, 504];

type DelayFn = dyn Fn(u32) -> Duration + Send + Sync;

/// Delay before retry `n` (1-based).
#[derive(Clone)]
pub struct RetryDelay(Arc<DelayFn>);

impl RetryDelay {
    /// Retry immediately.
    pub fn none() -> Self {
        Self(Arc::new(|_| Duration::ZERO))
    }

    pub fn fixed(delay: Duration) -> Self {
        Self(Arc::new(move |_| delay))
    }

    /// Full-jitter exponential backoff: random in `0..=min(base * 2^(n-1), cap)`.
    pub fn exponential(base: Duration, cap: Duration) -> Self {
        Self(Arc::new(move |retry| {
            let factor = 1u32 << retry.saturating_sub(1).min(16);
            let ceiling = base.saturating_mul(factor).min(cap);
            let jittered_ms = rand::thread_rng().gen_range(0..=ceiling.as_millis() as u64);
            Duration::from_millis(jittered_ms)
        }))
    }

    pub fn from_fn(f: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        (self.0)(retry)
    }
}

impl Default for RetryDelay {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for RetryDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RetryDelay(..)")
    }
}

/// Whether a transport outcome justifies another attempt.
pub fn is_retransmission_reason(outcome: &TransportOutcome, retry_on_transport_error: bool) -> bool {
    match outcome {
        TransportOutcome::Completed { http_status } => {
            RETRANSMISSION_STATUSES.contains(http_status)
        }
        TransportOutcome::Failed { .. } => retry_on_transport_error,
        TransportOutcome::Cancelled | TransportOutcome::NotAttempted => false,
    }
}

/// One network attempt as reported by the caller's closure.
#[derive(Debug)]
pub struct Attempt {
    pub request_id: Option<String>,
    pub result: OcpiResult<TransportResponse>,
}

/// Terminal result of the attempt loop.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub transport: TransportOutcome,

    /// Body of the last completed attempt.
    pub body: Option<Vec<u8>>,

    pub request_id: Option<String>,

    /// Network attempts actually made.
    pub attempts: u32,
}

/// Retry policy shared by all outbound calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_on_transport_error: bool,
    pub delay: RetryDelay,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_on_transport_error: true,
            delay: RetryDelay::none(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: RetryDelay) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_retry_on_transport_error(mut self, retry: bool) -> Self {
        self.retry_on_transport_error = retry;
        self
    }

    /// Run `attempt` until it yields a non-transient outcome or attempts run out.
    ///
    /// `attempt` receives the 1-based attempt number. Cancellation is checked
    /// before every attempt and while waiting between attempts.
    pub async fn run<F, Fut>(&self, cancel: &CancellationToken, mut attempt: F) -> RetryOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt>,
    {
        let max_attempts = self.max_retries.saturating_add(1);
        let mut last = RetryOutcome {
            transport: TransportOutcome::NotAttempted,
            body: None,
            request_id: None,
            attempts: 0,
        };

        for n in 1..=max_attempts {
            if n > 1 {
                let delay = self.delay.delay_for(n - 1);
                warn!(
                    retry = n - 1,
                    max_retries = self.max_retries,
                    backoff_ms = delay.as_millis() as u64,
                    transport = ?last.transport,
                    "retrying request"
                );
                if !delay.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }

            if cancel.is_cancelled() {
                debug!(attempt = n, "cancelled before attempt");
                last.transport = TransportOutcome::Cancelled;
                last.body = None;
                return last;
            }

            let Attempt { request_id, result } = attempt(n).await;
            last.attempts = n;
            last.request_id = request_id;
            match result {
                Ok(response) => {
                    last.transport = TransportOutcome::Completed {
                        http_status: response.status,
                    };
                    last.body = Some(response.body);
                }
                Err(e) => {
                    debug!(attempt = n, error = %e, "attempt failed without response");
                    last.transport = TransportOutcome::Failed {
                        message: e.to_string(),
                    };
                    last.body = None;
                }
            }

            if !is_retransmission_reason(&last.transport, self.retry_on_transport_error) {
                break;
            }
        }

        last
    }
}
