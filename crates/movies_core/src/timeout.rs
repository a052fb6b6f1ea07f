//! Per-operation deadlines and the downstream circuit breaker
//! (`spec.md` §4.I).

use crate::error::{Result, ServiceError};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Default deadlines from `spec.md` §4.I.
pub mod deadlines {
    use std::time::Duration;

    pub const REQUEST: Duration = Duration::from_secs(30);
    pub const DATABASE: Duration = Duration::from_secs(10);
    pub const IMAGE_PROCESSING: Duration = Duration::from_secs(15);
    pub const HEALTH_CHECK: Duration = Duration::from_secs(5);
    pub const SHUTDOWN: Duration = Duration::from_secs(30);
}

/// Runs `fut` under `deadline`; a timed-out future becomes
/// `ServiceError::Timeout { op }`.
pub async fn with_deadline<F, T>(op: &'static str, deadline: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(inner) => inner,
        Err(_) => Err(ServiceError::Timeout { op }),
    }
}

/// Inspects a `tokio::task::JoinError` from a cancelled or panicking task
/// spawned to run an operation, and maps it onto the service error taxonomy:
/// a cancellation becomes an internal error tagged `cancelled` in the logs
/// (the wire message stays the generic "Internal error"); a panic is
/// likewise recovered into an internal error so the server keeps running.
pub fn handle_join_error(op: &'static str, err: tokio::task::JoinError) -> ServiceError {
    if err.is_cancelled() {
        warn!(op, reason = "cancelled", "operation cancelled");
    } else {
        warn!(op, reason = "panic", error = %err, "operation panicked");
    }
    ServiceError::PersistenceError
}

/// Circuit breaker state machine: `closed` (normal), `open` (reject
/// immediately), `half_open` (allow one probe).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            failure_threshold,
            cooldown,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// Runs `fut` through the breaker: rejects immediately while `open` and
    /// the cooldown hasn't elapsed; otherwise runs the operation and
    /// records the outcome.
    pub async fn call<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if !self.allow_attempt() {
            return Err(ServiceError::ServiceUnavailable);
        }

        match fut.await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }

    fn allow_attempt(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.cooldown {
                    inner.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeout_maps_to_typed_timeout_error() {
        let result: Result<()> = with_deadline("test_op", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ServiceError::Timeout { op: "test_op" })));
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures_and_rejects_immediately() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        for _ in 0..2 {
            let _ = breaker
                .call::<_, ()>(async { Err(ServiceError::PersistenceError) })
                .await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let result = breaker.call::<_, ()>(async { Ok(()) }).await;
        assert!(matches!(result, Err(ServiceError::ServiceUnavailable)));
    }

    #[tokio::test]
    async fn half_open_probe_closes_on_success() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(1));
        let _ = breaker
            .call::<_, ()>(async { Err(ServiceError::PersistenceError) })
            .await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let result = breaker.call::<_, ()>(async { Ok(()) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
