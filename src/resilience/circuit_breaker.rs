//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: backend assumed down, calls fail fast
//! - Half-Open: a single probe call is testing recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: next call after the cooldown since the last failure
//! Half-Open → Closed: probe succeeds (failure count reset)
//! Half-Open → Open: probe fails (cooldown restarts)
//! ```
//!
//! # Design Decisions
//! - Per-backend circuit breaker (not global)
//! - Fail fast in Open state (no network call is made)
//! - Single probe in Half-Open (prevents hammering recovering backend)
//! - The lock is never held across the wrapped call
//! - Outcomes are judged against the cycle the call was admitted in. A call
//!   admitted while Closed that finishes after the breaker opened is late:
//!   its success changes nothing, and its failure only adds to the count.
//!   Only the probe moves the breaker out of Half-Open.

use serde::Serialize;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    /// Gauge value exported for the state.
    pub fn as_gauge(self) -> f64 {
        match self {
            BreakerState::Closed => 0.0,
            BreakerState::HalfOpen => 1.0,
            BreakerState::Open => 2.0,
        }
    }
}

/// Thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl From<&BreakerConfig> for CircuitBreakerConfig {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            cooldown: Duration::from_secs(config.cooldown_secs),
        }
    }
}

/// Outcome of [`CircuitBreaker::attempt`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker rejected the call without invoking the operation.
    #[error("circuit breaker open for backend '{0}'")]
    Open(String),

    /// The operation ran and failed.
    #[error("{0}")]
    Inner(E),
}

/// Read-only view of a breaker for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub backend: String,
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub seconds_since_last_failure: Option<u64>,
    pub times_opened: u64,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
    /// Bumped on every transition into Open.
    times_opened: u64,
}

/// Per-backend circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    backend: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(backend: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            backend: backend.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                probe_in_flight: false,
                times_opened: 0,
            }),
        }
    }

    /// Run `operation` through the breaker.
    ///
    /// Returns [`BreakerError::Open`] without calling `operation` when the
    /// breaker is open (or a half-open probe is already running).
    pub async fn attempt<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut ticket = self
            .admit()
            .ok_or_else(|| BreakerError::Open(self.backend.clone()))?;

        let result = operation().await;
        match result {
            Ok(value) => {
                ticket.settle(true);
                Ok(value)
            }
            Err(e) => {
                ticket.settle(false);
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Current state without side effects.
    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            backend: self.backend.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            seconds_since_last_failure: inner.last_failure.map(|t| t.elapsed().as_secs()),
            times_opened: inner.times_opened,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self) -> Option<Ticket<'_>> {
        let mut inner = self.lock();
        let probe = match inner.state {
            BreakerState::Closed => false,
            BreakerState::Open => {
                let cooled = inner
                    .last_failure
                    .map(|at| at.elapsed() >= self.config.cooldown)
                    .unwrap_or(true);
                if !cooled {
                    return None;
                }
                self.transition(&mut inner, BreakerState::HalfOpen);
                inner.probe_in_flight = true;
                true
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    return None;
                }
                inner.probe_in_flight = true;
                true
            }
        };
        Some(Ticket {
            breaker: self,
            probe,
            cycle: inner.times_opened,
            settled: false,
        })
    }

    fn record(&self, success: bool, probe: bool, cycle: u64) {
        let mut inner = self.lock();

        if probe {
            inner.probe_in_flight = false;
            if success {
                inner.consecutive_failures = 0;
                self.transition(&mut inner, BreakerState::Closed);
            } else {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                inner.last_failure = Some(Instant::now());
                self.transition(&mut inner, BreakerState::Open);
            }
            return;
        }

        if cycle != inner.times_opened {
            // Admitted before the breaker last opened.
            if !success && inner.state != BreakerState::Closed {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
            }
            tracing::debug!(backend = %self.backend, success, state = ?inner.state, "Late outcome from before the breaker opened");
            return;
        }

        if success {
            inner.consecutive_failures = 0;
            return;
        }
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        if inner.consecutive_failures >= self.config.failure_threshold {
            self.transition(&mut inner, BreakerState::Open);
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: BreakerState) {
        if inner.state == to {
            return;
        }
        let from = inner.state;
        inner.state = to;
        if to == BreakerState::Open {
            inner.times_opened += 1;
        }
        match to {
            BreakerState::Open => tracing::warn!(
                backend = %self.backend,
                from = ?from,
                failures = inner.consecutive_failures,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(backend = %self.backend, from = ?from, to = ?to, "Circuit breaker transition"),
        }
        metrics::record_breaker_state(&self.backend, to);
    }
}

/// Admission for one call. Dropping it unsettled (the caller was cancelled)
/// frees the half-open probe slot without recording an outcome.
struct Ticket<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    /// `times_opened` when the call was admitted.
    cycle: u64,
    settled: bool,
}

impl Ticket<'_> {
    fn settle(&mut self, success: bool) {
        self.settled = true;
        self.breaker.record(success, self.probe, self.cycle);
    }
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.lock().probe_in_flight = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("local", CircuitBreakerConfig::default())
    }

    async fn fail(b: &CircuitBreaker, calls: &AtomicU32) -> Result<(), BreakerError<&'static str>> {
        b.attempt(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("boom")
        })
        .await
    }

    async fn succeed(b: &CircuitBreaker, calls: &AtomicU32) -> Result<u32, BreakerError<&'static str>> {
        b.attempt(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, &'static str>(7)
        })
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_three_failures_and_fails_fast() {
        let b = breaker();
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            assert!(matches!(fail(&b, &calls).await, Err(BreakerError::Inner("boom"))));
            assert_eq!(b.state(), BreakerState::Closed);
        }
        assert!(fail(&b, &calls).await.is_err());
        assert_eq!(b.state(), BreakerState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Fourth call inside the cooldown never reaches the operation
        let res = succeed(&b, &calls).await;
        assert!(matches!(res, Err(BreakerError::Open(ref name)) if name == "local"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_counter_while_closed() {
        let b = breaker();
        let calls = AtomicU32::new(0);
        let _ = fail(&b, &calls).await;
        let _ = fail(&b, &calls).await;
        assert_eq!(b.consecutive_failures(), 2);
        assert_eq!(succeed(&b, &calls).await.unwrap(), 7);
        assert_eq!(b.consecutive_failures(), 0);
        let _ = fail(&b, &calls).await;
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_after_cooldown_closes_on_success() {
        let b = breaker();
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let _ = fail(&b, &calls).await;
        }
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(matches!(succeed(&b, &calls).await, Err(BreakerError::Open(_))));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(succeed(&b, &calls).await.unwrap(), 7);
        assert_eq!(b.state(), BreakerState::Closed);
        assert_eq!(b.consecutive_failures(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens_and_restarts_cooldown() {
        let b = breaker();
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let _ = fail(&b, &calls).await;
        }
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(matches!(fail(&b, &calls).await, Err(BreakerError::Inner(_))));
        assert_eq!(b.state(), BreakerState::Open);

        // Cooldown counts from the failed probe
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(matches!(succeed(&b, &calls).await, Err(BreakerError::Open(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_one_probe_admitted() {
        let b = Arc::new(breaker());
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let _ = fail(&b, &calls).await;
        }
        tokio::time::advance(Duration::from_secs(61)).await;

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let probe_breaker = b.clone();
        let probe = tokio::spawn(async move {
            probe_breaker
                .attempt(move || async move {
                    let _ = release_rx.await;
                    Ok::<_, &'static str>(1)
                })
                .await
        });
        tokio::task::yield_now().await;
        assert_eq!(b.state(), BreakerState::HalfOpen);

        // A concurrent caller is turned away while the probe runs
        assert!(matches!(succeed(&b, &calls).await, Err(BreakerError::Open(_))));

        release_tx.send(()).unwrap();
        assert_eq!(probe.await.unwrap().unwrap(), 1);
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_probe_frees_slot() {
        let b = breaker();
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let _ = fail(&b, &calls).await;
        }
        tokio::time::advance(Duration::from_secs(61)).await;

        let pending = b.attempt(|| std::future::pending::<Result<(), &'static str>>());
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(b.state(), BreakerState::HalfOpen);
        assert_eq!(b.consecutive_failures(), 3);

        // Next caller may probe
        assert_eq!(succeed(&b, &calls).await.unwrap(), 7);
        assert_eq!(b.state(), BreakerState::Closed);
    }

    /// Admits a call while the breaker is in its current state and holds it
    /// until `release` is sent the outcome.
    fn hold(b: &Arc<CircuitBreaker>) -> (
        tokio::sync::oneshot::Sender<Result<u32, &'static str>>,
        tokio::task::JoinHandle<Result<u32, BreakerError<&'static str>>>,
    ) {
        let (release, outcome) = tokio::sync::oneshot::channel();
        let held = b.clone();
        let handle = tokio::spawn(async move {
            held.attempt(move || async move { outcome.await.unwrap_or(Err("dropped")) })
                .await
        });
        (release, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_success_does_not_close_open_breaker() {
        let b = Arc::new(breaker());
        let calls = AtomicU32::new(0);

        let (release, straggler) = hold(&b);
        tokio::task::yield_now().await;

        for _ in 0..3 {
            let _ = fail(&b, &calls).await;
        }
        assert_eq!(b.state(), BreakerState::Open);

        release.send(Ok(1)).unwrap();
        assert_eq!(straggler.await.unwrap().unwrap(), 1);
        assert_eq!(b.state(), BreakerState::Open);
        assert_eq!(b.consecutive_failures(), 3);

        // Still inside the cooldown: fail fast
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(matches!(succeed(&b, &calls).await, Err(BreakerError::Open(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_failure_counts_without_extending_cooldown() {
        let b = Arc::new(breaker());
        let calls = AtomicU32::new(0);

        let (release, straggler) = hold(&b);
        tokio::task::yield_now().await;
        for _ in 0..3 {
            let _ = fail(&b, &calls).await;
        }

        tokio::time::advance(Duration::from_secs(30)).await;
        release.send(Err("late")).unwrap();
        assert!(matches!(straggler.await.unwrap(), Err(BreakerError::Inner("late"))));
        assert_eq!(b.state(), BreakerState::Open);
        assert_eq!(b.consecutive_failures(), 4);
        assert_eq!(b.snapshot().times_opened, 1);

        // Cooldown still counts from the third failure
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(succeed(&b, &calls).await.unwrap(), 7);
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_failure_does_not_reopen_half_open() {
        let b = Arc::new(breaker());
        let calls = AtomicU32::new(0);

        let (release_straggler, straggler) = hold(&b);
        tokio::task::yield_now().await;
        for _ in 0..3 {
            let _ = fail(&b, &calls).await;
        }
        tokio::time::advance(Duration::from_secs(61)).await;

        let (release_probe, probe) = hold(&b);
        tokio::task::yield_now().await;
        assert_eq!(b.state(), BreakerState::HalfOpen);

        release_straggler.send(Err("late")).unwrap();
        assert!(straggler.await.unwrap().is_err());
        assert_eq!(b.state(), BreakerState::HalfOpen);
        assert_eq!(b.snapshot().times_opened, 1);

        release_probe.send(Ok(2)).unwrap();
        assert_eq!(probe.await.unwrap().unwrap(), 2);
        assert_eq!(b.state(), BreakerState::Closed);
        assert_eq!(b.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_failures_settle_on_one_count() {
        const CALLERS: usize = 8;
        let b = Arc::new(breaker());
        let barrier = Arc::new(tokio::sync::Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let b = b.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    b.attempt(move || async move {
                        // Every caller is admitted before any of them fails
                        barrier.wait().await;
                        Err::<(), _>("boom")
                    })
                    .await
                })
            })
            .collect();

        for handle in handles {
            assert!(matches!(handle.await.unwrap(), Err(BreakerError::Inner("boom"))));
        }

        let snap = b.snapshot();
        assert_eq!(snap.state, BreakerState::Open);
        assert_eq!(snap.consecutive_failures, CALLERS as u32);
        assert_eq!(snap.times_opened, 1);

        let calls = AtomicU32::new(0);
        assert!(matches!(succeed(&b, &calls).await, Err(BreakerError::Open(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_is_read_only() {
        let b = breaker();
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let _ = fail(&b, &calls).await;
        }
        tokio::time::advance(Duration::from_secs(120)).await;

        let snap = b.snapshot();
        assert_eq!(snap.state, BreakerState::Open);
        assert_eq!(snap.consecutive_failures, 3);
        assert_eq!(snap.seconds_since_last_failure, Some(120));
        assert_eq!(snap.times_opened, 1);
        // Taking a snapshot must not start a probe
        assert_eq!(b.state(), BreakerState::Open);
    }
}
