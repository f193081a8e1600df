//! Backend availability prober
//!
//! The prediction backend may be asleep (cold start on its host). The prober
//! polls `/health` with exponential backoff until it answers or the attempt
//! budget runs out:
//!
//! ```text
//! checking --ok--> ready
//!    |
//!  fail (attempt n < max) --> sleeping(n) --delay--> probe again
//!    |
//!  fail (attempt n = max) --> error (no further automatic attempts)
//! ```
//!
//! Delay after the n-th failure is `min(base * growth^(n-1), cap)`.
//! A manual retry resets the counter and probes exactly once.
//!
//! State is published on a `watch` channel. Once the liveness token is
//! cancelled nothing more is published and in-flight results are discarded.

use crate::backend::Backend;
use aerisk_common::config::ProbeConfig;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Exponential backoff with a ceiling and an attempt budget
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub growth_factor: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            growth_factor: config.growth_factor,
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Delay scheduled after a failure when `attempt` failures preceded it
    ///
    /// `attempt` is zero-based: the first failure waits `base`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.growth_factor.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let millis = (self.base_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&ProbeConfig::default())
    }
}

/// Connectivity failure reported to the user
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error("Connection failed after {attempts} attempts ({detail}). Backend: {base_url}")]
    Exhausted {
        attempts: u32,
        detail: String,
        base_url: String,
    },

    #[error("Connection failed: {detail}. Backend: {base_url}")]
    Manual { detail: String, base_url: String },
}

/// Backend health phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Checking,
    Sleeping,
    Ready,
    Error,
}

/// What a front end needs to render the backend status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeSnapshot {
    pub state: HealthState,
    /// Consecutive failed attempts in the current probe session
    pub attempts: u32,
    /// Diagnostic of the last failure (full message once in `Error`)
    pub last_error: Option<String>,
}

impl ProbeSnapshot {
    pub fn checking() -> Self {
        Self {
            state: HealthState::Checking,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == HealthState::Ready
    }

    /// Transition on a successful probe
    pub fn succeeded(&self) -> Self {
        Self {
            state: HealthState::Ready,
            attempts: self.attempts,
            last_error: None,
        }
    }

    /// Transition on an automatic probe failure
    ///
    /// Returns the next snapshot and, when budget remains, the delay before
    /// the next attempt.
    pub fn failed(
        &self,
        detail: &str,
        base_url: &str,
        policy: &BackoffPolicy,
    ) -> (Self, Option<Duration>) {
        let attempts = self.attempts + 1;

        if attempts < policy.max_attempts {
            let next = Self {
                state: HealthState::Sleeping,
                attempts,
                last_error: Some(detail.to_string()),
            };
            (next, Some(policy.delay_for(attempts - 1)))
        } else {
            let next = Self {
                state: HealthState::Error,
                attempts,
                last_error: Some(
                    ProbeFailure::Exhausted {
                        attempts,
                        detail: detail.to_string(),
                        base_url: base_url.to_string(),
                    }
                    .to_string(),
                ),
            };
            (next, None)
        }
    }

    /// Transition on a manual retry failure
    pub fn manual_failed(&self, detail: &str, base_url: &str) -> Self {
        Self {
            state: HealthState::Error,
            attempts: self.attempts + 1,
            last_error: Some(
                ProbeFailure::Manual {
                    detail: detail.to_string(),
                    base_url: base_url.to_string(),
                }
                .to_string(),
            ),
        }
    }
}

/// Drives health probes against a backend
pub struct BackendProber<B> {
    backend: Arc<B>,
    policy: BackoffPolicy,
    state_tx: watch::Sender<ProbeSnapshot>,
    liveness: CancellationToken,
    /// Held for the duration of a probe session so only one probe is in flight
    in_flight: Mutex<()>,
}

impl<B: Backend> BackendProber<B> {
    pub fn new(backend: Arc<B>, policy: BackoffPolicy, liveness: CancellationToken) -> Self {
        let (state_tx, _) = watch::channel(ProbeSnapshot::checking());
        Self {
            backend,
            policy,
            state_tx,
            liveness,
            in_flight: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub fn subscribe(&self) -> watch::Receiver<ProbeSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn current(&self) -> ProbeSnapshot {
        self.state_tx.borrow().clone()
    }

    /// Probe with backoff until ready, exhausted or disposed
    pub async fn run(&self) -> ProbeSnapshot {
        let _probe = self.in_flight.lock().await;
        let mut snapshot = ProbeSnapshot::checking();
        self.publish(&snapshot);

        loop {
            let outcome = self.backend.health().await;
            if self.liveness.is_cancelled() {
                debug!("Prober disposed; discarding health result");
                return self.current();
            }

            match outcome {
                Ok(()) => {
                    snapshot = snapshot.succeeded();
                    info!(backend = self.backend.base_url(), "Backend health check passed");
                    self.publish(&snapshot);
                    return snapshot;
                }
                Err(e) => {
                    let detail = e.probe_detail();
                    let (next, delay) =
                        snapshot.failed(&detail, self.backend.base_url(), &self.policy);
                    snapshot = next;
                    warn!(
                        attempt = snapshot.attempts,
                        max_attempts = self.policy.max_attempts,
                        backend = self.backend.base_url(),
                        "Backend health check failed: {}",
                        detail
                    );
                    self.publish(&snapshot);

                    let Some(delay) = delay else {
                        error!(
                            backend = self.backend.base_url(),
                            "Backend connection failed after all retries"
                        );
                        return snapshot;
                    };

                    debug!(delay_ms = delay.as_millis() as u64, "Scheduling next health check");
                    tokio::select! {
                        _ = self.liveness.cancelled() => {
                            debug!("Prober disposed while waiting to retry");
                            return self.current();
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Reset the attempt counter and probe exactly once
    pub async fn retry_once(&self) -> ProbeSnapshot {
        let _probe = self.in_flight.lock().await;
        let snapshot = ProbeSnapshot::checking();
        self.publish(&snapshot);

        let outcome = self.backend.health().await;
        if self.liveness.is_cancelled() {
            debug!("Prober disposed; discarding manual retry result");
            return self.current();
        }

        let next = match outcome {
            Ok(()) => {
                info!(backend = self.backend.base_url(), "Backend reachable after manual retry");
                snapshot.succeeded()
            }
            Err(e) => {
                let next = snapshot.manual_failed(&e.probe_detail(), self.backend.base_url());
                warn!("Manual backend retry failed: {}", e.probe_detail());
                next
            }
        };
        self.publish(&next);
        next
    }

    fn publish(&self, snapshot: &ProbeSnapshot) {
        if self.liveness.is_cancelled() {
            return;
        }
        self.state_tx.send_replace(snapshot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays_follow_growth_and_cap() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u64> = (0..8).map(|n| policy.delay_for(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![1000, 1500, 2250, 3375, 5062, 7593, 10_000, 10_000]);
    }

    #[test]
    fn test_failures_sleep_until_budget_exhausted() {
        let policy = BackoffPolicy::default();
        let mut snapshot = ProbeSnapshot::checking();

        for expected in 1..8 {
            let (next, delay) = snapshot.failed("Status 502: Bad Gateway", "http://b", &policy);
            assert_eq!(next.state, HealthState::Sleeping);
            assert_eq!(next.attempts, expected);
            assert_eq!(delay, Some(policy.delay_for(expected - 1)));
            snapshot = next;
        }

        let (last, delay) = snapshot.failed("Status 502: Bad Gateway", "http://b", &policy);
        assert_eq!(last.state, HealthState::Error);
        assert_eq!(last.attempts, 8);
        assert!(delay.is_none());
        assert_eq!(
            last.last_error.as_deref(),
            Some("Connection failed after 8 attempts (Status 502: Bad Gateway). Backend: http://b")
        );
    }

    #[test]
    fn test_success_clears_error() {
        let policy = BackoffPolicy::default();
        let (sleeping, _) = ProbeSnapshot::checking().failed("refused", "http://b", &policy);
        let ready = sleeping.succeeded();
        assert!(ready.is_ready());
        assert_eq!(ready.attempts, 1);
        assert!(ready.last_error.is_none());
    }

    #[test]
    fn test_manual_failure_message() {
        let failed = ProbeSnapshot::checking().manual_failed("Connection timeout", "http://b");
        assert_eq!(failed.state, HealthState::Error);
        assert_eq!(
            failed.last_error.as_deref(),
            Some("Connection failed: Connection timeout. Backend: http://b")
        );
    }

    #[test]
    fn test_zero_attempt_budget_is_clamped() {
        let config = ProbeConfig {
            max_attempts: 0,
            ..ProbeConfig::default()
        };
        assert_eq!(BackoffPolicy::from_config(&config).max_attempts, 1);
    }
}
