//! # Retry and Protocol Policy
//!
//! The module bus has no way to tell a transient fault from a fatal one: a busy,
//! absent, or broken module all show up as a non-`OK` status or a checksum
//! complaint. The engine therefore retries, and this module decides for how long.
//!
//! The default [`RetryPolicy`] never gives up and never waits. Tests and
//! unattended tools should bound it with [`RetryPolicy::with_max_attempts`] or
//! [`RetryPolicy::with_max_duration`].

use crate::constants::{CTLAB_CHECKSUM_ERROR_MARKER, CTLAB_DEFAULT_POLL_INTERVAL_MS};
use std::time::Duration;
use tokio::time::Instant;

/// How often and how long a failing exchange is repeated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Total attempts including the first; `None` is unbounded.
    pub max_attempts: Option<u32>,
    /// Wall-clock budget measured from the first attempt; `None` is unbounded.
    pub max_duration: Option<Duration>,
    /// Pause before each repeated attempt.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Keep trying forever, immediately.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Exactly one attempt.
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts.is_none() && self.max_duration.is_none()
    }

    /// Starts tracking one retried operation.
    pub fn start(&self) -> RetryState<'_> {
        RetryState {
            policy: self,
            attempts: 0,
            started: Instant::now(),
        }
    }
}

/// Attempt bookkeeping for one retried operation.
#[derive(Debug)]
pub struct RetryState<'a> {
    policy: &'a RetryPolicy,
    attempts: u32,
    started: Instant,
}

impl RetryState<'_> {
    /// Records an attempt. Returns `false` once the policy is exhausted, in
    /// which case the attempt must not be made.
    pub async fn next_attempt(&mut self) -> bool {
        if self.attempts > 0 {
            if let Some(max) = self.policy.max_attempts {
                if self.attempts >= max {
                    return false;
                }
            }
            if !self.policy.backoff.is_zero() {
                tokio::time::sleep(self.policy.backoff).await;
            }
            if let Some(max) = self.policy.max_duration {
                if self.started.elapsed() >= max {
                    return false;
                }
            }
        }
        self.attempts += 1;
        true
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Protocol assumptions the engine applies to every exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolPolicy {
    pub retry: RetryPolicy,
    /// Substring marking a module's checksum complaint; such answers are resent.
    pub checksum_error_marker: String,
    /// Status codes that fail a status-checked send at once instead of retrying.
    pub fatal_statuses: Vec<String>,
    /// Whether an `EDL2a` module fills the `edl` slot during discovery.
    pub edl2a_alias: bool,
}

impl Default for ProtocolPolicy {
    fn default() -> Self {
        ProtocolPolicy {
            retry: RetryPolicy::default(),
            checksum_error_marker: CTLAB_CHECKSUM_ERROR_MARKER.to_string(),
            fatal_statuses: Vec::new(),
            edl2a_alias: true,
        }
    }
}

impl ProtocolPolicy {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fatal_status(mut self, status: impl Into<String>) -> Self {
        self.fatal_statuses.push(status.into());
        self
    }

    pub fn with_edl2a_alias(mut self, enabled: bool) -> Self {
        self.edl2a_alias = enabled;
        self
    }

    pub fn is_fatal_status(&self, status: &str) -> bool {
        self.fatal_statuses.iter().any(|s| s == status)
    }

    pub fn is_checksum_error(&self, raw: &[u8]) -> bool {
        let marker = self.checksum_error_marker.as_bytes();
        !marker.is_empty() && raw.windows(marker.len()).any(|w| w == marker)
    }
}

/// Engine settings: protocol policy plus the response wait discipline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub policy: ProtocolPolicy,
    /// Overall bound on waiting for the first inbound byte of an answer;
    /// `None` waits indefinitely.
    pub response_timeout: Option<Duration>,
    /// Pause between polls of the transport while waiting.
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            policy: ProtocolPolicy::default(),
            response_timeout: None,
            poll_interval: Duration::from_millis(CTLAB_DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl EngineConfig {
    pub fn with_policy(mut self, policy: ProtocolPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.policy.retry = retry;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_attempts() {
        let policy = RetryPolicy::default().with_max_attempts(3);
        let mut state = policy.start();
        assert!(state.next_attempt().await);
        assert!(state.next_attempt().await);
        assert!(state.next_attempt().await);
        assert!(!state.next_attempt().await);
        assert_eq!(state.attempts(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_allows_single_attempt() {
        let policy = RetryPolicy::no_retry();
        let mut state = policy.start();
        assert!(state.next_attempt().await);
        assert!(!state.next_attempt().await);
    }

    #[tokio::test]
    async fn test_unbounded_keeps_going() {
        let policy = RetryPolicy::unbounded();
        assert!(policy.is_unbounded());
        let mut state = policy.start();
        for _ in 0..1000 {
            assert!(state.next_attempt().await);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_budget() {
        let policy = RetryPolicy::default()
            .with_max_duration(Duration::from_millis(50))
            .with_backoff(Duration::from_millis(20));
        let mut state = policy.start();
        let mut attempts = 0;
        while state.next_attempt().await {
            attempts += 1;
        }
        // Attempts at t = 0, 20, 40 ms; the check at 60 ms is over budget.
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_checksum_marker_detection() {
        let policy = ProtocolPolicy::default();
        assert!(policy.is_checksum_error(b"#1:255=7 [CHKSUM]"));
        assert!(!policy.is_checksum_error(b"#1:255=0 [OK]"));

        let disabled = ProtocolPolicy {
            checksum_error_marker: String::new(),
            ..ProtocolPolicy::default()
        };
        assert!(!disabled.is_checksum_error(b"7 [CHKSUM]"));
    }

    #[test]
    fn test_fatal_status() {
        let policy = ProtocolPolicy::default().with_fatal_status("PARAM");
        assert!(policy.is_fatal_status("PARAM"));
        assert!(!policy.is_fatal_status("BUSY"));
        assert!(!ProtocolPolicy::default().is_fatal_status("PARAM"));
    }
}
