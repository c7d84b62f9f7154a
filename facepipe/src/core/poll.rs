//! Bounded readiness polling for the background server.
//!
//! The poll loop is a three-state machine: polling, ready, timed out. A probe
//! that answers on attempt `k` ends the loop immediately; a probe that never
//! answers exhausts `max_attempts` with a sleep between attempts (never after
//! the last one). The sleep is injected so tests can run without waiting.

use std::time::Duration;

/// A single readiness check against the server.
///
/// Implementations must be side-effect free from the caller's perspective:
/// the poll loop may invoke `check` up to `max_attempts` times.
pub trait Probe {
    /// Returns true when the server answered the probe.
    fn check(&self) -> bool;
}

/// Bounds for the readiness poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum number of probe attempts before giving up.
    pub max_attempts: u32,
    /// Sleep between consecutive attempts.
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_secs(5),
        }
    }
}

/// Terminal state of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The probe answered on attempt `attempts`.
    Ready { attempts: u32 },
    /// All attempts were exhausted without an answer.
    TimedOut { attempts: u32 },
}

/// Poll `probe` until it answers or `policy.max_attempts` is exhausted.
///
/// Sleeps `policy.interval` between attempts via the injected `sleep`. A
/// success on the final attempt does not sleep at all.
pub fn poll_until_ready<P: Probe>(
    probe: &P,
    policy: &PollPolicy,
    mut sleep: impl FnMut(Duration),
) -> PollOutcome {
    for attempt in 1..=policy.max_attempts {
        if probe.check() {
            return PollOutcome::Ready { attempts: attempt };
        }
        if attempt < policy.max_attempts {
            sleep(policy.interval);
        }
    }
    PollOutcome::TimedOut {
        attempts: policy.max_attempts,
    }
}
