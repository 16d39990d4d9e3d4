//! Health state machine
//!
//! Turns a stream of per-cycle probe results into a stable [`LinkState`].
//! Going down needs `failure_threshold` consecutive reachability failures;
//! coming back needs only `recovery_threshold` nominal probes. A lone loss in
//! the rolling window is a flap and clears on the next success; repeated loss
//! keeps the link DEGRADED until the failures age out of the window.

use crate::config::Thresholds;
use crate::models::{DegradeReason, HealthOutcome, Link, LinkState, LinkStatus, ProbeResult, Reachability};

#[derive(Debug, Clone)]
pub struct HealthPolicy {
    thresholds: Thresholds,
}

impl HealthPolicy {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Whether a health outcome is good enough for the link to read ONLINE.
    pub fn health_acceptable(&self, link: &Link, health: &HealthOutcome) -> bool {
        match health {
            HealthOutcome::Skipped => true,
            HealthOutcome::Failed { .. } => !self.thresholds.degrade_on_health_failure,
            HealthOutcome::Ok { counters } => {
                if counters.signal_dbm.is_some_and(|s| s < self.thresholds.signal_floor_dbm) {
                    return false;
                }
                match (counters.speed_mbps, link.expected_speed_mbps) {
                    (Some(actual), Some(expected)) => actual >= expected,
                    _ => true,
                }
            }
        }
    }

    /// Computes the replacement record for `previous` after one probe.
    pub fn apply(&self, link: &Link, previous: &LinkStatus, result: &ProbeResult) -> LinkStatus {
        let mut next = previous.clone();
        let reachable = result.reachability.is_reachable();
        let nominal = reachable && self.health_acceptable(link, &result.health);

        next.window.push_back(reachable);
        while next.window.len() > self.thresholds.window_size {
            next.window.pop_front();
        }

        if !reachable {
            next.consecutive_failures = next.consecutive_failures.saturating_add(1);
            next.consecutive_successes = 0;
        } else if nominal {
            next.consecutive_successes = next.consecutive_successes.saturating_add(1);
            next.consecutive_failures = 0;
        } else {
            next.consecutive_successes = 0;
            next.consecutive_failures = 0;
        }

        next.last_probe_at = Some(result.attempted_at);
        next.last_latency_ms = result.reachability.latency_ms();
        next.last_error = match (&result.reachability, &result.health) {
            (Reachability::Unreachable { reason }, _) => Some(*reason),
            (_, HealthOutcome::Failed { reason }) => Some(*reason),
            _ => None,
        };
        if let HealthOutcome::Ok { counters } = &result.health {
            next.speed_mbps = counters.speed_mbps;
            next.duplex = counters.duplex;
            next.signal_dbm = counters.signal_dbm;
        }
        next.last_health = Some(result.health.clone());

        let (state, reason) = self.transition(previous, &next, reachable, nominal);
        if state != previous.state {
            next.last_state_change_at = Some(result.attempted_at);
        }
        next.state = state;
        next.degraded_reason = reason;
        next
    }

    fn transition(
        &self,
        previous: &LinkStatus,
        next: &LinkStatus,
        reachable: bool,
        nominal: bool,
    ) -> (LinkState, Option<DegradeReason>) {
        let t = &self.thresholds;
        let losses = window_losses(next);

        if !reachable {
            if next.consecutive_failures >= t.failure_threshold {
                return (LinkState::CriticalOutage, None);
            }
            let loss_reason = if losses > 1 { DegradeReason::Loss } else { DegradeReason::Flap };
            return match previous.state {
                LinkState::Online if t.degrade_on_flap => (LinkState::Degraded, Some(loss_reason)),
                LinkState::Degraded if losses > 1 => (LinkState::Degraded, Some(DegradeReason::Loss)),
                LinkState::Degraded => (
                    LinkState::Degraded,
                    previous.degraded_reason.or(Some(DegradeReason::Flap)),
                ),
                other => (other, None),
            };
        }

        if !nominal {
            return (LinkState::Degraded, Some(DegradeReason::Health));
        }

        match (previous.state, previous.degraded_reason) {
            (LinkState::Unknown | LinkState::Online, _) => (LinkState::Online, None),
            (LinkState::Degraded, Some(DegradeReason::Flap)) => (LinkState::Online, None),
            (LinkState::Degraded, Some(DegradeReason::Loss)) => {
                if losses == 0 && next.consecutive_successes >= t.recovery_threshold {
                    (LinkState::Online, None)
                } else {
                    (LinkState::Degraded, Some(DegradeReason::Loss))
                }
            }
            (state, reason) => {
                if next.consecutive_successes >= t.recovery_threshold {
                    (LinkState::Online, None)
                } else {
                    (state, reason)
                }
            }
        }
    }
}

/// Reachability failures still inside the rolling window.
fn window_losses(status: &LinkStatus) -> usize {
    status.window.iter().filter(|ok| !**ok).count()
}
