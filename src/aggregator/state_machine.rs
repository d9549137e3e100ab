//! State transitions and incident lifecycle. `down_since`/`slow_since` edge
//! detection and incident open/close, generalized from the teacher's
//! `resolve_transition`/consensus status-transition logic to the
//! down/degraded/up vocabulary and region-vote inputs this system uses.

use crate::aggregator::vote::{VoteOutcome, VoteTally};
use crate::models::{CheckResult, Incident, MonitorState, MonitorStatus, MonitorTarget, TimingMetrics};

pub struct TransitionResult {
    pub state: MonitorState,
    /// A new incident was opened this tick (down_since went None → Some).
    pub incident_opened: Option<Incident>,
    /// An incident recovered this tick; its `start_ms` identifies which open
    /// incident to close (keyed by `down_since`, not "the most recent", to
    /// avoid misattributing recovery to an incident that already expired
    /// out of the store).
    pub incident_closed_start_ms: Option<u64>,
    pub became_down: bool,
    pub became_up_from_down: bool,
    pub became_slow: bool,
    pub became_fast_again: bool,
}

/// `primary_check` is `None` when the primary region has no observation
/// within the collection window; per spec.md §4.5 step 5 the monitor still
/// gets a status from the vote, with primary latency/timing reported as
/// zero rather than skipping the monitor for the tick.
pub fn apply_vote(
    prev: &MonitorState,
    monitor: &MonitorTarget,
    vote: &VoteTally,
    primary_check: Option<&CheckResult>,
    down_regions: &[String],
    now_ms: u64,
) -> TransitionResult {
    let mut state = prev.clone();
    state.status = match vote.outcome {
        VoteOutcome::Up => MonitorStatus::Up,
        VoteOutcome::Degraded => MonitorStatus::Degraded,
        VoteOutcome::Down => MonitorStatus::Down,
    };
    state.primary_latency = primary_check.map(|c| c.latency_ms).unwrap_or(0);
    state.primary_timing = primary_check.map(|c| c.timing).unwrap_or(TimingMetrics::default());
    state.last_check_ms = now_ms;

    let was_down = prev.down_since_ms.is_some();
    let is_down = vote.outcome == VoteOutcome::Down;

    let mut incident_opened = None;
    let mut incident_closed_start_ms = None;
    let became_down = !was_down && is_down;
    let became_up_from_down = was_down && !is_down;

    if became_down {
        state.down_since_ms = Some(now_ms);
        incident_opened = Some(Incident {
            monitor_id: monitor.id.clone(),
            start_ms: now_ms,
            end_ms: None,
            error: primary_check
                .and_then(|c| c.error.clone())
                .unwrap_or_else(|| "monitor is down".to_string()),
            regions_down: down_regions.to_vec(),
        });
    } else if became_up_from_down {
        incident_closed_start_ms = prev.down_since_ms;
        state.down_since_ms = None;
    } else if !is_down {
        state.down_since_ms = None;
    }

    let is_slow = !is_down
        && monitor
            .latency_threshold_ms
            .map(|threshold| state.primary_latency > threshold as u64)
            .unwrap_or(false);
    let was_slow = prev.slow_since_ms.is_some();
    let became_slow = !was_slow && is_slow;
    let became_fast_again = was_slow && !is_slow;

    if is_slow {
        if state.slow_since_ms.is_none() {
            state.slow_since_ms = Some(now_ms);
        }
    } else {
        state.slow_since_ms = None;
    }

    TransitionResult {
        state,
        incident_opened,
        incident_closed_start_ms,
        became_down,
        became_up_from_down,
        became_slow,
        became_fast_again,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckMethod, CheckStatus, RegionStatus};
    use std::collections::HashMap;

    fn monitor() -> MonitorTarget {
        MonitorTarget {
            id: "m1".into(),
            name: "t".into(),
            method: CheckMethod::Get,
            target: "https://example.com".into(),
            timeout_ms: None,
            expected_codes: vec![200],
            headers: None,
            body: None,
            response_keyword: None,
            response_forbidden_keyword: None,
            regions: vec!["us-east".into()],
            primary_region: "us-east".into(),
            latency_threshold_ms: Some(500),
            alerting: Default::default(),
            group: None,
        }
    }

    fn check(latency_ms: u64, status: CheckStatus) -> CheckResult {
        CheckResult {
            monitor_id: "m1".into(),
            region: "us-east".into(),
            timestamp_ms: 10_000,
            status,
            latency_ms,
            timing: TimingMetrics { total: latency_ms, ..Default::default() },
            error: if status == CheckStatus::Down { Some("boom".into()) } else { None },
        }
    }

    fn vote(outcome: VoteOutcome) -> VoteTally {
        VoteTally { regions_up: 0, regions_down: 0, total_regions: 1, threshold: 1, outcome }
    }

    #[test]
    fn transition_to_down_opens_incident_and_sets_down_since() {
        let prev = MonitorState::new("m1");
        let down_regions = vec!["us-east".to_string()];
        let result = apply_vote(&prev, &monitor(), &vote(VoteOutcome::Down), Some(&check(50, CheckStatus::Down)), &down_regions, 10_000);
        assert!(result.became_down);
        assert_eq!(result.state.down_since_ms, Some(10_000));
        assert!(result.incident_opened.is_some());
        let incident = result.incident_opened.unwrap();
        assert_eq!(incident.start_ms, 10_000);
        assert_eq!(incident.regions_down, down_regions);
    }

    #[test]
    fn transition_to_up_closes_incident_keyed_by_down_since() {
        let mut prev = MonitorState::new("m1");
        prev.down_since_ms = Some(5_000);
        prev.status = MonitorStatus::Down;
        let result = apply_vote(&prev, &monitor(), &vote(VoteOutcome::Up), Some(&check(50, CheckStatus::Up)), &[], 10_000);
        assert!(result.became_up_from_down);
        assert_eq!(result.incident_closed_start_ms, Some(5_000));
        assert_eq!(result.state.down_since_ms, None);
    }

    #[test]
    fn slow_latency_sets_slow_since_once() {
        let prev = MonitorState::new("m1");
        let result = apply_vote(&prev, &monitor(), &vote(VoteOutcome::Up), Some(&check(900, CheckStatus::Up)), &[], 10_000);
        assert!(result.became_slow);
        assert_eq!(result.state.slow_since_ms, Some(10_000));

        let result2 = apply_vote(&result.state, &monitor(), &vote(VoteOutcome::Up), Some(&check(950, CheckStatus::Up)), &[], 20_000);
        assert!(!result2.became_slow);
        assert_eq!(result2.state.slow_since_ms, Some(10_000));
    }

    #[test]
    fn fast_again_clears_slow_since() {
        let mut prev = MonitorState::new("m1");
        prev.slow_since_ms = Some(5_000);
        let result = apply_vote(&prev, &monitor(), &vote(VoteOutcome::Up), Some(&check(50, CheckStatus::Up)), &[], 10_000);
        assert!(result.became_fast_again);
        assert_eq!(result.state.slow_since_ms, None);
    }

    #[test]
    fn down_outcome_never_counts_as_slow() {
        let prev = MonitorState::new("m1");
        let result = apply_vote(&prev, &monitor(), &vote(VoteOutcome::Down), Some(&check(900, CheckStatus::Down)), &[], 10_000);
        assert!(!result.became_slow);
        assert_eq!(result.state.slow_since_ms, None);
        let _ = HashMap::<String, RegionStatus>::new();
    }

    #[test]
    fn absent_primary_check_reports_zero_latency_instead_of_skipping() {
        let prev = MonitorState::new("m1");
        let result = apply_vote(&prev, &monitor(), &vote(VoteOutcome::Down), None, &[], 10_000);
        assert_eq!(result.state.primary_latency, 0);
        assert_eq!(result.state.primary_timing, TimingMetrics::default());
        assert_eq!(result.state.status, MonitorStatus::Down);
        assert_eq!(result.incident_opened.unwrap().error, "monitor is down");
    }
}
