//! Edge-triggered notification gating: only fire once per state transition,
//! after its configured grace period has elapsed, tracked via
//! `last_notified_down_ms`/`last_notified_slow_ms` so repeat ticks in the
//! same incident don't re-notify.

use crate::aggregator::state_machine::TransitionResult;
use crate::models::{AlertingConfig, MonitorState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyDecision {
    Down,
    Up,
    Slow,
    FastAgain,
}

pub fn is_skipped(monitor_id: &str, skip_ids: &[String]) -> bool {
    skip_ids.iter().any(|id| id == monitor_id)
}

/// Evaluate gating for this tick, mutating `transition.state`'s
/// `last_notified_*` bookkeeping fields in place.
pub fn decide(
    prev: &MonitorState,
    transition: &mut TransitionResult,
    alerting: &AlertingConfig,
    skip_ids: &[String],
    now_ms: u64,
) -> Vec<NotifyDecision> {
    let mut decisions = Vec::new();
    if is_skipped(&prev.monitor_id, skip_ids) {
        return decisions;
    }

    if let Some(since) = transition.state.down_since_ms {
        let elapsed = now_ms.saturating_sub(since);
        if elapsed >= alerting.grace_down_ms && transition.state.last_notified_down_ms != Some(since) {
            decisions.push(NotifyDecision::Down);
            transition.state.last_notified_down_ms = Some(since);
        }
    } else {
        if transition.became_up_from_down && prev.last_notified_down_ms.is_some() {
            decisions.push(NotifyDecision::Up);
        }
        transition.state.last_notified_down_ms = None;
    }

    if let Some(since) = transition.state.slow_since_ms {
        let elapsed = now_ms.saturating_sub(since);
        if elapsed >= alerting.grace_slow_ms && transition.state.last_notified_slow_ms != Some(since) {
            decisions.push(NotifyDecision::Slow);
            transition.state.last_notified_slow_ms = Some(since);
        }
    } else {
        if transition.became_fast_again && prev.last_notified_slow_ms.is_some() {
            decisions.push(NotifyDecision::FastAgain);
        }
        transition.state.last_notified_slow_ms = None;
    }

    decisions
}
