//! Majority voting over the most recent check per region within the
//! collection window. Grounded in the consensus threshold logic used to
//! reconcile multi-location heartbeats, generalized to the fixed
//! down/degraded/up vocabulary this system uses.

use crate::models::{AlertingConfig, CheckStatus, RegionStatus};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Up,
    Degraded,
    Down,
}

pub struct VoteTally {
    pub regions_up: u32,
    pub regions_down: u32,
    pub total_regions: u32,
    pub threshold: u32,
    pub outcome: VoteOutcome,
}

/// `regions_up`/`regions_down` tally with `threshold = down_vote_threshold`
/// if configured, else `ceil(|monitor.regions|/2)`. Down when `regions_down
/// >= threshold`; degraded when some, but fewer than threshold, regions are
/// down; up otherwise. `configured_regions` is the monitor's declared region
/// count (`monitor.regions.len()`), not the number actually observed this
/// tick — a region silently absent from `region_statuses` still counts
/// toward the denominator the spec's `⌈|monitor.regions| / 2⌉` threshold is
/// defined over.
pub fn tally(
    region_statuses: &HashMap<String, RegionStatus>,
    configured_regions: u32,
    alerting: &AlertingConfig,
) -> VoteTally {
    let regions_down = region_statuses
        .values()
        .filter(|s| s.status == CheckStatus::Down)
        .count() as u32;
    let regions_up = region_statuses.len() as u32 - regions_down;

    let threshold = alerting
        .down_vote_threshold
        .unwrap_or_else(|| configured_regions.div_ceil(2).max(1));

    let outcome = if regions_down >= threshold {
        VoteOutcome::Down
    } else if regions_down > 0 {
        VoteOutcome::Degraded
    } else {
        VoteOutcome::Up
    };

    VoteTally {
        regions_up,
        regions_down,
        total_regions: configured_regions,
        threshold,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(status: CheckStatus) -> RegionStatus {
        RegionStatus { status, latency_ms: 100 }
    }

    #[test]
    fn default_threshold_is_ceil_half_regions() {
        let mut regions = HashMap::new();
        regions.insert("a".to_string(), region(CheckStatus::Down));
        regions.insert("b".to_string(), region(CheckStatus::Up));
        regions.insert("c".to_string(), region(CheckStatus::Up));
        let t = tally(&regions, regions.len() as u32, &AlertingConfig::default());
        assert_eq!(t.threshold, 2);
        assert_eq!(t.outcome, VoteOutcome::Degraded);
    }

    #[test]
    fn majority_down_triggers_down_outcome() {
        let mut regions = HashMap::new();
        regions.insert("a".to_string(), region(CheckStatus::Down));
        regions.insert("b".to_string(), region(CheckStatus::Down));
        regions.insert("c".to_string(), region(CheckStatus::Up));
        let t = tally(&regions, regions.len() as u32, &AlertingConfig::default());
        assert_eq!(t.outcome, VoteOutcome::Down);
    }

    #[test]
    fn explicit_threshold_overrides_default() {
        let mut regions = HashMap::new();
        regions.insert("a".to_string(), region(CheckStatus::Down));
        regions.insert("b".to_string(), region(CheckStatus::Up));
        let mut alerting = AlertingConfig::default();
        alerting.down_vote_threshold = Some(1);
        let t = tally(&regions, regions.len() as u32, &alerting);
        assert_eq!(t.outcome, VoteOutcome::Down);
    }

    #[test]
    fn all_up_is_up() {
        let mut regions = HashMap::new();
        regions.insert("a".to_string(), region(CheckStatus::Up));
        let t = tally(&regions, regions.len() as u32, &AlertingConfig::default());
        assert_eq!(t.outcome, VoteOutcome::Up);
        assert_eq!(t.regions_up, 1);
        assert_eq!(t.regions_down, 0);
    }

    /// A monitor declares 4 regions but only 2 reported this tick (the other
    /// 2 are silently absent, e.g. their probe never wrote within the
    /// collection window). The threshold is still ceil(4/2)=2, computed over
    /// the configured region count, not the 2 that actually showed up.
    #[test]
    fn threshold_uses_configured_region_count_not_observed_count() {
        let mut regions = HashMap::new();
        regions.insert("a".to_string(), region(CheckStatus::Down));
        regions.insert("b".to_string(), region(CheckStatus::Up));
        let t = tally(&regions, 4, &AlertingConfig::default());
        assert_eq!(t.threshold, 2);
        assert_eq!(t.outcome, VoteOutcome::Degraded);
        assert_eq!(t.total_regions, 4);
    }
}
