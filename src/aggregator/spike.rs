//! Latency spike detection: compare the primary region's latest latency
//! against a median baseline over a rolling window, flag when it exceeds the
//! configured percentage threshold, and attribute the spike to a phase.
//!
//! No direct teacher counterpart — this derived-state logic is new, styled
//! after the aggregator's other threshold-comparison code.

use crate::models::TimingMetrics;

const MIN_BASELINE_SAMPLES: usize = 6;

pub struct SpikeResult {
    pub baseline_ms: u64,
    pub latest_ms: u64,
    pub percent_over_baseline: f64,
    pub phase: SpikePhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpikePhase {
    Dns,
    Tls,
    Ttfb,
    Overall,
}

/// Median of `history` (most recent latency samples within the baseline
/// window, oldest first or any order — median is order-independent).
/// Returns `None` if fewer than `MIN_BASELINE_SAMPLES` samples are present.
pub fn baseline_median(history: &[u64]) -> Option<u64> {
    if history.len() < MIN_BASELINE_SAMPLES {
        return None;
    }
    let mut sorted = history.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2
    } else {
        sorted[mid]
    })
}

/// Detect whether `latest` latency is a spike relative to `history`, per
/// `threshold_percent` (e.g. 200.0 means "200% of baseline", i.e. 3x).
pub fn detect(history: &[u64], latest_ms: u64, latest_timing: &TimingMetrics, threshold_percent: f64) -> Option<SpikeResult> {
    let baseline_ms = baseline_median(history)?;
    if baseline_ms == 0 {
        return None;
    }
    let percent_over_baseline = ((latest_ms as f64 - baseline_ms as f64) / baseline_ms as f64) * 100.0;
    if percent_over_baseline < threshold_percent {
        return None;
    }

    Some(SpikeResult {
        baseline_ms,
        latest_ms,
        percent_over_baseline,
        phase: attribute_phase(latest_timing),
    })
}

/// Heuristic attribution: DNS if it dominates, else TLS if it dominates,
/// else TTFB if it's the bulk of the total, else overall.
fn attribute_phase(timing: &TimingMetrics) -> SpikePhase {
    if timing.dns_lookup > 100 {
        SpikePhase::Dns
    } else if timing.tls_handshake > 200 {
        SpikePhase::Tls
    } else if timing.total > 0 && (timing.ttfb as f64) > 0.7 * timing.total as f64 {
        SpikePhase::Ttfb
    } else {
        SpikePhase::Overall
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_requires_minimum_sample_count() {
        assert!(baseline_median(&[100, 110, 120, 90, 105]).is_none());
        assert!(baseline_median(&[100, 110, 120, 90, 105, 95]).is_some());
    }

    #[test]
    fn median_of_even_length_averages_middle_two() {
        let history = vec![100, 200, 100, 200, 100, 200];
        assert_eq!(baseline_median(&history), Some(150));
    }

    #[test]
    fn detect_flags_latency_exceeding_threshold() {
        let history = vec![100, 100, 100, 100, 100, 100];
        let timing = TimingMetrics { total: 400, ..Default::default() };
        let result = detect(&history, 400, &timing, 200.0);
        assert!(result.is_some());
        let r = result.unwrap();
        assert_eq!(r.baseline_ms, 100);
    }

    #[test]
    fn detect_ignores_latency_within_threshold() {
        let history = vec![100, 100, 100, 100, 100, 100];
        let timing = TimingMetrics { total: 150, ..Default::default() };
        assert!(detect(&history, 150, &timing, 200.0).is_none());
    }

    #[test]
    fn attribute_phase_prefers_dns_then_tls_then_ttfb() {
        let dns_heavy = TimingMetrics { dns_lookup: 150, total: 300, ..Default::default() };
        assert_eq!(attribute_phase(&dns_heavy), SpikePhase::Dns);

        let tls_heavy = TimingMetrics { tls_handshake: 250, total: 300, ..Default::default() };
        assert_eq!(attribute_phase(&tls_heavy), SpikePhase::Tls);

        let ttfb_heavy = TimingMetrics { ttfb: 280, total: 300, ..Default::default() };
        assert_eq!(attribute_phase(&ttfb_heavy), SpikePhase::Ttfb);

        let even = TimingMetrics { dns_lookup: 10, tls_handshake: 10, ttfb: 100, total: 300, ..Default::default() };
        assert_eq!(attribute_phase(&even), SpikePhase::Overall);
    }
}
