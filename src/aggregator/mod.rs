pub mod notify_gate;
pub mod spike;
pub mod state_machine;
pub mod vote;

use crate::aggregator::notify_gate::NotifyDecision;
use crate::config::AppConfig;
use crate::keys;
use crate::models::{
    CheckResult, GlobalSummary, Incident, MonitorState, MonitorStatus, MonitorTarget, RegionStatus,
};
use crate::notifier::{NotificationContext, Notifier};
use crate::store::CentralStore;
use std::collections::HashMap;
use std::sync::Arc;

/// How far back a single tick looks for the most recent check per region.
const COLLECTION_WINDOW_MS: u64 = 90_000;
/// State never expires on its own; incidents and checks are retained for a
/// bounded history, matching `crate::probe::driver::RAW_RETENTION_MS`.
const INCIDENT_RETENTION_MS: u64 = 90 * 24 * 60 * 60 * 1_000;

/// Run one aggregator tick over every configured monitor and exit. Per-
/// monitor region queries are parallelized (region keys are disjoint);
/// monitors themselves are processed sequentially to keep `STATE#GLOBAL`
/// accumulation straightforward.
pub async fn run_tick(store: Arc<CentralStore>, config: &AppConfig, notifier: &Notifier, now_ms: u64) {
    store.sweep_expired(now_ms).ok();

    let mut summary = GlobalSummary {
        last_update_ms: now_ms,
        ..Default::default()
    };

    for monitor in &config.monitors {
        match process_monitor(&store, monitor, &config.notification, notifier, now_ms).await {
            Ok(status) => match status {
                MonitorStatus::Up => summary.overall_up += 1,
                MonitorStatus::Degraded => summary.overall_degraded += 1,
                MonitorStatus::Down => summary.overall_down += 1,
            },
            Err(e) => eprintln!("❌ aggregator tick failed for {}: {e}", monitor.id),
        }
    }

    if let Err(e) = store.put(keys::GLOBAL_PK, keys::GLOBAL_STATE_SK, &summary, None) {
        eprintln!("❌ failed to write STATE#GLOBAL: {e}");
    }

    println!(
        "🗳️  tick complete: {} up, {} degraded, {} down",
        summary.overall_up, summary.overall_degraded, summary.overall_down
    );
}

async fn process_monitor(
    store: &CentralStore,
    monitor: &MonitorTarget,
    notification: &crate::models::NotificationConfig,
    notifier: &Notifier,
    now_ms: u64,
) -> Result<MonitorStatus, String> {
    let pk = keys::monitor_pk(&monitor.id);
    let window_start = now_ms.saturating_sub(COLLECTION_WINDOW_MS);

    let region_tasks: Vec<_> = monitor
        .regions
        .iter()
        .cloned()
        .map(|region| {
            let store_pk = pk.clone();
            let region_clone = region.clone();
            async move { (region, fetch_latest_check(store, &store_pk, &region_clone, window_start, now_ms)) }
        })
        .collect();
    let region_results: Vec<(String, Option<CheckResult>)> = futures::future::join_all(region_tasks).await;

    let mut region_statuses: HashMap<String, RegionStatus> = HashMap::new();
    let mut primary_check: Option<CheckResult> = None;
    for (region, maybe_check) in region_results {
        if let Some(check) = maybe_check {
            if region == monitor.primary_region {
                primary_check = Some(check.clone());
            }
            region_statuses.insert(
                region,
                RegionStatus {
                    status: check.status,
                    latency_ms: check.latency_ms,
                },
            );
        }
    }

    // Per spec.md §4.5 step 5: a primary region absent from this tick's
    // observations doesn't abort the monitor, it reports zeroed latency/
    // timing while the vote (which may still see other regions) proceeds.
    let prev_state: MonitorState = store
        .get(&pk, keys::STATE_SK, now_ms)
        .map_err(|e| e.to_string())?
        .unwrap_or_else(|| MonitorState::new(monitor.id.clone()));

    let tally = vote::tally(&region_statuses, monitor.regions.len() as u32, &monitor.alerting);
    let down_regions: Vec<String> = region_statuses
        .iter()
        .filter(|(_, s)| s.status == crate::models::CheckStatus::Down)
        .map(|(region, _)| region.clone())
        .collect();
    let mut transition =
        state_machine::apply_vote(&prev_state, monitor, &tally, primary_check.as_ref(), &down_regions, now_ms);
    transition.state.region_statuses = region_statuses;

    let decisions = notify_gate::decide(&prev_state, &mut transition, &monitor.alerting, &notification.skip_ids, now_ms);

    // Upsert (not just open) the incident on every tick the monitor is down,
    // so `error`/`regions_down` track the incident's current state rather
    // than freezing at the moment it opened.
    if let Some(down_since) = transition.state.down_since_ms {
        let incident = Incident {
            monitor_id: monitor.id.clone(),
            start_ms: down_since,
            end_ms: None,
            error: primary_check
                .as_ref()
                .and_then(|c| c.error.clone())
                .unwrap_or_else(|| "monitor is down".to_string()),
            regions_down: down_regions,
        };
        let sk = keys::incident_sk(down_since);
        store
            .put(&pk, &sk, &incident, Some(down_since + INCIDENT_RETENTION_MS))
            .map_err(|e| e.to_string())?;
    }

    if let Some(start_ms) = transition.incident_closed_start_ms {
        close_incident(store, &pk, start_ms, now_ms)?;
    }

    store
        .put_if_newer(&pk, keys::STATE_SK, &transition.state, now_ms)
        .map_err(|e| e.to_string())?;

    if !notify_gate::is_skipped(&monitor.id, &notification.skip_ids) {
        if let Some(primary_check) = &primary_check {
            maybe_notify_spike(store, &pk, monitor, primary_check, notifier, notification, now_ms).await;
        }
        dispatch_decisions(&decisions, monitor, &transition, notifier, notification, now_ms).await;
    }

    Ok(transition.state.status)
}

fn fetch_latest_check(store: &CentralStore, pk: &str, region: &str, window_start: u64, now_ms: u64) -> Option<CheckResult> {
    let prefix = keys::check_prefix(region);
    let mut rows: Vec<CheckResult> = store.query_prefix(pk, &prefix, now_ms, None).ok()?;
    rows.retain(|c| c.timestamp_ms >= window_start);
    rows.into_iter().max_by_key(|c| c.timestamp_ms)
}

fn close_incident(store: &CentralStore, pk: &str, start_ms: u64, now_ms: u64) -> Result<(), String> {
    let sk = keys::incident_sk(start_ms);
    let mut incident: Incident = match store.get(pk, &sk, now_ms).map_err(|e| e.to_string())? {
        Some(i) => i,
        None => return Ok(()), // already swept out of the TTL window
    };
    incident.end_ms = Some(now_ms);
    store
        .put(pk, &sk, &incident, Some(start_ms + INCIDENT_RETENTION_MS))
        .map_err(|e| e.to_string())
}

async fn maybe_notify_spike(
    store: &CentralStore,
    pk: &str,
    monitor: &MonitorTarget,
    primary_check: &CheckResult,
    notifier: &Notifier,
    notification: &crate::models::NotificationConfig,
    now_ms: u64,
) {
    if !monitor.alerting.spike_detection {
        return;
    }
    let window_start = now_ms.saturating_sub(monitor.alerting.baseline_window_minutes as u64 * 60_000);
    let history: Vec<u64> = store
        .query_prefix::<crate::models::LatencyHistoryPoint>(pk, &keys::latency_prefix(&monitor.primary_region), now_ms, None)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| p.timestamp_ms >= window_start && p.timestamp_ms < primary_check.timestamp_ms)
        .map(|p| p.latency_ms)
        .collect();

    if let Some(result) = spike::detect(&history, primary_check.latency_ms, &primary_check.timing, monitor.alerting.spike_threshold_percent) {
        let ctx = NotificationContext::spike(monitor, &result);
        notifier.notify(notification, &ctx).await;
    }
}

async fn dispatch_decisions(
    decisions: &[NotifyDecision],
    monitor: &MonitorTarget,
    transition: &state_machine::TransitionResult,
    notifier: &Notifier,
    notification: &crate::models::NotificationConfig,
    now_ms: u64,
) {
    for decision in decisions {
        let ctx = match decision {
            NotifyDecision::Down => NotificationContext::down(monitor, transition.state.down_since_ms.unwrap_or(now_ms)),
            NotifyDecision::Up => NotificationContext::up(monitor),
            NotifyDecision::Slow => NotificationContext::slow(monitor, transition.state.primary_latency),
            NotifyDecision::FastAgain => NotificationContext::fast_again(monitor),
        };
        notifier.notify(notification, &ctx).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertingConfig, CheckMethod, CheckStatus, NotificationConfig, TimingMetrics};

    fn three_region_monitor() -> MonitorTarget {
        MonitorTarget {
            id: "m1".into(),
            name: "Three region".into(),
            method: CheckMethod::Get,
            target: "https://example.com".into(),
            timeout_ms: None,
            expected_codes: vec![200],
            headers: None,
            body: None,
            response_keyword: None,
            response_forbidden_keyword: None,
            regions: vec!["a".into(), "b".into(), "c".into()],
            primary_region: "a".into(),
            latency_threshold_ms: None,
            alerting: AlertingConfig { grace_down_ms: 5 * 60_000, ..AlertingConfig::default() },
            group: None,
        }
    }

    fn seed_check(store: &CentralStore, monitor_id: &str, region: &str, status: CheckStatus, now_ms: u64) {
        let pk = keys::monitor_pk(monitor_id);
        let result = CheckResult {
            monitor_id: monitor_id.into(),
            region: region.into(),
            timestamp_ms: now_ms,
            status,
            latency_ms: 50,
            timing: TimingMetrics { total: 50, ..Default::default() },
            error: if status == CheckStatus::Down { Some("boom".into()) } else { None },
        };
        store.put(&pk, &keys::check_sk(region, now_ms), &result, None).unwrap();
    }

    fn temp_store() -> CentralStore {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let path = format!(
            "/tmp/pulsegrid_aggregator_test_{}_{}.db",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let _ = std::fs::remove_file(&path);
        CentralStore::open(&path).unwrap()
    }

    /// Scenario 1 from spec.md §8: two of three regions up, one down; stays
    /// below the default ceil(3/2)=2 threshold, so the monitor is degraded,
    /// not down — no incident, no down notification.
    #[tokio::test]
    async fn three_region_minority_down_is_degraded_not_down() {
        let store = temp_store();
        let monitor = three_region_monitor();
        let notification = NotificationConfig::default();
        let notifier = Notifier::new().unwrap();

        seed_check(&store, "m1", "a", CheckStatus::Up, 1_000);
        seed_check(&store, "m1", "b", CheckStatus::Down, 1_000);
        seed_check(&store, "m1", "c", CheckStatus::Up, 1_000);

        let status = process_monitor(&store, &monitor, &notification, &notifier, 1_000).await.unwrap();
        assert_eq!(status, MonitorStatus::Degraded);

        let pk = keys::monitor_pk("m1");
        let incidents: Vec<Incident> = store.query_prefix(&pk, keys::INCIDENT_PREFIX, 2_000, None).unwrap();
        assert!(incidents.is_empty());
    }

    /// Scenario 2 from spec.md §8: two of three regions down hits the
    /// threshold, so the monitor goes down, an incident opens with both down
    /// regions recorded, and `down_since` is set to the tick timestamp.
    #[tokio::test]
    async fn three_region_majority_down_opens_incident() {
        let store = temp_store();
        let monitor = three_region_monitor();
        let notification = NotificationConfig::default();
        let notifier = Notifier::new().unwrap();

        seed_check(&store, "m1", "a", CheckStatus::Down, 1_000);
        seed_check(&store, "m1", "b", CheckStatus::Down, 1_000);
        seed_check(&store, "m1", "c", CheckStatus::Up, 1_000);

        let status = process_monitor(&store, &monitor, &notification, &notifier, 1_000).await.unwrap();
        assert_eq!(status, MonitorStatus::Down);

        let pk = keys::monitor_pk("m1");
        let incidents: Vec<Incident> = store.query_prefix(&pk, keys::INCIDENT_PREFIX, 2_000, None).unwrap();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].start_ms, 1_000);
        let mut down_regions = incidents[0].regions_down.clone();
        down_regions.sort();
        assert_eq!(down_regions, vec!["a".to_string(), "b".to_string()]);

        let state: MonitorState = store.get(&pk, keys::STATE_SK, 2_000).unwrap().unwrap();
        assert_eq!(state.down_since_ms, Some(1_000));
    }
}
