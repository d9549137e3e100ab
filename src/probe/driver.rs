//! Regional probe driver: one fan-out over the monitors assigned to this
//! region per invocation. Concurrency via `tokio::spawn` per monitor
//! (generalized from the teacher's sequential polling loop), write order
//! `CHECK#` then `LATENCY#`, monotonic clock for phase deltas, wall clock
//! for the record timestamp.

use crate::keys;
use crate::models::{CheckResult, CheckStatus, LatencyHistoryPoint, MonitorTarget};
use crate::probe::{http_client::TimedHttpClient, tcp_prober};
use crate::store::CentralStore;
use std::sync::Arc;

/// `CheckResult`/`LatencyHistory` TTL per the data model: 12 hours, enough
/// for the aggregator's 90s collection window and chart history alike.
const RAW_RETENTION_MS: u64 = 12 * 60 * 60 * 1_000;

pub async fn run_region(
    store: Arc<CentralStore>,
    monitors: Vec<MonitorTarget>,
    region: String,
    now_ms: u64,
) -> (usize, usize) {
    let http_client = Arc::new(TimedHttpClient::new().expect("failed to build HTTP client"));

    let tasks: Vec<_> = monitors
        .into_iter()
        .filter(|m| m.regions.iter().any(|r| r == &region))
        .map(|monitor| {
            let store = store.clone();
            let http_client = http_client.clone();
            let region = region.clone();
            tokio::spawn(async move {
                let result = execute(&http_client, &monitor, &region, now_ms).await;
                persist(&store, &result);
                result
            })
        })
        .collect();

    let results = futures::future::join_all(tasks).await;

    let mut ok = 0usize;
    let mut failed = 0usize;
    for joined in results {
        match joined {
            Ok(result) => {
                println!(
                    "🔍 {} [{}]: {:?} ({}ms)",
                    result.monitor_id, region, result.status, result.latency_ms
                );
                match result.status {
                    CheckStatus::Up => ok += 1,
                    CheckStatus::Down => {
                        failed += 1;
                        if let Some(err) = &result.error {
                            eprintln!("❌ {} [{}]: {err}", result.monitor_id, region);
                        }
                    }
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("❌ probe task panicked: {e}");
            }
        }
    }

    println!("✅ region {region}: {ok} up, {failed} down/failed");
    (ok, failed)
}

async fn execute(http_client: &TimedHttpClient, monitor: &MonitorTarget, region: &str, now_ms: u64) -> CheckResult {
    match monitor.method {
        crate::models::CheckMethod::TcpPing => tcp_prober::check(monitor, region, now_ms).await,
        _ => http_client.check(monitor, region, now_ms).await,
    }
}

fn persist(store: &CentralStore, result: &CheckResult) {
    let pk = keys::monitor_pk(&result.monitor_id);
    let ttl = Some(result.timestamp_ms + RAW_RETENTION_MS);

    let check_sk = keys::check_sk(&result.region, result.timestamp_ms);
    if let Err(e) = store.put(&pk, &check_sk, result, ttl) {
        eprintln!("❌ failed to write CHECK# for {}: {e}", result.monitor_id);
        return;
    }

    let latency_point = LatencyHistoryPoint {
        monitor_id: result.monitor_id.clone(),
        region: result.region.clone(),
        timestamp_ms: result.timestamp_ms,
        latency_ms: result.latency_ms,
        timing: result.timing,
    };
    let latency_sk = keys::latency_sk(&result.region, result.timestamp_ms);
    if let Err(e) = store.put(&pk, &latency_sk, &latency_point, ttl) {
        eprintln!("❌ failed to write LATENCY# for {}: {e}", result.monitor_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckMethod;

    fn monitor(regions: Vec<&str>) -> MonitorTarget {
        MonitorTarget {
            id: "m1".into(),
            name: "t".into(),
            method: CheckMethod::TcpPing,
            target: "127.0.0.1:1".into(),
            timeout_ms: Some(200),
            expected_codes: vec![],
            headers: None,
            body: None,
            response_keyword: None,
            response_forbidden_keyword: None,
            regions: regions.into_iter().map(String::from).collect(),
            primary_region: "us-east".into(),
            latency_threshold_ms: None,
            alerting: Default::default(),
            group: None,
        }
    }

    #[tokio::test]
    async fn run_region_skips_monitors_not_assigned_to_region() {
        let path = format!("/tmp/pulsegrid_driver_test_{}.db", std::process::id());
        let _ = std::fs::remove_file(&path);
        let store = Arc::new(CentralStore::open(&path).unwrap());
        let monitors = vec![monitor(vec!["eu-west"])];
        let (ok, failed) = run_region(store.clone(), monitors, "us-east".into(), 1_000).await;
        assert_eq!((ok, failed), (0, 0));

        let rows: Vec<CheckResult> = store
            .query_prefix("MONITOR#m1", &keys::check_prefix("us-east"), 2_000, None)
            .unwrap();
        assert!(rows.is_empty());
    }
}
