//! Bare TCP connect probe: DNS lookup then a connect attempt with a
//! deadline, no higher-layer protocol handshake.

use crate::models::{CheckResult, CheckStatus, MonitorTarget, TimingMetrics};
use crate::probe::errors;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::time::timeout;

pub async fn check(monitor: &MonitorTarget, region: &str, now_ms: u64) -> CheckResult {
    let addr = monitor.target.strip_prefix("tcp://").unwrap_or(&monitor.target);
    let deadline = std::time::Duration::from_millis(monitor.effective_timeout_ms() as u64);

    let dns_start = Instant::now();
    let resolved = tokio::net::lookup_host(addr).await;
    let dns_lookup = dns_start.elapsed().as_millis() as u64;

    let (status, tcp_connect, error) = match resolved {
        Ok(mut addrs) => match addrs.next() {
            Some(sock_addr) => {
                let connect_start = Instant::now();
                match timeout(deadline, TcpStream::connect(sock_addr)).await {
                    Ok(Ok(_stream)) => (CheckStatus::Up, connect_start.elapsed().as_millis() as u64, None),
                    Ok(Err(e)) => (
                        CheckStatus::Down,
                        connect_start.elapsed().as_millis() as u64,
                        Some(errors::categorize_connect_io_error(&e)),
                    ),
                    Err(_) => (
                        CheckStatus::Down,
                        connect_start.elapsed().as_millis() as u64,
                        Some("Request timeout".to_string()),
                    ),
                }
            }
            None => (CheckStatus::Down, 0, Some("Host not found".to_string())),
        },
        Err(e) => (CheckStatus::Down, 0, Some(errors::categorize_dns_io_error(&e))),
    };

    let timing = TimingMetrics {
        dns_lookup,
        tcp_connect,
        tls_handshake: 0,
        ttfb: 0,
        content_download: 0,
        total: dns_lookup + tcp_connect,
        approximated: false,
    };

    CheckResult {
        monitor_id: monitor.id.clone(),
        region: region.to_string(),
        timestamp_ms: now_ms,
        status,
        latency_ms: timing.total,
        timing,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckMethod;

    fn monitor(target: &str) -> MonitorTarget {
        MonitorTarget {
            id: "m1".into(),
            name: "t".into(),
            method: CheckMethod::TcpPing,
            target: target.into(),
            timeout_ms: Some(500),
            expected_codes: vec![],
            headers: None,
            body: None,
            response_keyword: None,
            response_forbidden_keyword: None,
            regions: vec!["us-east".into()],
            primary_region: "us-east".into(),
            latency_threshold_ms: None,
            alerting: Default::default(),
            group: None,
        }
    }

    #[tokio::test]
    async fn refused_connection_reports_down() {
        let m = monitor("127.0.0.1:1");
        let result = check(&m, "us-east", 1_000).await;
        assert_eq!(result.status, CheckStatus::Down);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn strips_tcp_scheme_prefix() {
        let m = monitor("tcp://127.0.0.1:1");
        let result = check(&m, "us-east", 1_000).await;
        assert_eq!(result.status, CheckStatus::Down);
    }
}
