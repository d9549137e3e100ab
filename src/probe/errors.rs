//! Error categorization for probe results, per the fixed vocabulary a
//! consuming status page keys its iconography off of: `DNS resolution
//! failed`, `Host not found`, `Connection refused`, `Request timeout`,
//! `TLS/SSL error`, `HTTP <code> (expected …)`, the two keyword-validation
//! messages, and a `Connection failed: <raw>` catch-all.

use crate::models::MonitorTarget;

pub fn status_mismatch(code: u16, expected: &[u16]) -> String {
    format!("HTTP {code} (expected {expected:?})")
}

pub fn missing_keyword(keyword: &str) -> String {
    format!("Response missing required keyword: {keyword}")
}

pub fn forbidden_keyword(keyword: &str) -> String {
    format!("Response contains forbidden keyword: {keyword}")
}

/// Categorize a `reqwest::Error` by inspecting its classification methods
/// first and falling back to a substring sniff of the underlying message
/// (reqwest does not expose a granular DNS-vs-TLS-vs-refused error kind of
/// its own).
pub fn categorize_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return "Request timeout".to_string();
    }
    let raw = err.to_string();
    let lower = raw.to_lowercase();
    if err.is_connect() {
        if lower.contains("dns error") || lower.contains("failed to lookup address") {
            return if is_host_not_found(&lower) {
                "Host not found".to_string()
            } else {
                "DNS resolution failed".to_string()
            };
        }
        if lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl") {
            return "TLS/SSL error".to_string();
        }
        if lower.contains("refused") {
            return "Connection refused".to_string();
        }
    }
    format!("Connection failed: {raw}")
}

fn is_host_not_found(lower: &str) -> bool {
    lower.contains("nodename nor servname")
        || lower.contains("no such host")
        || lower.contains("name or service not known")
        || lower.contains("not found")
}

/// Categorize a `curl::Error`, using libcurl's own classification codes
/// where present rather than sniffing message text.
#[cfg(feature = "timings-curl")]
pub fn categorize_curl_error(err: &curl::Error) -> String {
    if err.is_operation_timedout() {
        "Request timeout".to_string()
    } else if err.is_couldnt_resolve_host() || err.is_couldnt_resolve_proxy() {
        "Host not found".to_string()
    } else if err.is_ssl_connect_error() || err.is_ssl_certproblem() || err.is_ssl_cacert() || err.is_peer_failed_verification() {
        "TLS/SSL error".to_string()
    } else if err.is_couldnt_connect() {
        "Connection refused".to_string()
    } else {
        format!("Connection failed: {err}")
    }
}

/// Categorize a TCP-side `std::io::Error` from a bare connect attempt.
pub fn categorize_connect_io_error(err: &std::io::Error) -> String {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::ConnectionRefused => "Connection refused".to_string(),
        ErrorKind::TimedOut => "Request timeout".to_string(),
        _ => format!("Connection failed: {err}"),
    }
}

/// Categorize a DNS-resolution failure ahead of a TCP connect attempt.
pub fn categorize_dns_io_error(err: &std::io::Error) -> String {
    let lower = err.to_string().to_lowercase();
    if is_host_not_found(&lower) {
        "Host not found".to_string()
    } else {
        "DNS resolution failed".to_string()
    }
}

/// First-failure-wins response validation: status membership, then required
/// keyword, then forbidden keyword. Returns the categorized error string of
/// the first failing check, if any.
pub fn validate_response(monitor: &MonitorTarget, status_code: u16, body: &str) -> Option<String> {
    if !monitor.expected_codes.contains(&status_code) {
        return Some(status_mismatch(status_code, &monitor.expected_codes));
    }
    if let Some(keyword) = &monitor.response_keyword {
        if !body.contains(keyword.as_str()) {
            return Some(missing_keyword(keyword));
        }
    }
    if let Some(forbidden) = &monitor.response_forbidden_keyword {
        if body.contains(forbidden.as_str()) {
            return Some(forbidden_keyword(forbidden));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckMethod;

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
            response_keyword: Some("ok".into()),
            response_forbidden_keyword: Some("error".into()),
            regions: vec!["us-east".into()],
            primary_region: "us-east".into(),
            latency_threshold_ms: None,
            alerting: Default::default(),
            group: None,
        }
    }

    #[test]
    fn validate_response_checks_status_before_keywords() {
        let m = monitor();
        assert_eq!(validate_response(&m, 500, "ok"), Some("HTTP 500 (expected [200])".to_string()));
    }

    #[test]
    fn validate_response_requires_keyword_before_forbidden_check() {
        let m = monitor();
        assert_eq!(
            validate_response(&m, 200, "all good"),
            Some("Response missing required keyword: ok".to_string())
        );
        assert_eq!(
            validate_response(&m, 200, "ok but error present"),
            Some("Response contains forbidden keyword: error".to_string())
        );
        assert_eq!(validate_response(&m, 200, "ok and clean"), None);
    }

    #[test]
    fn categorize_connect_io_error_maps_refused() {
        let err = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert_eq!(categorize_connect_io_error(&err), "Connection refused");
    }
}
