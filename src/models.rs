//! Data model shared by every component: config structs read once at process
//! start, and the store records the probe/aggregator sides exchange through
//! `crate::store::CentralStore`. See `crate::keys` for how these map onto
//! `(pk, sk)`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Monitor configuration (read-only input) ─────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    #[serde(rename = "TCP_PING")]
    TcpPing,
}

impl CheckMethod {
    pub fn allows_body(self) -> bool {
        matches!(self, CheckMethod::Post | CheckMethod::Put | CheckMethod::Patch)
    }

    pub fn as_reqwest(self) -> Option<&'static str> {
        match self {
            CheckMethod::Get => Some("GET"),
            CheckMethod::Post => Some("POST"),
            CheckMethod::Put => Some("PUT"),
            CheckMethod::Patch => Some("PATCH"),
            CheckMethod::Delete => Some("DELETE"),
            CheckMethod::Head => Some("HEAD"),
            CheckMethod::Options => Some("OPTIONS"),
            CheckMethod::TcpPing => None,
        }
    }
}

fn default_expected_codes() -> Vec<u16> {
    (200..=206).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    #[serde(default)]
    pub down_vote_threshold: Option<u32>,
    #[serde(default = "default_grace_down_ms")]
    pub grace_down_ms: u64,
    #[serde(default = "default_grace_slow_ms")]
    pub grace_slow_ms: u64,
    #[serde(default)]
    pub spike_detection: bool,
    #[serde(default = "default_baseline_window_minutes")]
    pub baseline_window_minutes: u32,
    #[serde(default = "default_spike_threshold_percent")]
    pub spike_threshold_percent: f64,
}

fn default_grace_down_ms() -> u64 {
    5 * 60_000
}
fn default_grace_slow_ms() -> u64 {
    3 * 60_000
}
fn default_baseline_window_minutes() -> u32 {
    30
}
fn default_spike_threshold_percent() -> f64 {
    200.0
}

impl Default for AlertingConfig {
    fn default() -> Self {
        AlertingConfig {
            down_vote_threshold: None,
            grace_down_ms: default_grace_down_ms(),
            grace_slow_ms: default_grace_slow_ms(),
            spike_detection: false,
            baseline_window_minutes: default_baseline_window_minutes(),
            spike_threshold_percent: default_spike_threshold_percent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorTarget {
    pub id: String,
    pub name: String,
    pub method: CheckMethod,
    pub target: String,
    #[serde(default)]
    pub timeout_ms: Option<u32>,
    #[serde(default = "default_expected_codes")]
    pub expected_codes: Vec<u16>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub response_keyword: Option<String>,
    #[serde(default)]
    pub response_forbidden_keyword: Option<String>,
    pub regions: Vec<String>,
    pub primary_region: String,
    #[serde(default)]
    pub latency_threshold_ms: Option<u32>,
    #[serde(default)]
    pub alerting: AlertingConfig,
    #[serde(default)]
    pub group: Option<String>,
}

impl MonitorTarget {
    /// Timeout default differs by method per the HTTP-vs-TCP split: 10s HTTP,
    /// 5s TCP. Used whenever `timeout_ms` was left unset in config.
    pub fn effective_timeout_ms(&self) -> u32 {
        self.timeout_ms.unwrap_or(if self.method == CheckMethod::TcpPing {
            5_000
        } else {
            10_000
        })
    }

    /// Ensure `primary_region` is a member of `regions`, inserting it if the
    /// config declared it outside the list.
    pub fn normalized(mut self) -> Self {
        if !self.regions.iter().any(|r| r == &self.primary_region) {
            self.regions.push(self.primary_region.clone());
        }
        self
    }
}

// ── Timing & check results ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimingMetrics {
    pub dns_lookup: u64,
    pub tcp_connect: u64,
    pub tls_handshake: u64,
    pub ttfb: u64,
    pub content_download: u64,
    pub total: u64,
    /// Set when TCP/TLS phases were derived via the 60/40 fallback split
    /// rather than measured directly — disclose the approximation, don't
    /// hide it behind plausible-looking numbers.
    #[serde(default)]
    pub approximated: bool,
}

impl TimingMetrics {
    pub fn dns_only(dns_lookup: u64) -> Self {
        TimingMetrics {
            dns_lookup,
            total: dns_lookup,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub monitor_id: String,
    pub region: String,
    pub timestamp_ms: u64,
    pub status: CheckStatus,
    pub latency_ms: u64,
    pub timing: TimingMetrics,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyHistoryPoint {
    pub monitor_id: String,
    pub region: String,
    pub timestamp_ms: u64,
    pub latency_ms: u64,
    pub timing: TimingMetrics,
}

// ── Aggregator-owned state ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Up,
    Degraded,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionStatus {
    pub status: CheckStatus,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorState {
    pub monitor_id: String,
    pub status: MonitorStatus,
    pub primary_latency: u64,
    pub primary_timing: TimingMetrics,
    pub region_statuses: HashMap<String, RegionStatus>,
    pub last_check_ms: u64,
    #[serde(default)]
    pub down_since_ms: Option<u64>,
    #[serde(default)]
    pub slow_since_ms: Option<u64>,
    #[serde(default)]
    pub last_notified_down_ms: Option<u64>,
    #[serde(default)]
    pub last_notified_slow_ms: Option<u64>,
}

impl MonitorState {
    pub fn new(monitor_id: impl Into<String>) -> Self {
        MonitorState {
            monitor_id: monitor_id.into(),
            status: MonitorStatus::Up,
            primary_latency: 0,
            primary_timing: TimingMetrics::default(),
            region_statuses: HashMap::new(),
            last_check_ms: 0,
            down_since_ms: None,
            slow_since_ms: None,
            last_notified_down_ms: None,
            last_notified_slow_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub monitor_id: String,
    pub start_ms: u64,
    #[serde(default)]
    pub end_ms: Option<u64>,
    pub error: String,
    pub regions_down: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalSummary {
    pub overall_up: u32,
    pub overall_down: u32,
    pub overall_degraded: u32,
    pub last_update_ms: u64,
}

// ── Notification / webhook configuration ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadType {
    Json,
    #[serde(rename = "x-www-form-urlencoded")]
    FormUrlEncoded,
    Param,
}

fn default_webhook_method() -> String {
    "POST".into()
}
fn default_webhook_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_webhook_method")]
    pub method: String,
    pub payload_type: PayloadType,
    /// Template map; values containing the literal `$MSG` are substituted
    /// with the rendered notification message before encoding.
    pub payload: HashMap<String, serde_json::Value>,
    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_grace_period_minutes() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default = "default_grace_period_minutes")]
    pub grace_period: u64,
    #[serde(default)]
    pub skip_ids: Vec<String>,
    #[serde(default)]
    pub skip_error_change_notification: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig {
            webhook: None,
            timezone: None,
            grace_period: default_grace_period_minutes(),
            skip_ids: Vec::new(),
            skip_error_change_notification: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    #[serde(default)]
    pub monitors: Option<Vec<String>>,
    #[serde(default)]
    pub title: Option<String>,
    pub body: String,
    pub start: u64,
    #[serde(default)]
    pub end: Option<u64>,
    #[serde(default)]
    pub color: Option<String>,
}

impl MaintenanceWindow {
    pub fn covers(&self, monitor_id: &str, now_ms: u64) -> bool {
        let in_window = self.start <= now_ms && self.end.map(|e| now_ms <= e).unwrap_or(true);
        if !in_window {
            return false;
        }
        match &self.monitors {
            None => true,
            Some(ids) => ids.iter().any(|m| m == monitor_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig(pub serde_json::Value);

#[derive(Debug, Clone)]
pub struct PasswordProtection {
    pub user: String,
    pub pass: String,
}

impl PasswordProtection {
    pub fn parse(raw: &str) -> Option<Self> {
        let (user, pass) = raw.split_once(':')?;
        Some(PasswordProtection {
            user: user.to_string(),
            pass: pass.to_string(),
        })
    }
}
