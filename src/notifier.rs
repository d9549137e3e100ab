//! Webhook notification dispatch: `$MSG` substitution into a payload
//! template, rendering as `json` / `x-www-form-urlencoded` / `param`, and
//! best-effort delivery (errors logged and swallowed). Message composition
//! is this module's responsibility too, grounded in the teacher's
//! `WebhookPayload`/`WebhookMonitor`/`WebhookIncident` shapes generalized to
//! carry the monitor/incident/spike context a template needs.

use crate::aggregator::spike::{SpikePhase, SpikeResult};
use crate::models::{MonitorTarget, NotificationConfig, PayloadType, WebhookConfig};
use std::collections::HashMap;
use std::time::Duration;

pub struct NotificationContext {
    pub monitor_id: String,
    pub monitor_name: String,
    pub event: &'static str,
    pub message: String,
}

impl NotificationContext {
    pub fn down(monitor: &MonitorTarget, since_ms: u64) -> Self {
        NotificationContext {
            monitor_id: monitor.id.clone(),
            monitor_name: monitor.name.clone(),
            event: "down",
            message: format!("🔴 {} is DOWN (since {since_ms})", monitor.name),
        }
    }

    pub fn up(monitor: &MonitorTarget) -> Self {
        NotificationContext {
            monitor_id: monitor.id.clone(),
            monitor_name: monitor.name.clone(),
            event: "up",
            message: format!("✅ {} has recovered", monitor.name),
        }
    }

    pub fn slow(monitor: &MonitorTarget, latency_ms: u64) -> Self {
        NotificationContext {
            monitor_id: monitor.id.clone(),
            monitor_name: monitor.name.clone(),
            event: "slow",
            message: format!("🐌 {} is slow ({latency_ms}ms)", monitor.name),
        }
    }

    pub fn fast_again(monitor: &MonitorTarget) -> Self {
        NotificationContext {
            monitor_id: monitor.id.clone(),
            monitor_name: monitor.name.clone(),
            event: "fast_again",
            message: format!("⚡ {} latency is back to normal", monitor.name),
        }
    }

    pub fn spike(monitor: &MonitorTarget, spike: &SpikeResult) -> Self {
        let phase = match spike.phase {
            SpikePhase::Dns => "DNS",
            SpikePhase::Tls => "TLS",
            SpikePhase::Ttfb => "TTFB",
            SpikePhase::Overall => "overall",
        };
        NotificationContext {
            monitor_id: monitor.id.clone(),
            monitor_name: monitor.name.clone(),
            event: "spike",
            message: format!(
                "📈 {} latency spike: {}ms vs {}ms baseline (+{:.0}%, {phase} phase)",
                monitor.name, spike.latest_ms, spike.baseline_ms, spike.percent_over_baseline
            ),
        }
    }
}

pub struct Notifier {
    client: reqwest::Client,
}

impl Notifier {
    pub fn new() -> reqwest::Result<Self> {
        Ok(Notifier {
            client: reqwest::Client::builder().build()?,
        })
    }

    pub async fn notify(&self, config: &NotificationConfig, ctx: &NotificationContext) {
        let Some(webhook) = &config.webhook else { return };
        if let Err(e) = self.send(webhook, ctx).await {
            eprintln!("📣 webhook delivery failed for {} ({}): {e}", ctx.monitor_id, ctx.event);
        } else {
            println!("📣 webhook delivered for {} ({})", ctx.monitor_id, ctx.event);
        }
    }

    async fn send(&self, webhook: &WebhookConfig, ctx: &NotificationContext) -> Result<(), String> {
        let rendered: HashMap<String, serde_json::Value> = webhook
            .payload
            .iter()
            .map(|(k, v)| (k.clone(), substitute_msg(v, &ctx.message)))
            .collect();

        let method: reqwest::Method = webhook.method.parse().map_err(|_| format!("invalid method {}", webhook.method))?;
        let timeout = Duration::from_millis(webhook.timeout_ms);

        let request = match webhook.payload_type {
            PayloadType::Json => self
                .client
                .request(method, &webhook.url)
                .timeout(timeout)
                .json(&rendered),
            PayloadType::FormUrlEncoded => {
                let flat = flatten(&rendered);
                self.client
                    .request(method, &webhook.url)
                    .timeout(timeout)
                    .form(&flat)
            }
            PayloadType::Param => {
                let flat = flatten(&rendered);
                let mut url = webhook.url.clone();
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(flat.iter())
                    .finish();
                if !query.is_empty() {
                    url.push(if url.contains('?') { '&' } else { '?' });
                    url.push_str(&query);
                }
                self.client.request(method, &url).timeout(timeout)
            }
        };

        let response = request.send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("webhook returned status {}", response.status()));
        }
        Ok(())
    }
}

/// Replace the literal `$MSG` inside string values (recursively through
/// arrays/objects); non-string values pass through untouched.
fn substitute_msg(value: &serde_json::Value, message: &str) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(s.replace("$MSG", message)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| substitute_msg(v, message)).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), substitute_msg(v, message))).collect(),
        ),
        other => other.clone(),
    }
}

/// Flatten a JSON value map into string pairs for form/query encoding.
/// Non-string scalars are stringified; nested objects/arrays are JSON-
/// encoded as a single field value since there is no natural flat form.
fn flatten(map: &HashMap<String, serde_json::Value>) -> Vec<(String, String)> {
    map.iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}
