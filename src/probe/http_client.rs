//! HTTP probing with phase timings. DNS lookup → TCP connect → TLS handshake
//! → TTFB → content download → total, each a real wall-clock interval when
//! libcurl is available (feature `timings-curl`, default-on); otherwise the
//! combined connect+TLS span is split 60/40 and the result is flagged via
//! `TimingMetrics::approximated`.

use crate::models::{CheckMethod, CheckResult, CheckStatus, MonitorTarget, TimingMetrics};
use crate::probe::errors;
use std::time::Instant;

pub struct TimedHttpClient {
    client: reqwest::Client,
}

/// Stable identifier sent as `User-Agent` on every probe request, curl and
/// reqwest paths alike — the target is explicit, so neither path follows
/// redirects.
const USER_AGENT: &str = "pulsegrid/0.1";

impl TimedHttpClient {
    pub fn new() -> reqwest::Result<Self> {
        Ok(TimedHttpClient {
            client: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .user_agent(USER_AGENT)
                .build()?,
        })
    }

    pub async fn check(&self, monitor: &MonitorTarget, region: &str, now_ms: u64) -> CheckResult {
        #[cfg(feature = "timings-curl")]
        {
            // curl's Easy::perform is blocking; run it on a blocking thread
            // so it never stalls the tokio runtime the rest of a region's
            // fan-out is sharing.
            let owned = monitor.clone();
            let outcome = tokio::task::spawn_blocking(move || Self::check_with_curl(&owned)).await;
            match outcome {
                // A result here — up or down — came from an actual probe
                // attempt; report it rather than re-probing via reqwest.
                Ok(Ok((status, timing, error))) => {
                    return CheckResult {
                        monitor_id: monitor.id.clone(),
                        region: region.to_string(),
                        timestamp_ms: now_ms,
                        status,
                        latency_ms: timing.total,
                        timing,
                        error,
                    };
                }
                // Only a libcurl setup/handle failure (not a probe outcome)
                // falls through to the approximating reqwest path.
                Ok(Err(err)) => {
                    eprintln!("⚠️  curl setup failed for {}, falling back to reqwest: {err}", monitor.id);
                }
                Err(join_err) => {
                    eprintln!("⚠️  curl timing task panicked for {}, falling back to reqwest: {join_err}", monitor.id);
                }
            }
        }

        self.check_with_reqwest(monitor, region, now_ms).await
    }

    /// Approximating fallback: single reqwest round trip, phases reconstructed
    /// from two wall-clock samples (request-build vs first-byte) and flagged.
    async fn check_with_reqwest(&self, monitor: &MonitorTarget, region: &str, now_ms: u64) -> CheckResult {
        let method = monitor.method.as_reqwest().unwrap_or("GET");
        let start = Instant::now();

        let mut req = self
            .client
            .request(method.parse().unwrap_or(reqwest::Method::GET), &monitor.target)
            .timeout(std::time::Duration::from_millis(monitor.effective_timeout_ms() as u64));

        if let Some(headers) = &monitor.headers {
            for (k, v) in headers {
                req = req.header(k, v);
            }
        }
        if monitor.method.allows_body() {
            if let Some(body) = &monitor.body {
                req = req.body(body.clone());
            }
        }

        let result = req.send().await;
        let connect_done = Instant::now();

        let (status, error) = match result {
            Ok(resp) => {
                let code = resp.status().as_u16();
                match resp.text().await {
                    Ok(body) => errors::validate_response(monitor, code, &body)
                        .map(|msg| (CheckStatus::Down, Some(msg)))
                        .unwrap_or((CheckStatus::Up, None)),
                    Err(e) => (CheckStatus::Down, Some(format!("Connection failed: {e}"))),
                }
            }
            Err(e) => (CheckStatus::Down, Some(errors::categorize_reqwest_error(&e))),
        };

        let total = connect_done.duration_since(start).as_millis() as u64;
        let timing = approximate_timing(total);

        CheckResult {
            monitor_id: monitor.id.clone(),
            region: region.to_string(),
            timestamp_ms: now_ms,
            status,
            latency_ms: total,
            timing,
            error,
        }
    }

    /// Runs one curl-backed probe attempt. The outer `Result::Err` is
    /// reserved for handle-setup failures (malformed option, not a probe
    /// outcome) that should fall back to the approximating reqwest path;
    /// everything from DNS failure through a successful response is a
    /// probe outcome and comes back as `Ok((status, timing, error))`.
    #[cfg(feature = "timings-curl")]
    fn check_with_curl(monitor: &MonitorTarget) -> Result<(CheckStatus, TimingMetrics, Option<String>), String> {
        use curl::easy::{Easy, List};
        use std::sync::{Arc, Mutex};

        let mut handle = Easy::new();
        handle.url(&monitor.target).map_err(|e| e.to_string())?;
        handle.useragent(USER_AGENT).map_err(|e| e.to_string())?;
        handle
            .timeout(std::time::Duration::from_millis(monitor.effective_timeout_ms() as u64))
            .map_err(|e| e.to_string())?;

        match monitor.method {
            CheckMethod::Head => handle.nobody(true).map_err(|e| e.to_string())?,
            CheckMethod::Post => handle.post(true).map_err(|e| e.to_string())?,
            CheckMethod::Put | CheckMethod::Patch | CheckMethod::Delete | CheckMethod::Options => {
                handle.custom_request(monitor.method.as_reqwest().unwrap_or("GET")).map_err(|e| e.to_string())?
            }
            _ => handle.get(true).map_err(|e| e.to_string())?,
        }

        if let Some(body) = &monitor.body {
            if monitor.method.allows_body() {
                let mut bytes = body.clone().into_bytes();
                handle.post_field_size(bytes.len() as u64).map_err(|e| e.to_string())?;
                handle
                    .read_function(move |into| {
                        let n = into.len().min(bytes.len());
                        into[..n].copy_from_slice(&bytes[..n]);
                        bytes.drain(..n);
                        Ok(n)
                    })
                    .map_err(|e| e.to_string())?;
            }
        }

        if let Some(headers) = &monitor.headers {
            let mut list = List::new();
            for (k, v) in headers {
                list.append(&format!("{k}: {v}")).map_err(|e| e.to_string())?;
            }
            handle.http_headers(list).map_err(|e| e.to_string())?;
        }

        let body = Arc::new(Mutex::new(Vec::new()));
        {
            let body = body.clone();
            handle
                .write_function(move |data| {
                    body.lock().unwrap().extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(|e| e.to_string())?;
        }

        let secs_to_ms = |v: f64| (v.max(0.0) * 1000.0).round() as u64;

        if let Err(perform_err) = handle.perform() {
            // DNS/connect/TLS/timeout failures land here. Report whatever
            // phases libcurl actually measured before the failure rather
            // than zeroing everything out.
            let dns_lookup = handle.namelookup_time().map(|d| secs_to_ms(d.as_secs_f64())).unwrap_or(0);
            let total_ms = handle
                .total_time()
                .map(|d| secs_to_ms(d.as_secs_f64()))
                .unwrap_or(dns_lookup)
                .max(dns_lookup);
            let timing = TimingMetrics {
                dns_lookup,
                total: total_ms,
                ..Default::default()
            };
            return Ok((CheckStatus::Down, timing, Some(crate::probe::errors::categorize_curl_error(&perform_err))));
        }

        let status_code = handle.response_code().map_err(|e| e.to_string())? as u16;
        let dns = handle.namelookup_time().map_err(|e| e.to_string())?.as_secs_f64();
        let connect = handle.connect_time().map_err(|e| e.to_string())?.as_secs_f64();
        let appconnect = handle.appconnect_time().map_err(|e| e.to_string())?.as_secs_f64();
        let starttransfer = handle.starttransfer_time().map_err(|e| e.to_string())?.as_secs_f64();
        let total = handle.total_time().map_err(|e| e.to_string())?.as_secs_f64();

        let dns_lookup = secs_to_ms(dns);
        let tcp_connect = secs_to_ms((connect - dns).max(0.0));
        // No TLS for plain HTTP: appconnect_time equals connect_time then.
        let tls_handshake = secs_to_ms((appconnect - connect).max(0.0));
        let ttfb = secs_to_ms((starttransfer - appconnect).max(0.0));
        let total_ms = secs_to_ms(total);
        let content_download = total_ms.saturating_sub(dns_lookup + tcp_connect + tls_handshake + ttfb);

        let timing = TimingMetrics {
            dns_lookup,
            tcp_connect,
            tls_handshake,
            ttfb,
            content_download,
            total: total_ms,
            approximated: false,
        };

        let body_str = String::from_utf8_lossy(&body.lock().unwrap()).into_owned();
        let validation = crate::probe::errors::validate_response(monitor, status_code, &body_str);
        let status = if validation.is_none() { CheckStatus::Up } else { CheckStatus::Down };

        Ok((status, timing, validation))
    }
}

/// 60/40 split of total latency into an assumed connect+TLS phase versus
/// TTFB+download, flagged as approximated rather than presented as measured.
fn approximate_timing(total_ms: u64) -> TimingMetrics {
    let connect_phase = (total_ms as f64 * 0.6).round() as u64;
    let remainder = total_ms.saturating_sub(connect_phase);
    TimingMetrics {
        dns_lookup: 0,
        tcp_connect: connect_phase * 6 / 10,
        tls_handshake: connect_phase * 4 / 10,
        ttfb: remainder,
        content_download: 0,
        total: total_ms,
        approximated: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approximate_timing_flags_result_and_sums_to_total() {
        let t = approximate_timing(1000);
        assert!(t.approximated);
        assert_eq!(t.tcp_connect + t.tls_handshake + t.ttfb + t.content_download, 1000);
    }
}
