//! Read-only HTTP API: status/data/history/incidents/badge/config/health.
//! Route shapes follow §6 of the external-interface contract exactly; the
//! surrounding JSON-error-catcher and route-module layout is carried from
//! the teacher's `routes/status.rs` and `catchers.rs`.

use rocket::serde::json::Json;
use rocket::{get, http::Status, State};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::AppConfig;
use crate::keys;
use crate::models::{GlobalSummary, Incident, LatencyHistoryPoint, MonitorState, MonitorStatus};
use crate::query::auth::BasicAuthGuard;
use crate::store::CentralStore;

const HISTORY_WINDOW_MS: u64 = 12 * 60 * 60 * 1_000;

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64
}

fn err(status: Status, message: impl Into<String>) -> (Status, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

/// A monitor is "in maintenance" iff some configured window covers it right
/// now; the `/api/status` status field reads `maintenance` in that case
/// regardless of the underlying vote-derived state.
fn maintenance_title(config: &AppConfig, monitor_id: &str, now: u64) -> Option<String> {
    config
        .maintenances
        .iter()
        .find(|w| w.covers(monitor_id, now))
        .map(|w| w.title.clone().unwrap_or_else(|| w.body.clone()))
}

#[get("/health")]
pub fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[get("/api/status")]
pub fn status(
    _auth: BasicAuthGuard,
    store: &State<Arc<CentralStore>>,
    config: &State<AppConfig>,
) -> Result<Json<serde_json::Value>, (Status, Json<serde_json::Value>)> {
    let now = now_ms();
    let summary: GlobalSummary = store
        .get(keys::GLOBAL_PK, keys::GLOBAL_STATE_SK, now)
        .map_err(|e| err(Status::InternalServerError, e.to_string()))?
        .unwrap_or_default();

    let mut monitors = serde_json::Map::new();
    for monitor in &config.monitors {
        let pk = keys::monitor_pk(&monitor.id);
        let state: Option<MonitorState> = store
            .get(&pk, keys::STATE_SK, now)
            .map_err(|e| err(Status::InternalServerError, e.to_string()))?;
        let maintenance = maintenance_title(config, &monitor.id, now);

        let status_label = if maintenance.is_some() {
            "maintenance".to_string()
        } else {
            match state.as_ref().map(|s| s.status) {
                Some(MonitorStatus::Up) | None => "up",
                Some(MonitorStatus::Degraded) => "degraded",
                Some(MonitorStatus::Down) => "down",
            }
            .to_string()
        };

        monitors.insert(
            monitor.id.clone(),
            serde_json::json!({
                "name": monitor.name,
                "status": status_label,
                "primaryRegion": monitor.primary_region,
                "latency": state.as_ref().map(|s| s.primary_latency),
                "timing": state.as_ref().map(|s| s.primary_timing),
                "regionStatuses": state.as_ref().map(|s| &s.region_statuses),
                "lastCheck": state.as_ref().map(|s| s.last_check_ms),
                "downSince": state.as_ref().and_then(|s| s.down_since_ms),
                "slowSince": state.as_ref().and_then(|s| s.slow_since_ms),
                "maintenance": maintenance,
            }),
        );
    }

    Ok(Json(serde_json::json!({
        "up": summary.overall_up,
        "down": summary.overall_down,
        "degraded": summary.overall_degraded,
        "updatedAt": summary.last_update_ms,
        "maintenances": config.maintenances,
        "monitors": monitors,
    })))
}

/// Compatibility projection consumed by older status-page widgets: just
/// `up`/`latency`/`location`/`message` per monitor, no region breakdown.
#[get("/api/data")]
pub fn data(
    _auth: BasicAuthGuard,
    store: &State<Arc<CentralStore>>,
    config: &State<AppConfig>,
) -> Result<Json<serde_json::Value>, (Status, Json<serde_json::Value>)> {
    let now = now_ms();
    let summary: GlobalSummary = store
        .get(keys::GLOBAL_PK, keys::GLOBAL_STATE_SK, now)
        .map_err(|e| err(Status::InternalServerError, e.to_string()))?
        .unwrap_or_default();

    let mut monitors = serde_json::Map::new();
    for monitor in &config.monitors {
        let pk = keys::monitor_pk(&monitor.id);
        let state: Option<MonitorState> = store
            .get(&pk, keys::STATE_SK, now)
            .map_err(|e| err(Status::InternalServerError, e.to_string()))?;
        let maintenance = maintenance_title(config, &monitor.id, now);

        let up = maintenance.is_none() && !matches!(state.as_ref().map(|s| s.status), Some(MonitorStatus::Down));
        let message = maintenance.unwrap_or_else(|| match state.as_ref().map(|s| s.status) {
            Some(MonitorStatus::Down) => "down".to_string(),
            Some(MonitorStatus::Degraded) => "degraded".to_string(),
            _ => "up".to_string(),
        });

        monitors.insert(
            monitor.id.clone(),
            serde_json::json!({
                "up": up,
                "latency": state.as_ref().map(|s| s.primary_latency).unwrap_or(0),
                "location": monitor.primary_region,
                "message": message,
            }),
        );
    }

    Ok(Json(serde_json::json!({
        "up": summary.overall_up,
        "down": summary.overall_down,
        "updatedAt": summary.last_update_ms,
        "maintenances": config.maintenances,
        "monitors": monitors,
    })))
}

#[get("/api/history/<id>?<region>")]
pub fn history(
    _auth: BasicAuthGuard,
    id: &str,
    region: Option<&str>,
    store: &State<Arc<CentralStore>>,
    config: &State<AppConfig>,
) -> Result<Json<serde_json::Value>, (Status, Json<serde_json::Value>)> {
    let monitor = config
        .monitor(id)
        .ok_or_else(|| err(Status::NotFound, "unknown monitor"))?;
    let now = now_ms();
    let window_start = now.saturating_sub(HISTORY_WINDOW_MS);
    let region = region.unwrap_or(&monitor.primary_region);

    let pk = keys::monitor_pk(id);
    let points: Vec<LatencyHistoryPoint> = store
        .query_prefix(&pk, &keys::latency_prefix(region), now, None)
        .map_err(|e| err(Status::InternalServerError, e.to_string()))?
        .into_iter()
        .filter(|p| p.timestamp_ms >= window_start)
        .collect();

    let data: Vec<_> = points
        .iter()
        .map(|p| serde_json::json!({ "time": p.timestamp_ms, "latency": p.latency_ms, "timing": p.timing }))
        .collect();

    Ok(Json(serde_json::json!({
        "monitorId": id,
        "region": region,
        "data": data,
    })))
}

#[get("/api/history/<id>/all")]
pub fn history_all(
    _auth: BasicAuthGuard,
    id: &str,
    store: &State<Arc<CentralStore>>,
    config: &State<AppConfig>,
) -> Result<Json<serde_json::Value>, (Status, Json<serde_json::Value>)> {
    let monitor = config
        .monitor(id)
        .ok_or_else(|| err(Status::NotFound, "unknown monitor"))?;
    let now = now_ms();
    let window_start = now.saturating_sub(HISTORY_WINDOW_MS);
    let pk = keys::monitor_pk(id);

    let mut regions = serde_json::Map::new();
    for region in &monitor.regions {
        let points: Vec<LatencyHistoryPoint> = store
            .query_prefix(&pk, &keys::latency_prefix(region), now, None)
            .map_err(|e| err(Status::InternalServerError, e.to_string()))?
            .into_iter()
            .filter(|p| p.timestamp_ms >= window_start)
            .collect();
        let data: Vec<_> = points
            .iter()
            .map(|p| serde_json::json!({ "time": p.timestamp_ms, "latency": p.latency_ms, "timing": p.timing }))
            .collect();
        regions.insert(region.clone(), serde_json::Value::Array(data));
    }

    Ok(Json(serde_json::json!({
        "monitorId": id,
        "primaryRegion": monitor.primary_region,
        "regions": regions,
    })))
}

#[get("/api/incidents?<monitorId>")]
#[allow(non_snake_case)]
pub fn incidents(
    _auth: BasicAuthGuard,
    monitorId: Option<&str>,
    store: &State<Arc<CentralStore>>,
    config: &State<AppConfig>,
) -> Result<Json<serde_json::Value>, (Status, Json<serde_json::Value>)> {
    let now = now_ms();
    let monitor_ids: Vec<&str> = match monitorId {
        Some(id) => vec![id],
        None => config.monitors.iter().map(|m| m.id.as_str()).collect(),
    };

    let mut all: Vec<Incident> = Vec::new();
    for id in monitor_ids {
        let pk = keys::monitor_pk(id);
        let found: Vec<Incident> = store
            .query_prefix(&pk, keys::INCIDENT_PREFIX, now, None)
            .map_err(|e| err(Status::InternalServerError, e.to_string()))?;
        all.extend(found);
    }
    all.sort_by(|a, b| b.start_ms.cmp(&a.start_ms));

    let mut by_month: HashMap<String, Vec<&Incident>> = HashMap::new();
    for incident in &all {
        by_month.entry(month_key(incident.start_ms)).or_default().push(incident);
    }

    Ok(Json(serde_json::json!({
        "incidents": all,
        "byMonth": by_month,
    })))
}

/// `"YYYY-MM"` bucket for an epoch-millisecond timestamp, UTC.
fn month_key(timestamp_ms: u64) -> String {
    let dt = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(timestamp_ms as i64)
        .unwrap_or_else(|| chrono::DateTime::<chrono::Utc>::from_timestamp(0, 0).unwrap());
    dt.format("%Y-%m").to_string()
}

/// Badge response wrapper: the `Json` body plus a `Cache-Control` header per
/// spec.md §4.7's "60-second cache" — `#[derive(Responder)]` treats the
/// first field as the body and the rest as headers.
#[derive(rocket::Responder)]
pub struct BadgeResponse {
    inner: Json<serde_json::Value>,
    cache_control: rocket::http::Header<'static>,
}

#[get("/api/badge?<id>&<label>&<up>&<down>&<colorUp>&<colorDown>")]
#[allow(non_snake_case)]
pub fn badge(
    id: Option<&str>,
    label: Option<&str>,
    up: Option<&str>,
    down: Option<&str>,
    colorUp: Option<&str>,
    colorDown: Option<&str>,
    store: &State<Arc<CentralStore>>,
    config: &State<AppConfig>,
) -> Result<BadgeResponse, (Status, Json<serde_json::Value>)> {
    let id = id.ok_or_else(|| err(Status::BadRequest, "missing id"))?;
    let monitor = config
        .monitor(id)
        .ok_or_else(|| err(Status::NotFound, "unknown monitor"))?;
    let now = now_ms();

    let pk = keys::monitor_pk(id);
    let state: Option<MonitorState> = store
        .get(&pk, keys::STATE_SK, now)
        .map_err(|e| err(Status::InternalServerError, e.to_string()))?;
    let is_down = matches!(state.as_ref().map(|s| s.status), Some(MonitorStatus::Down));

    let message = if is_down {
        down.unwrap_or("down")
    } else {
        up.unwrap_or("up")
    };
    let color = if is_down {
        colorDown.unwrap_or("red")
    } else {
        colorUp.unwrap_or("brightgreen")
    };

    Ok(BadgeResponse {
        inner: Json(serde_json::json!({
            "schemaVersion": 1,
            "label": label.unwrap_or(&monitor.name),
            "message": message,
            "color": color,
        })),
        cache_control: rocket::http::Header::new("Cache-Control", "max-age=60"),
    })
}

#[get("/api/config")]
pub fn config_route(config: &State<AppConfig>) -> Json<serde_json::Value> {
    let monitors: Vec<_> = config
        .monitors
        .iter()
        .map(|m| {
            serde_json::json!({
                "id": m.id,
                "name": m.name,
                "regions": m.regions,
                "primaryRegion": m.primary_region,
                "group": m.group,
                "latencyThresholdMs": m.latency_threshold_ms,
            })
        })
        .collect();

    Json(serde_json::json!({
        "page": config.page.as_ref().map(|p| &p.0),
        "monitors": monitors,
        "maintenances": config.maintenances,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_key_formats_utc_year_month() {
        // 2024-03-15T00:00:00Z
        assert_eq!(month_key(1_710_460_800_000), "2024-03");
    }
}
