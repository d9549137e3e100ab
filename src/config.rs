//! Process-wide configuration, loaded once from the environment by every
//! binary. A local `.env` is honored in development via `dotenvy`; in
//! production the real process environment is used as-is.

use crate::models::{MaintenanceWindow, MonitorTarget, NotificationConfig, PageConfig, PasswordProtection};

pub struct AppConfig {
    pub monitors: Vec<MonitorTarget>,
    pub notification: NotificationConfig,
    pub maintenances: Vec<MaintenanceWindow>,
    pub page: Option<PageConfig>,
    pub password_protection: Option<PasswordProtection>,
    pub table_name: String,
    pub central_region: String,
}

impl AppConfig {
    /// Load and validate every configuration surface. Aborts the process
    /// with a clear diagnostic on any parse failure rather than continuing
    /// with stale or partial assumptions about monitors/regions.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let monitors = env_json::<Vec<MonitorTarget>>("MONITORS_CONFIG")
            .unwrap_or_default()
            .into_iter()
            .map(MonitorTarget::normalized)
            .collect();

        let notification = env_json::<NotificationConfig>("NOTIFICATION_CONFIG").unwrap_or_default();

        let maintenances = env_json::<Vec<MaintenanceWindow>>("MAINTENANCES_CONFIG").unwrap_or_default();

        let page = env_json::<serde_json::Value>("PAGE_CONFIG").map(PageConfig);

        let password_protection = std::env::var("PASSWORD_PROTECTION")
            .ok()
            .and_then(|raw| PasswordProtection::parse(&raw));

        let table_name = std::env::var("TABLE_NAME").unwrap_or_else(|_| "pulsegrid.db".into());
        let central_region = std::env::var("CENTRAL_REGION").unwrap_or_else(|_| "global".into());

        println!(
            "⚙️  loaded config: {} monitor(s), table={table_name}, central_region={central_region}",
            monitors.len()
        );

        AppConfig {
            monitors,
            notification,
            maintenances,
            page,
            password_protection,
            table_name,
            central_region,
        }
    }

    pub fn monitor(&self, id: &str) -> Option<&MonitorTarget> {
        self.monitors.iter().find(|m| m.id == id)
    }
}

/// Parse a JSON-valued environment variable. Returns `None` if the variable
/// is unset; aborts the process if it is set but fails to parse, since an
/// invocation running on broken config cannot safely act on stale
/// assumptions about monitors/regions.
fn env_json<T: serde::de::DeserializeOwned>(var: &str) -> Option<T> {
    match std::env::var(var) {
        Err(_) => None,
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                eprintln!("❌ failed to parse {var}: {err}");
                std::process::exit(1);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_json_returns_none_when_unset() {
        std::env::remove_var("PULSEGRID_TEST_UNSET_VAR");
        let v: Option<Vec<MonitorTarget>> = env_json("PULSEGRID_TEST_UNSET_VAR");
        assert!(v.is_none());
    }
}
