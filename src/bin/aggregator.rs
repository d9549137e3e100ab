//! Aggregator entry point: a fresh process per invocation. Runs one tick —
//! vote, state machine, incident lifecycle, spike detection, notifications —
//! over every configured monitor, then exits.

use pulsegrid::aggregator;
use pulsegrid::config::AppConfig;
use pulsegrid::notifier::Notifier;
use pulsegrid::store::CentralStore;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();
    let store = Arc::new(
        CentralStore::open(&config.table_name).unwrap_or_else(|e| {
            eprintln!("❌ failed to open store at {}: {e}", config.table_name);
            std::process::exit(1);
        }),
    );
    let notifier = Notifier::new().unwrap_or_else(|e| {
        eprintln!("❌ failed to build notifier client: {e}");
        std::process::exit(1);
    });

    let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64;
    aggregator::run_tick(store, &config, &notifier, now_ms).await;
}
