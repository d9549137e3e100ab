//! Regional probe entry point: a fresh process per invocation. Reads
//! `REGION` from the environment, runs one pass over every monitor assigned
//! to that region, writes observations to the central store, and exits.

use pulsegrid::config::AppConfig;
use pulsegrid::probe::driver;
use pulsegrid::store::CentralStore;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();
    let region = std::env::var("REGION").unwrap_or_else(|_| {
        eprintln!("❌ REGION environment variable is required");
        std::process::exit(1);
    });

    let store = Arc::new(
        CentralStore::open(&config.table_name).unwrap_or_else(|e| {
            eprintln!("❌ failed to open store at {}: {e}", config.table_name);
            std::process::exit(1);
        }),
    );

    let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64;
    let (ok, failed) = driver::run_region(store, config.monitors.clone(), region.clone(), now_ms).await;
    println!("✅ probe pass for region {region} complete: {ok} up, {failed} down/failed");
}
