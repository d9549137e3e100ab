#[macro_use]
extern crate rocket;

use pulsegrid::catchers;
use pulsegrid::config::AppConfig;
use pulsegrid::query::{cors, routes};
use pulsegrid::store::CentralStore;
use std::sync::Arc;

/// Long-lived query-layer server, unlike the probe and aggregator which are
/// fresh processes per tick — the front end calls this synchronously.
#[launch]
fn rocket() -> _ {
    let config = AppConfig::from_env();
    let store = Arc::new(
        CentralStore::open(&config.table_name).expect("failed to open central store"),
    );

    let cors = cors::fairing();

    rocket::build()
        .manage(store)
        .manage(config)
        .mount(
            "/",
            routes![
                routes::health,
                routes::status,
                routes::data,
                routes::history,
                routes::history_all,
                routes::incidents,
                routes::badge,
                routes::config_route,
            ],
        )
        // `rocket_cors`'s fairing only decorates responses from routes that
        // already exist; Rocket never matches a bare OPTIONS request to a
        // GET handler, so the catch-all preflight routes are mounted
        // alongside it to actually answer the 200 short-circuit.
        .mount("/", rocket_cors::catch_all_options_routes())
        .register(
            "/",
            catchers![
                catchers::bad_request,
                catchers::unauthorized,
                catchers::forbidden,
                catchers::not_found,
                catchers::unprocessable_entity,
                catchers::too_many_requests,
                catchers::internal_error,
            ],
        )
        .attach(cors)
}
