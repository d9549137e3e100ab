//! CORS fairing: origin `*`, methods `GET, OPTIONS`, headers `Content-Type,
//! Authorization`. The fairing decorates every response with these headers;
//! the OPTIONS preflight itself is answered by mounting
//! `rocket_cors::catch_all_options_routes()` alongside it (see
//! `bin/server.rs`), since Rocket won't route a bare OPTIONS request to a
//! `GET` handler on its own.

use rocket_cors::{AllowedHeaders, AllowedOrigins, CorsOptions, Method};
use std::str::FromStr;

pub fn fairing() -> rocket_cors::Cors {
    let allowed_methods: Vec<Method> = ["GET", "OPTIONS"]
        .iter()
        .map(|m| Method::from_str(m).unwrap())
        .collect();

    CorsOptions {
        allowed_origins: AllowedOrigins::all(),
        allowed_methods: allowed_methods.into_iter().collect(),
        allowed_headers: AllowedHeaders::some(&["Content-Type", "Authorization"]),
        allow_credentials: false,
        ..Default::default()
    }
    .to_cors()
    .expect("invalid CORS configuration")
}
