//! `pulsegrid`: a distributed uptime-and-latency monitor. Regional probes,
//! an aggregator, and a read-only query layer communicate exclusively
//! through the central keyed store (`store`/`keys`/`models`) — no
//! component calls back into another in-process.

pub mod aggregator;
pub mod catchers;
pub mod config;
pub mod keys;
pub mod models;
pub mod notifier;
pub mod probe;
pub mod query;
pub mod store;
