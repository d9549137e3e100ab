pub mod driver;
pub mod errors;
pub mod http_client;
pub mod tcp_prober;
