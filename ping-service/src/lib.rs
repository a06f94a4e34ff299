pub mod client;
pub mod config;
pub mod pinger;
pub mod rate_limiter;
pub mod record;
pub mod schedule;
pub mod stats;
