pub mod app;
pub mod config;
pub mod gate;
pub mod metrics;
