pub mod classify;
pub mod config;
pub mod constants;
#[cfg(feature = "db")]
pub mod db;
pub mod domain;
pub mod error;
pub mod logging;
pub mod observability;

// Application layer (use cases and ports) and its adapters
pub mod app;
pub mod infra;
