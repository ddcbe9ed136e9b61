//! HTTP service for linked-role metadata sync.
//!
//! Serves the landing page, hands out authorization links, completes the OAuth
//! callback and answers platform interactions (slash and message commands).

pub mod commands;
pub mod config;
pub mod interactions;
pub mod maintenance;
pub mod pages;
pub mod routes;
pub mod telemetry;

pub use config::Config;
pub use routes::{AppState, router};
