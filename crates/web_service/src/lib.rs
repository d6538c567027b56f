//! web_service - HTTP surface of the survey bot
//!
//! `/` takes Bot API webhook updates (POST) and answers health checks (GET),
//! `/dispatch-delayed` is the push-schedule callback and `/cron` drains the
//! fallback queue.

pub mod config;
pub mod controllers;
pub mod error;
pub mod middleware;
pub mod server;
pub mod services;

pub use config::AppConfig;
pub use server::{app_config, run, AppState};
