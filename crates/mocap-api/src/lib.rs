//! Axum HTTP server for mocap render jobs.
//!
//! This crate provides:
//! - Job submission, status and download endpoints
//! - Static bearer token authentication
//! - Health and readiness probes
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
