//! Axum HTTP surface for the render-job service (component C6).
//!
//! This crate provides:
//! - The public REST API: enqueue, status polling, output download, batch archive
//! - Owner fingerprinting and per-owner fairness admission control
//! - CORS, security headers, request IDs, and access logging
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
