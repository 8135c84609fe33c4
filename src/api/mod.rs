//! API Module
//!
//! HTTP handlers and routing for the cache admin API.
//!
//! # Endpoints
//! - `GET /health`, `GET /stats`, `GET /stats/strategies`
//! - `POST /invalidate`, `GET /invalidations`
//! - `POST /warmup`, `PUT /warmup/dashboard/:id`
//! - `DELETE /metrics`

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
