//! Derived metrics for a fuel tankage dashboard, and the HTTP service that
//! serves them.
//!
//! The pure pieces (`metrics`, `transform`, `roles`, `models`) take plain
//! values and never fail. `cache` and `mutations` talk to the backend through
//! the `Fetcher` and `Mutator` traits; `api::HttpBackend` is the reqwest
//! implementation of both. `routes` ties everything to axum.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod mutations;
pub mod roles;
pub mod routes;
pub mod transform;

pub use config::Config;
pub use error::{ApiError, FetchError};
