use std::sync::Arc;

use anyhow::Result;
use axum::http::HeaderMap;
use axum::Router;
use serde::Serialize;

use crate::api::HttpBackend;
use crate::cache::{ResourceCache, ResourceState};
use crate::mutations::MutationClient;
use crate::roles::Role;
use crate::{ApiError, Config, FetchError};

mod health;
mod records;
mod tankage;
mod visibility;

// ---

/// Header carrying the role claim from the session layer.
pub const ROLE_HEADER: &str = "x-dashboard-role";

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ResourceCache<HttpBackend>>,
    pub mutations: Arc<MutationClient<HttpBackend>>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        // ---
        let backend = HttpBackend::new(&config)?;
        let cache = Arc::new(ResourceCache::new(backend.clone(), config.cache_policy()));
        let mutations = Arc::new(MutationClient::new(backend, cache.invalidator()));
        Ok(Self {
            cache,
            mutations,
            config,
        })
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(tankage::router())
        .merge(visibility::router())
        .merge(records::router())
        .merge(health::router())
        .with_state(state)
}

/// Role from the request; a missing header counts as unrecognised.
fn role_from(headers: &HeaderMap) -> Role {
    // ---
    headers
        .get(ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(Role::parse)
        .unwrap_or(Role::Unrecognized)
}

/// Response body for cached data: the data plus whether it is stale and why.
#[derive(Debug, Serialize)]
pub struct DataView<T> {
    pub data: T,
    pub stale: bool,
    pub error: Option<String>,
}

/// Turn a cache state into a response body. Stale data with an error is
/// still served; with no data at all the error becomes the response.
fn into_view<T, U>(
    resource: ResourceState<T>,
    build: impl FnOnce(T) -> U,
) -> Result<DataView<U>, ApiError> {
    // ---
    match resource.data {
        Some(data) => Ok(DataView {
            data: build(data),
            stale: resource.is_stale || resource.is_error,
            error: resource.error.map(|e| e.to_string()),
        }),
        None => Err(ApiError::Upstream(
            resource
                .error
                .unwrap_or_else(|| FetchError::Network("no data available".to_string())),
        )),
    }
}
