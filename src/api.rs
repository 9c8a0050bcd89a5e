//! Tankage backend: resource keys, endpoint catalog and the HTTP client.
//!
//! The backend is a black box returning JSON. This module only knows where
//! things live, how to ask for them, and which collection each resource
//! depends on so that mutations can invalidate the right cache entries.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use anyhow::Result;
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;

use crate::cache::Fetcher;
use crate::error::FetchError;
use crate::mutations::{MutationRequest, Mutator};
use crate::Config;

// ---

/// Backend collections. Each cached resource depends on one or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Tanks,
    Readings,
    Shipments,
    Alerts,
    Maintenance,
    Users,
    Audit,
}

impl Collection {
    pub fn parse(s: &str) -> Option<Self> {
        // ---
        Some(match s {
            "tanks" => Collection::Tanks,
            "readings" => Collection::Readings,
            "shipments" => Collection::Shipments,
            "alerts" => Collection::Alerts,
            "maintenance" => Collection::Maintenance,
            "users" => Collection::Users,
            "audit" => Collection::Audit,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Tanks => "tanks",
            Collection::Readings => "readings",
            Collection::Shipments => "shipments",
            Collection::Alerts => "alerts",
            Collection::Maintenance => "maintenance",
            Collection::Users => "users",
            Collection::Audit => "audit",
        }
    }

    /// Collections the dashboard may create, update or delete.
    pub fn is_mutable(&self) -> bool {
        matches!(
            self,
            Collection::Shipments | Collection::Alerts | Collection::Maintenance | Collection::Users
        )
    }

    /// Key of the list envelope in the collection's `GET` response; `None`
    /// when the body is a bare array.
    pub fn envelope(&self) -> Option<&'static str> {
        match self {
            Collection::Tanks => Some("tanks"),
            Collection::Readings => None,
            Collection::Shipments => Some("shipments"),
            Collection::Alerts => Some("alertData"),
            Collection::Maintenance => Some("tasks"),
            Collection::Users => Some("users"),
            Collection::Audit => Some("logs"),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a cached resource: endpoint plus sorted query parameters.
///
/// Equality and hashing ignore `depends_on`, which is derived from the
/// endpoint catalog and therefore the same for equal keys.
#[derive(Debug, Clone)]
pub struct ResourceKey {
    endpoint: String,
    params: BTreeMap<String, String>,
    depends_on: BTreeSet<Collection>,
}

impl ResourceKey {
    /// Key for `endpoint`; `/api/<collection>` endpoints depend on that
    /// collection automatically.
    pub fn new(endpoint: impl Into<String>) -> Self {
        // ---
        let endpoint = endpoint.into();
        let depends_on = endpoint
            .trim_start_matches("/api/")
            .split('/')
            .next()
            .and_then(Collection::parse)
            .into_iter()
            .collect();
        Self {
            endpoint,
            params: BTreeMap::new(),
            depends_on,
        }
    }

    /// Add a query parameter. Empty values are left out so that "no filter"
    /// and "empty filter" share one cache entry.
    pub fn param(mut self, name: &str, value: impl ToString) -> Self {
        // ---
        let value = value.to_string();
        if !value.trim().is_empty() {
            self.params.insert(name.to_string(), value.trim().to_string());
        }
        self
    }

    pub fn param_opt<V: ToString>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.param(name, v),
            None => self,
        }
    }

    pub fn depending_on(mut self, collection: Collection) -> Self {
        self.depends_on.insert(collection);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn depends_on(&self, collection: Collection) -> bool {
        self.depends_on.contains(&collection)
    }

    /// Stable serialized form, identical for identical keys.
    pub fn as_string(&self) -> String {
        // ---
        serde_json::json!([self.endpoint, self.params]).to_string()
    }
}

impl PartialEq for ResourceKey {
    fn eq(&self, other: &Self) -> bool {
        self.endpoint == other.endpoint && self.params == other.params
    }
}

impl Eq for ResourceKey {}

impl Hash for ResourceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.endpoint.hash(state);
        self.params.hash(state);
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        f.write_str(&self.endpoint)?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            write!(f, "{}{}={}", if i == 0 { '?' } else { '&' }, k, v)?;
        }
        Ok(())
    }
}

// --- endpoint catalog

/// `GET /api/tankage?days=N&date=D&stationId=S`
pub fn tankage(days: Option<u32>, date: Option<&str>, station_id: Option<&str>) -> ResourceKey {
    // ---
    ResourceKey::new("/api/tankage")
        .param_opt("days", days)
        .param_opt("date", date)
        .param_opt("stationId", station_id)
        .depending_on(Collection::Tanks)
        .depending_on(Collection::Readings)
}

/// `GET /api/alerts?limit=N`
pub fn alerts(limit: Option<u32>) -> ResourceKey {
    ResourceKey::new("/api/alerts").param_opt("limit", limit)
}

/// List endpoint of a collection.
pub fn collection(collection: Collection) -> ResourceKey {
    // ---
    match collection {
        Collection::Alerts => alerts(None),
        other => ResourceKey::new(format!("/api/{}", other.as_str())),
    }
}

// --- HTTP client

/// reqwest-backed [`Fetcher`] and [`Mutator`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self> {
        // ---
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        // ---
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// JSON body of a successful response (`null` for an empty body), or
    /// the backend's `{ message }` as a [`FetchError::Upstream`].
    async fn read_json(response: Response) -> Result<Value, FetchError> {
        // ---
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or_else(|_| {
                    if body.trim().is_empty() {
                        status.canonical_reason().unwrap_or("request failed").to_string()
                    } else {
                        body.chars().take(200).collect()
                    }
                });
            return Err(FetchError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

impl Fetcher for HttpBackend {
    async fn fetch(&self, key: &ResourceKey) -> Result<Value, FetchError> {
        // ---
        tracing::debug!("GET {}", key);
        let response = self
            .request(Method::GET, key.endpoint())
            .query(key.params())
            .send()
            .await?;
        Self::read_json(response).await
    }
}

impl Mutator for HttpBackend {
    async fn send(&self, request: &MutationRequest) -> Result<Value, FetchError> {
        // ---
        let method = request.method();
        let path = request.path();
        tracing::debug!("{} {}", method, path);

        let mut builder = self.request(method, &path);
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        Self::read_json(response).await
    }
}
