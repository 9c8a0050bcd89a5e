//! Create / update / delete against the backend.
//!
//! A successful mutation sends invalidation messages for the mutated
//! collection (and the audit log, which the backend appends to on every
//! write). A failed mutation invalidates nothing: the server did not change.
//!
//! [`EntityStore`] keeps an optimistic local copy of a collection. Each
//! mutation is applied locally first, then settled with the server's version
//! or rolled back if the backend rejects it.
//!
//! The HTTP routes proxy raw bodies through [`MutationClient::execute`] and
//! leave optimism to the browser. [`EntityStore`] together with
//! [`MutationClient::create`], [`MutationClient::update`] and
//! [`MutationClient::delete`] is the typed API for in-process consumers of
//! the library, such as a native client or a batch job, that hold their own
//! copy of a collection.

use std::future::Future;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::Collection;
use crate::cache::{Invalidation, Invalidator};
use crate::error::FetchError;
use crate::models::{Alert, MaintenanceTask, Shipment, User};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    kind: MutationKind,
    collection: Collection,
    id: Option<String>,
    body: Option<Value>,
}

impl MutationRequest {
    pub fn create(collection: Collection, body: Value) -> Self {
        Self {
            kind: MutationKind::Create,
            collection,
            id: None,
            body: Some(body),
        }
    }

    pub fn update(collection: Collection, id: impl Into<String>, body: Value) -> Self {
        Self {
            kind: MutationKind::Update,
            collection,
            id: Some(id.into()),
            body: Some(body),
        }
    }

    pub fn delete(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::Delete,
            collection,
            id: Some(id.into()),
            body: None,
        }
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn method(&self) -> Method {
        match self.kind {
            MutationKind::Create => Method::POST,
            MutationKind::Update => Method::PATCH,
            MutationKind::Delete => Method::DELETE,
        }
    }

    /// `/api/<collection>` or `/api/<collection>/<id>`.
    pub fn path(&self) -> String {
        match &self.id {
            Some(id) => format!("/api/{}/{}", self.collection, id),
            None => format!("/api/{}", self.collection),
        }
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// Sink for mutation requests.
pub trait Mutator: Send + Sync + 'static {
    fn send(
        &self,
        request: &MutationRequest,
    ) -> impl Future<Output = Result<Value, FetchError>> + Send;
}

/// A backend entity the dashboard can edit.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);
}

macro_rules! impl_entity {
    ($ty:ty, $collection:expr) => {
        impl Entity for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        }
    };
}

impl_entity!(Shipment, Collection::Shipments);
impl_entity!(Alert, Collection::Alerts);
impl_entity!(MaintenanceTask, Collection::Maintenance);
impl_entity!(User, Collection::Users);

/// Placeholder ids for optimistic creates.
const TEMP_ID_PREFIX: &str = "tmp-";

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

#[derive(Debug, Clone, PartialEq)]
enum PendingOp<E> {
    Upsert(E),
    Delete(String),
}

/// Confirmed server state plus not-yet-settled local mutations.
#[derive(Debug, Clone)]
pub struct OptimisticList<E> {
    confirmed: Vec<E>,
    pending: Vec<(Uuid, PendingOp<E>)>,
}

fn upsert<E: Entity>(items: &mut Vec<E>, entity: E) {
    // ---
    match items.iter_mut().find(|e| e.id() == entity.id()) {
        Some(existing) => *existing = entity,
        None => items.push(entity),
    }
}

impl<E: Entity> OptimisticList<E> {
    pub fn new(confirmed: Vec<E>) -> Self {
        Self {
            confirmed,
            pending: Vec::new(),
        }
    }

    /// What the UI renders: confirmed items with pending mutations applied in
    /// the order they were made.
    pub fn view(&self) -> Vec<E> {
        // ---
        let mut items = self.confirmed.clone();
        for (_, op) in &self.pending {
            match op {
                PendingOp::Upsert(e) => upsert(&mut items, e.clone()),
                PendingOp::Delete(id) => items.retain(|e| e.id() != id),
            }
        }
        items
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Replace the confirmed items with a fresh server listing. Pending
    /// mutations stay on top.
    pub fn replace_confirmed(&mut self, items: Vec<E>) {
        self.confirmed = items;
    }

    fn begin(&mut self, op: PendingOp<E>) -> Uuid {
        // ---
        let id = Uuid::new_v4();
        self.pending.push((id, op));
        id
    }

    /// Fold a mutation into the confirmed state. `server` replaces the
    /// optimistic copy of an upsert when the backend returned one.
    fn settle(&mut self, mutation: Uuid, server: Option<E>) {
        // ---
        let Some(pos) = self.pending.iter().position(|(id, _)| *id == mutation) else {
            return;
        };
        let (_, op) = self.pending.remove(pos);
        match op {
            PendingOp::Upsert(local) => {
                let entity = server.unwrap_or(local);
                upsert(&mut self.confirmed, entity);
            }
            PendingOp::Delete(id) => self.confirmed.retain(|e| e.id() != id),
        }
    }

    fn rollback(&mut self, mutation: Uuid) {
        self.pending.retain(|(id, _)| *id != mutation);
    }
}

/// Shared optimistic copy of one collection.
pub struct EntityStore<E> {
    list: Mutex<OptimisticList<E>>,
}

impl<E: Entity> EntityStore<E> {
    pub fn new(items: Vec<E>) -> Self {
        Self {
            list: Mutex::new(OptimisticList::new(items)),
        }
    }

    pub async fn view(&self) -> Vec<E> {
        self.list.lock().await.view()
    }

    pub async fn has_pending(&self) -> bool {
        self.list.lock().await.has_pending()
    }

    pub async fn replace_confirmed(&self, items: Vec<E>) {
        self.list.lock().await.replace_confirmed(items);
    }
}

/// Sends mutations and turns successes into cache invalidations.
pub struct MutationClient<M> {
    backend: M,
    invalidator: Invalidator,
}

impl<M: Mutator> MutationClient<M> {
    pub fn new(backend: M, invalidator: Invalidator) -> Self {
        Self { backend, invalidator }
    }

    /// Send one mutation. On success the collection's cache entries (and the
    /// audit log's) are invalidated; on failure nothing is.
    pub async fn execute(&self, request: MutationRequest) -> Result<Value, FetchError> {
        // ---
        let collection = request.collection();
        match self.backend.send(&request).await {
            Ok(value) => {
                info!("{} {} succeeded", request.method(), request.path());
                self.invalidator.send(Invalidation::Collection(collection));
                if collection != Collection::Audit {
                    self.invalidator.send(Invalidation::Collection(Collection::Audit));
                }
                Ok(value)
            }
            Err(e) => {
                warn!("{} {} failed: {}", request.method(), request.path(), e);
                Err(e)
            }
        }
    }

    /// Optimistically add `draft` under a temporary id, then POST it.
    pub async fn create<E: Entity>(
        &self,
        store: &EntityStore<E>,
        mut draft: E,
    ) -> Result<E, FetchError> {
        // ---
        draft.set_id(format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4()));
        let mut body = serde_json::to_value(&draft)?;
        if let Value::Object(map) = &mut body {
            map.remove("id");
        }

        let mutation = store.list.lock().await.begin(PendingOp::Upsert(draft.clone()));
        let result = self.execute(MutationRequest::create(E::COLLECTION, body)).await;
        self.settle(store, mutation, result, draft).await
    }

    /// Optimistically replace the entity with the same id, then PATCH it.
    pub async fn update<E: Entity>(
        &self,
        store: &EntityStore<E>,
        entity: E,
    ) -> Result<E, FetchError> {
        // ---
        let body = serde_json::to_value(&entity)?;
        let mutation = store.list.lock().await.begin(PendingOp::Upsert(entity.clone()));
        let request = MutationRequest::update(E::COLLECTION, entity.id(), body);
        let result = self.execute(request).await;
        self.settle(store, mutation, result, entity).await
    }

    /// Optimistically hide the entity, then DELETE it.
    pub async fn delete<E: Entity>(
        &self,
        store: &EntityStore<E>,
        id: &str,
    ) -> Result<(), FetchError> {
        // ---
        let mutation = store.list.lock().await.begin(PendingOp::Delete(id.to_string()));
        match self.execute(MutationRequest::delete(E::COLLECTION, id)).await {
            Ok(_) => {
                store.list.lock().await.settle(mutation, None);
                Ok(())
            }
            Err(e) => {
                store.list.lock().await.rollback(mutation);
                Err(e)
            }
        }
    }

    async fn settle<E: Entity>(
        &self,
        store: &EntityStore<E>,
        mutation: Uuid,
        result: Result<Value, FetchError>,
        local: E,
    ) -> Result<E, FetchError> {
        // ---
        match result {
            Ok(body) => {
                // Backends differ on what they echo back. Without a usable
                // entity the optimistic copy becomes the confirmed one.
                let server = serde_json::from_value::<E>(body).ok();
                if server.is_none() {
                    warn!("{} mutation returned no entity, keeping local copy", E::COLLECTION);
                }
                let confirmed = server.clone().unwrap_or(local);
                store.list.lock().await.settle(mutation, server);
                Ok(confirmed)
            }
            Err(e) => {
                store.list.lock().await.rollback(mutation);
                Err(e)
            }
        }
    }
}
