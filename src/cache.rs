//! Process-wide resource cache in front of the tankage backend.
//!
//! - One entry per [`ResourceKey`]; identical keys share one in-flight
//!   request and one cached result.
//! - Entries are served without refetching for `fresh_for`, refetched in the
//!   background once older than `revalidate_every`, and on demand through
//!   [`ResourceCache::refetch`].
//! - A failed fetch keeps the previous data and reports the error alongside
//!   it (stale-while-error).
//! - Every issued request carries a sequence number. A result is applied only
//!   if it is newer than what the entry already holds and was issued after
//!   the entry's last invalidation.
//! - Mutations never touch entries directly; they send [`Invalidation`]
//!   messages which the cache drains before serving any read.
//! - Entries nobody has read for `idle_for` are dropped instead of being
//!   revalidated, and the map never holds more than `max_entries` keys.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::api::{Collection, ResourceKey};
use crate::error::FetchError;

// ---

/// Source of resource payloads.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, key: &ResourceKey) -> impl Future<Output = Result<Value, FetchError>> + Send;
}

/// Bounded exponential backoff for transient fetch failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // ---
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()).max(0.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachePolicy {
    pub fresh_for: Duration,
    pub revalidate_every: Duration,
    /// Entries not read for this long are evicted rather than revalidated.
    pub idle_for: Duration,
    pub max_entries: usize,
    pub retry: RetryPolicy,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            fresh_for: Duration::from_secs(60),
            revalidate_every: Duration::from_secs(300),
            idle_for: Duration::from_secs(900),
            max_entries: 512,
            retry: RetryPolicy::default(),
        }
    }
}

/// What a consumer sees for one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    /// Last successfully fetched data, possibly stale.
    pub data: Option<T>,
    /// A request for this resource is still outstanding.
    pub is_loading: bool,
    pub is_error: bool,
    /// Error of the latest attempt; cleared by the next success.
    pub error: Option<FetchError>,
    /// `data` is older than the freshness window or was invalidated.
    pub is_stale: bool,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            is_error: false,
            error: None,
            is_stale: false,
        }
    }
}

impl ResourceState<Arc<Value>> {
    /// Decode the payload. A payload that does not fit `T` is reported as a
    /// decode error with no data.
    fn decode<T: DeserializeOwned>(self) -> ResourceState<T> {
        // ---
        let ResourceState {
            data,
            is_loading,
            is_error,
            error,
            is_stale,
        } = self;

        match data.map(|v| T::deserialize(v.as_ref())) {
            Some(Ok(decoded)) => ResourceState {
                data: Some(decoded),
                is_loading,
                is_error,
                error,
                is_stale,
            },
            Some(Err(e)) => ResourceState {
                data: None,
                is_loading,
                is_error: true,
                error: Some(FetchError::Decode(e.to_string())),
                is_stale,
            },
            None => ResourceState {
                data: None,
                is_loading,
                is_error,
                error,
                is_stale,
            },
        }
    }
}

/// Cache invalidation message.
#[derive(Debug, Clone, PartialEq)]
pub enum Invalidation {
    /// Every entry whose key depends on the collection.
    Collection(Collection),
    Key(ResourceKey),
    All,
}

impl Invalidation {
    fn matches(&self, key: &ResourceKey) -> bool {
        match self {
            Invalidation::Collection(c) => key.depends_on(*c),
            Invalidation::Key(k) => k == key,
            Invalidation::All => true,
        }
    }
}

/// Sending half of the cache's invalidation channel.
#[derive(Debug, Clone)]
pub struct Invalidator {
    tx: mpsc::UnboundedSender<Invalidation>,
}

impl Invalidator {
    pub fn send(&self, invalidation: Invalidation) {
        // ---
        if self.tx.send(invalidation).is_err() {
            debug!("Cache dropped, invalidation ignored");
        }
    }

    pub fn collection(&self, collection: Collection) {
        self.send(Invalidation::Collection(collection));
    }
}

type Outcome = Result<Arc<Value>, FetchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadMode {
    Get,
    Refetch,
    /// Background refresh; does not count as a read.
    Revalidate,
}

impl LoadMode {
    fn force(self) -> bool {
        self != LoadMode::Get
    }
}

#[derive(Clone)]
struct Inflight {
    seq: u64,
    cell: Arc<OnceCell<Outcome>>,
}

#[derive(Default)]
struct Entry {
    data: Option<Arc<Value>>,
    fetched_at: Option<Instant>,
    error: Option<FetchError>,
    invalidated: bool,
    /// Sequence number of the result currently held.
    applied_seq: u64,
    /// Results with a sequence number up to this one arrive too late.
    discard_through: u64,
    inflight: Option<Inflight>,
    last_accessed: Option<Instant>,
}

impl Entry {
    fn is_idle(&self, now: Instant, idle_for: Duration) -> bool {
        // ---
        self.inflight.is_none()
            && self
                .last_accessed
                .map_or(true, |t| now.duration_since(t) >= idle_for)
    }

    fn is_fresh(&self, now: Instant, fresh_for: Duration) -> bool {
        // ---
        !self.invalidated
            && self.data.is_some()
            && self
                .fetched_at
                .is_some_and(|t| now.duration_since(t) < fresh_for)
    }

    fn snapshot(&self, now: Instant, fresh_for: Duration) -> ResourceState<Arc<Value>> {
        // ---
        ResourceState {
            data: self.data.clone(),
            is_loading: self.inflight.is_some(),
            is_error: self.error.is_some(),
            error: self.error.clone(),
            is_stale: self.data.is_some() && !self.is_fresh(now, fresh_for),
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<ResourceKey, Entry>,
    next_seq: u64,
}

impl CacheState {
    fn evict_idle(&mut self, now: Instant, idle_for: Duration) -> usize {
        // ---
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_idle(now, idle_for));
        before - self.entries.len()
    }

    /// Make room for one more key. Idle entries go first, then the least
    /// recently read ones. Entries with a request in flight are kept, so
    /// the map can briefly exceed the cap while many keys load at once.
    fn make_room(&mut self, now: Instant, policy: &CachePolicy) {
        // ---
        if self.entries.len() < policy.max_entries {
            return;
        }
        let evicted = self.evict_idle(now, policy.idle_for);
        if evicted > 0 {
            debug!("Evicted {} idle cache entries", evicted);
        }
        while self.entries.len() >= policy.max_entries {
            let oldest = self
                .entries
                .iter()
                .filter(|(_, e)| e.inflight.is_none())
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone());
            let Some(key) = oldest else { break };
            debug!("Evicting {} to stay within {} entries", key, policy.max_entries);
            self.entries.remove(&key);
        }
    }
}

pub struct ResourceCache<F> {
    fetcher: F,
    policy: CachePolicy,
    state: Mutex<CacheState>,
    inbox: Mutex<mpsc::UnboundedReceiver<Invalidation>>,
    outbox: Invalidator,
}

impl<F: Fetcher> ResourceCache<F> {
    pub fn new(fetcher: F, policy: CachePolicy) -> Self {
        // ---
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            fetcher,
            policy,
            state: Mutex::new(CacheState::default()),
            inbox: Mutex::new(rx),
            outbox: Invalidator { tx },
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Handle for mutation code to invalidate entries.
    pub fn invalidator(&self) -> Invalidator {
        self.outbox.clone()
    }

    /// Cached data if fresh, otherwise fetch (joining any request already in
    /// flight for the same key).
    pub async fn get<T: DeserializeOwned>(&self, key: &ResourceKey) -> ResourceState<T> {
        self.load(key, LoadMode::Get).await.decode()
    }

    /// Fetch regardless of freshness. Concurrent refetches of one key share
    /// a single request.
    pub async fn refetch<T: DeserializeOwned>(&self, key: &ResourceKey) -> ResourceState<T> {
        self.load(key, LoadMode::Refetch).await.decode()
    }

    /// Current state without fetching.
    pub async fn peek<T: DeserializeOwned>(&self, key: &ResourceKey) -> ResourceState<T> {
        // ---
        self.drain_invalidations().await;
        let state = self.state.lock().await;
        match state.entries.get(key) {
            Some(entry) => entry.snapshot(Instant::now(), self.policy.fresh_for).decode(),
            None => ResourceState::default(),
        }
    }

    /// Number of keys currently cached.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop entries nobody has read within `idle_for`, then refetch every
    /// remaining entry that was invalidated, never loaded successfully, or
    /// is older than `revalidate_every`. Returns how many were refetched.
    pub async fn revalidate_due(&self) -> usize {
        // ---
        self.drain_invalidations().await;
        let due: Vec<ResourceKey> = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let evicted = state.evict_idle(now, self.policy.idle_for);
            if evicted > 0 {
                info!("Evicted {} idle cache entries", evicted);
            }
            state
                .entries
                .iter()
                .filter(|(_, e)| {
                    let expired = e
                        .fetched_at
                        .map_or(true, |t| now.duration_since(t) >= self.policy.revalidate_every);
                    e.inflight.is_none() && (e.invalidated || expired)
                })
                .map(|(k, _)| k.clone())
                .collect()
        };

        for key in &due {
            self.load(key, LoadMode::Revalidate).await;
        }
        due.len()
    }

    /// Run [`Self::revalidate_due`] every `revalidate_every` until the
    /// returned task is aborted.
    pub fn spawn_revalidator(self: Arc<Self>) -> JoinHandle<()> {
        // ---
        let period = self.policy.revalidate_every.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let refreshed = self.revalidate_due().await;
                if refreshed > 0 {
                    info!("Revalidated {} cached resources", refreshed);
                }
            }
        })
    }

    async fn drain_invalidations(&self) {
        // ---
        let pending: Vec<Invalidation> = {
            let mut inbox = self.inbox.lock().await;
            std::iter::from_fn(|| inbox.try_recv().ok()).collect()
        };
        if pending.is_empty() {
            return;
        }

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let cutoff = state.next_seq;
        for invalidation in pending {
            let mut count = 0;
            for (key, entry) in state.entries.iter_mut().filter(|(k, _)| invalidation.matches(k)) {
                debug!("Invalidating {}", key);
                entry.invalidated = true;
                entry.discard_through = cutoff;
                entry.inflight = None;
                count += 1;
            }
            info!("Invalidated {} cache entries for {:?}", count, invalidation);
        }
    }

    async fn load(&self, key: &ResourceKey, mode: LoadMode) -> ResourceState<Arc<Value>> {
        // ---
        self.drain_invalidations().await;

        let inflight = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let now = Instant::now();
            if !state.entries.contains_key(key) {
                if mode == LoadMode::Revalidate {
                    // Evicted since the revalidation pass picked it.
                    return ResourceState::default();
                }
                state.make_room(now, &self.policy);
            }
            let entry = state.entries.entry(key.clone()).or_default();
            if mode != LoadMode::Revalidate {
                entry.last_accessed = Some(now);
            }

            if !mode.force() && entry.is_fresh(now, self.policy.fresh_for) {
                debug!("Cache hit for {}", key);
                return entry.snapshot(now, self.policy.fresh_for);
            }

            match &entry.inflight {
                Some(inflight) => {
                    debug!("Joining in-flight request #{} for {}", inflight.seq, key);
                    inflight.clone()
                }
                None => {
                    state.next_seq += 1;
                    let inflight = Inflight {
                        seq: state.next_seq,
                        cell: Arc::new(OnceCell::new()),
                    };
                    debug!("Issuing request #{} for {}", inflight.seq, key);
                    entry.inflight = Some(inflight.clone());
                    inflight
                }
            }
        };

        let outcome = inflight
            .cell
            .get_or_init(|| self.fetch_with_retry(key))
            .await
            .clone();

        self.apply(key, &inflight, outcome).await
    }

    async fn apply(
        &self,
        key: &ResourceKey,
        inflight: &Inflight,
        outcome: Outcome,
    ) -> ResourceState<Arc<Value>> {
        // ---
        let mut guard = self.state.lock().await;
        let now = Instant::now();
        let Some(entry) = guard.entries.get_mut(key) else {
            // Evicted meanwhile; the caller still gets the outcome.
            return ResourceState {
                is_error: outcome.is_err(),
                error: outcome.as_ref().err().cloned(),
                data: outcome.ok(),
                ..ResourceState::default()
            };
        };

        if entry
            .inflight
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(&current.cell, &inflight.cell))
        {
            entry.inflight = None;
        }

        if inflight.seq <= entry.discard_through {
            debug!(
                "Discarding result #{} for {}: invalidated while in flight",
                inflight.seq, key
            );
        } else if inflight.seq < entry.applied_seq {
            debug!(
                "Discarding result #{} for {}: #{} already applied",
                inflight.seq, key, entry.applied_seq
            );
        } else if inflight.seq > entry.applied_seq {
            entry.applied_seq = inflight.seq;
            match outcome {
                Ok(data) => {
                    entry.data = Some(data);
                    entry.fetched_at = Some(now);
                    entry.error = None;
                    entry.invalidated = false;
                }
                Err(e) => {
                    warn!(
                        "Fetch failed for {}: {} (serving previous data: {})",
                        key,
                        e,
                        entry.data.is_some()
                    );
                    entry.error = Some(e);
                }
            }
        }

        entry.snapshot(now, self.policy.fresh_for)
    }

    async fn fetch_with_retry(&self, key: &ResourceKey) -> Outcome {
        // ---
        let retry = &self.policy.retry;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetcher.fetch(key).await {
                Ok(value) => return Ok(Arc::new(value)),
                Err(e) if e.is_transient() && attempt <= retry.max_retries => {
                    let delay = retry.delay_for_attempt(attempt);
                    warn!(
                        "Transient failure fetching {} (attempt {}): {}; retrying in {:?}",
                        key, attempt, e, delay
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Result of a [`ResourceHandle`] load.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<T> {
    Current(ResourceState<T>),
    /// The handle moved to another key (or was detached) while the load was
    /// in flight; the result belongs to nobody.
    Superseded,
}

struct HandleState {
    generation: u64,
    key: ResourceKey,
}

/// One view's binding to a resource whose key changes with the view's
/// filters.
pub struct ResourceHandle<F> {
    cache: Arc<ResourceCache<F>>,
    current: Mutex<HandleState>,
}

impl<F: Fetcher> ResourceHandle<F> {
    pub fn new(cache: Arc<ResourceCache<F>>, key: ResourceKey) -> Self {
        Self {
            cache,
            current: Mutex::new(HandleState { generation: 0, key }),
        }
    }

    pub async fn key(&self) -> ResourceKey {
        self.current.lock().await.key.clone()
    }

    /// Point the handle at a new key. Loads still in flight for the old key
    /// resolve as [`Loaded::Superseded`].
    pub async fn set_key(&self, key: ResourceKey) {
        // ---
        let mut current = self.current.lock().await;
        if current.key != key {
            debug!("Handle moved from {} to {}", current.key, key);
            current.key = key;
            current.generation += 1;
        }
    }

    /// The view went away; pending loads are superseded.
    pub async fn detach(&self) {
        self.current.lock().await.generation += 1;
    }

    pub async fn load<T: DeserializeOwned>(&self) -> Loaded<T> {
        self.run(false).await
    }

    pub async fn refetch<T: DeserializeOwned>(&self) -> Loaded<T> {
        self.run(true).await
    }

    async fn run<T: DeserializeOwned>(&self, force: bool) -> Loaded<T> {
        // ---
        let (generation, key) = {
            let current = self.current.lock().await;
            (current.generation, current.key.clone())
        };

        let state = if force {
            self.cache.refetch::<T>(&key).await
        } else {
            self.cache.get::<T>(&key).await
        };

        if self.current.lock().await.generation != generation {
            debug!("Dropping superseded result for {}", key);
            return Loaded::Superseded;
        }
        Loaded::Current(state)
    }
}
