//! Bounded session registry.
//!
//! Maps session tokens to lazily-created values with two bounds:
//! - **capacity**: inserting past `max_active` evicts the least recently
//!   used initialized session;
//! - **idle TTL**: sessions untouched for longer than the TTL are expired
//!   on the next registry access or by [`SessionRegistry::sweep_expired`].
//!
//! Creation is at-most-once per token: the map holds a `OnceCell` per slot
//! and concurrent first requests share one initializer. The map lock is
//! never held across an `.await`; teardown runs after it is released.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tokio::time::Instant;

/// A value owned by a session that must be released when the session ends.
#[async_trait]
pub trait SessionResource: Send + Sync + 'static {
    /// Release external resources. Called exactly once per value by the
    /// registry.
    async fn close(&self) -> dq_domain::Result<()>;
}

/// Why a session left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    Capacity,
    IdleTimeout,
    Removed,
    Shutdown,
}

impl std::fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capacity => write!(f, "capacity"),
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::Removed => write!(f, "removed"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Internal state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Slot<T> {
    cell: Arc<OnceCell<Arc<T>>>,
    last_used: Instant,
    /// Key into `State::order`.
    tick: u64,
    /// Callers inside `get_or_create` for this slot. A failed init only
    /// frees the slot once none remain, since a waiter may be retrying.
    pending: usize,
}

struct State<T> {
    slots: HashMap<String, Slot<T>>,
    /// Access order: tick → token. The smallest tick is least recently used.
    order: BTreeMap<u64, String>,
    next_tick: u64,
}

type Evicted<T> = Vec<(String, Arc<T>, EvictionReason)>;

impl<T> State<T> {
    fn touch(&mut self, token: &str, now: Instant) {
        let tick = self.next_tick;
        if let Some(slot) = self.slots.get_mut(token) {
            self.order.remove(&slot.tick);
            slot.tick = tick;
            slot.last_used = now;
            self.order.insert(tick, token.to_owned());
            self.next_tick += 1;
        }
    }

    fn insert(&mut self, token: &str, now: Instant) -> Arc<OnceCell<Arc<T>>> {
        let tick = self.next_tick;
        self.next_tick += 1;
        let cell = Arc::new(OnceCell::new());
        self.slots.insert(
            token.to_owned(),
            Slot {
                cell: cell.clone(),
                last_used: now,
                tick,
                pending: 0,
            },
        );
        self.order.insert(tick, token.to_owned());
        cell
    }

    fn take(&mut self, token: &str) -> Option<Slot<T>> {
        let slot = self.slots.remove(token)?;
        self.order.remove(&slot.tick);
        Some(slot)
    }

    /// Remove sessions idle past `ttl`. Slots still initializing are kept.
    fn expire(&mut self, ttl: Duration, now: Instant, out: &mut Evicted<T>) {
        let stale: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.last_used) > ttl && s.cell.initialized())
            .map(|(k, _)| k.clone())
            .collect();
        for token in stale {
            if let Some(slot) = self.take(&token) {
                if let Some(value) = slot.cell.get() {
                    out.push((token, value.clone(), EvictionReason::IdleTimeout));
                }
            }
        }
    }

    /// Evict least recently used initialized sessions until at most
    /// `capacity` remain, never touching `keep`.
    fn shrink_to(&mut self, capacity: usize, keep: &str, out: &mut Evicted<T>) {
        while self.slots.len() > capacity {
            let victim = self
                .order
                .values()
                .find(|t| {
                    t.as_str() != keep
                        && self.slots.get(t.as_str()).is_some_and(|s| s.cell.initialized())
                })
                .cloned();
            let Some(token) = victim else { break };
            if let Some(slot) = self.take(&token) {
                if let Some(value) = slot.cell.get() {
                    out.push((token, value.clone(), EvictionReason::Capacity));
                }
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Token → session value map with LRU capacity, idle expiry, and
/// teardown hooks.
pub struct SessionRegistry<T: SessionResource> {
    state: Mutex<State<T>>,
    capacity: usize,
    idle_ttl: Option<Duration>,
}

impl<T: SessionResource> SessionRegistry<T> {
    /// `capacity` is clamped to at least 1. `idle_ttl = None` disables
    /// expiry.
    pub fn new(capacity: usize, idle_ttl: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(State {
                slots: HashMap::new(),
                order: BTreeMap::new(),
                next_tick: 0,
            }),
            capacity: capacity.max(1),
            idle_ttl,
        }
    }

    /// Number of live sessions (including ones still initializing).
    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, token: &str) -> bool {
        self.state.lock().slots.contains_key(token)
    }

    /// Look up an initialized session and mark it used. Expired sessions
    /// are not returned.
    pub async fn get(&self, token: &str) -> Option<Arc<T>> {
        let (found, evicted) = {
            let now = Instant::now();
            let mut state = self.state.lock();
            let mut evicted = Vec::new();
            if let Some(ttl) = self.idle_ttl {
                state.expire(ttl, now, &mut evicted);
            }
            let found = state
                .slots
                .get(token)
                .and_then(|s| s.cell.get().cloned());
            if found.is_some() {
                state.touch(token, now);
            }
            (found, evicted)
        };
        Self::teardown(evicted).await;
        found
    }

    /// Return the session for `token`, creating it with `init` if absent.
    ///
    /// Concurrent callers for the same unknown token share a single `init`
    /// call; losers await the winner's result. If `init` fails the slot is
    /// dropped so a later call can retry, and the error goes to the caller
    /// whose initializer ran.
    pub async fn get_or_create<F, Fut, E>(&self, token: &str, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (cell, evicted) = {
            let now = Instant::now();
            let mut state = self.state.lock();
            let mut evicted = Vec::new();
            if let Some(ttl) = self.idle_ttl {
                state.expire(ttl, now, &mut evicted);
            }
            let cell = match state.slots.get(token) {
                Some(slot) => {
                    let cell = slot.cell.clone();
                    state.touch(token, now);
                    cell
                }
                None => {
                    let cell = state.insert(token, now);
                    state.shrink_to(self.capacity, token, &mut evicted);
                    cell
                }
            };
            if let Some(slot) = state.slots.get_mut(token) {
                slot.pending += 1;
            }
            (cell, evicted)
        };

        if !evicted.is_empty() {
            // Teardown may be slow (network); keep it off the request path.
            tokio::spawn(Self::teardown(evicted));
        }

        let result = cell
            .get_or_try_init(|| async {
                tracing::info!(session_id = %token, "creating session");
                init().await.map(Arc::new)
            })
            .await;

        let mut state = self.state.lock();
        let mut abandoned = false;
        if let Some(slot) = state.slots.get_mut(token) {
            if Arc::ptr_eq(&slot.cell, &cell) {
                slot.pending = slot.pending.saturating_sub(1);
                abandoned = slot.pending == 0 && !slot.cell.initialized();
            }
        }
        if abandoned {
            state.take(token);
        }
        drop(state);

        result.map(Arc::clone)
    }

    /// Remove a session and run its teardown.
    pub async fn remove(&self, token: &str) -> bool {
        let value = {
            let mut state = self.state.lock();
            state.take(token).and_then(|slot| slot.cell.get().cloned())
        };
        match value {
            Some(v) => {
                Self::teardown(vec![(token.to_owned(), v, EvictionReason::Removed)]).await;
                true
            }
            None => false,
        }
    }

    /// Expire idle sessions now. Returns how many were closed.
    pub async fn sweep_expired(&self) -> usize {
        let Some(ttl) = self.idle_ttl else { return 0 };
        let evicted = {
            let mut evicted = Vec::new();
            self.state.lock().expire(ttl, Instant::now(), &mut evicted);
            evicted
        };
        let n = evicted.len();
        Self::teardown(evicted).await;
        n
    }

    /// Close every session and empty the registry.
    ///
    /// Teardown failures are logged per session and do not stop the rest.
    pub async fn close_all(&self) {
        let drained: Evicted<T> = {
            let mut state = self.state.lock();
            state.order.clear();
            state
                .slots
                .drain()
                .filter_map(|(token, slot)| {
                    slot.cell
                        .get()
                        .cloned()
                        .map(|v| (token, v, EvictionReason::Shutdown))
                })
                .collect()
        };
        let count = drained.len();
        Self::teardown(drained).await;
        tracing::info!(count, "all sessions closed");
    }

    async fn teardown(evicted: Evicted<T>) {
        let closes = evicted.into_iter().map(|(token, value, reason)| async move {
            tracing::info!(session_id = %token, %reason, "closing session");
            if let Err(e) = value.close().await {
                tracing::error!(session_id = %token, %reason, error = %e, "error closing session");
            }
        });
        futures_util::future::join_all(closes).await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
