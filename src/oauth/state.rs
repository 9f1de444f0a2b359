use base64::Engine;
use dashmap::DashMap;
use rand::RngCore;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Most states kept at once; past this the oldest pending one is evicted.
pub const DEFAULT_MAX_PENDING: usize = 10_000;

/// Pending `state` values issued by `/connect`, checked on `/callback`.
///
/// Each state is single-use and lives for a fixed TTL. Expired entries are
/// dropped lazily whenever a new state is issued.
#[derive(Clone)]
pub struct StateStore {
    pending: Arc<DashMap<String, Instant>>,
    ttl: Duration,
    max_pending: usize,
}

impl StateStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_limit(ttl, DEFAULT_MAX_PENDING)
    }

    pub fn with_limit(ttl: Duration, max_pending: usize) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            ttl,
            max_pending: max_pending.max(1),
        }
    }

    /// Generate and remember a fresh random state.
    pub fn issue(&self) -> String {
        self.purge_expired();
        while self.pending.len() >= self.max_pending {
            if !self.evict_oldest() {
                break;
            }
        }

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let state = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);

        let now = Instant::now();
        // An unrepresentable deadline leaves the state already expired.
        let expires_at = now.checked_add(self.ttl).unwrap_or(now);
        self.pending.insert(state.clone(), expires_at);
        state
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .pending
            .iter()
            .min_by_key(|entry| *entry.value())
            .map(|entry| entry.key().clone());
        match oldest {
            Some(key) => {
                tracing::warn!(limit = self.max_pending, "Too many pending OAuth states, evicting oldest");
                self.pending.remove(&key).is_some()
            }
            None => false,
        }
    }

    /// Remove `state` and report whether it was issued and still live.
    pub fn consume(&self, state: &str) -> bool {
        match self.pending.remove(state) {
            Some((_, expires_at)) => Instant::now() < expires_at,
            None => false,
        }
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.pending.len();
        self.pending.retain(|_, expires_at| *expires_at > now);
        before - self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
