//! In-flight resolution deduplication
//!
//! Concurrent resolutions of the same key collapse onto one worker: the first
//! caller becomes the leader and runs the chain, later callers subscribe and
//! receive the leader's outcome. A burst of scans of the same novel product
//! costs one chain run and one cache write.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use foodlens_common::{Error, Result};
use tokio::sync::broadcast;

use crate::types::{Resolution, ResolutionKey};

/// Outcome broadcast to followers; errors travel as text
type SharedOutcome = Arc<std::result::Result<Resolution, String>>;

enum Role {
    Leader,
    Follower(broadcast::Receiver<SharedOutcome>),
}

pub(crate) struct InflightMap {
    inner: Mutex<HashMap<ResolutionKey, broadcast::Sender<SharedOutcome>>>,
}

impl InflightMap {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Run `work` for `key`, collapsing concurrent callers onto one run
    ///
    /// Followers that subscribe while the leader is running receive the
    /// leader's outcome without running `work` themselves. A leader cancelled
    /// mid-run removes its entry, so followers fail soft instead of waiting
    /// forever.
    pub async fn run<F, Fut>(&self, key: ResolutionKey, work: F) -> Result<Resolution>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Resolution>>,
    {
        let role = {
            let mut map = self.lock_map();
            match map.get(&key) {
                Some(tx) => Role::Follower(tx.subscribe()),
                None => {
                    // Exactly one message ever travels on this channel
                    let (tx, _) = broadcast::channel(1);
                    map.insert(key.clone(), tx);
                    Role::Leader
                }
            }
        };

        match role {
            Role::Follower(rx) => self.follow(&key, rx).await,
            Role::Leader => self.lead(&key, work).await,
        }
    }

    async fn lead<F, Fut>(&self, key: &ResolutionKey, work: F) -> Result<Resolution>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Resolution>>,
    {
        let mut guard = EntryGuard {
            map: self,
            key: Some(key.clone()),
        };

        let result = work().await;

        let shared: SharedOutcome = Arc::new(
            result
                .as_ref()
                .map(Resolution::clone)
                .map_err(|e| e.to_string()),
        );
        guard.key = None;
        if let Some(tx) = self.lock_map().remove(key) {
            // Send fails when nobody subscribed, which is the common case
            let _ = tx.send(shared);
        }
        result
    }

    async fn follow(
        &self,
        key: &ResolutionKey,
        mut rx: broadcast::Receiver<SharedOutcome>,
    ) -> Result<Resolution> {
        tracing::debug!(cache_key = %key.as_cache_key(), "Joining in-flight resolution");
        match rx.recv().await {
            Ok(shared) => match shared.as_ref() {
                Ok(resolution) => Ok(resolution.clone()),
                Err(message) => Err(Error::Internal(format!(
                    "Deduplicated resolution failed: {}",
                    message
                ))),
            },
            Err(_) => Err(Error::Internal(
                "In-flight resolution ended without a result".to_string(),
            )),
        }
    }

    fn lock_map(
        &self,
    ) -> MutexGuard<'_, HashMap<ResolutionKey, broadcast::Sender<SharedOutcome>>> {
        // Poisoning only marks that some caller panicked; the map stays valid
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes a leader's map entry if its future is dropped before publishing
///
/// Dropping the entry drops the channel sender, which unblocks every
/// follower with a receive error.
struct EntryGuard<'a> {
    map: &'a InflightMap,
    key: Option<ResolutionKey>,
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.map.lock_map().remove(&key);
            tracing::debug!(cache_key = %key.as_cache_key(), "In-flight resolution abandoned");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
