//! Server-side record of issued OAuth state values.
//!
//! The state cookie alone cannot stop a captured `state` + `code` pair from
//! being replayed while the cookie lives. Entries here are removed on first
//! use, so a second callback with the same state is rejected.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::StateToken;

/// In-process single-use state registry.
#[derive(Clone, Default)]
pub struct StateStore {
    entries: Arc<Mutex<HashMap<StateToken, DateTime<Utc>>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly issued state value.
    pub async fn issue(&self, state: StateToken, ttl: Duration) {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;

        // Clean up opportunistically so abandoned logins don't accumulate.
        let purged = purge(&mut entries, now);
        if purged > 0 {
            debug!("Purged {} expired OAuth states", purged);
        }
        entries.insert(state, now + ttl);
    }

    /// Remove `state` and report whether it was known and still live.
    pub async fn consume(&self, state: &str) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.remove(state) {
            Some(expires_at) if expires_at > Utc::now() => true,
            Some(_) => {
                debug!("OAuth state expired before callback");
                false
            }
            None => false,
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        purge(&mut entries, Utc::now())
    }
}

fn purge(entries: &mut HashMap<StateToken, DateTime<Utc>>, now: DateTime<Utc>) -> usize {
    let before = entries.len();
    entries.retain(|_, expires_at| *expires_at > now);
    before - entries.len()
}
