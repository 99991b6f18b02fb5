//! In-process session store
//!
//! Stands in for the external key-value store in single-node deployments and
//! tests. Entries expire lazily on read and in bulk through `purge_expired`.

use crate::contract::SessionData;
use crate::domain::session::SessionStore;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct Entry {
    session: SessionData,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemorySessionStore {
    entries: DashMap<String, Entry>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, token: &str, session: SessionData, ttl: Duration) -> Result<()> {
        self.entries.insert(
            token.to_string(),
            Entry {
                session,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<SessionData>> {
        let now = Instant::now();
        match self.entries.get(token) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.session.clone())),
            Some(_) => {}
            None => return Ok(None),
        }

        // The read guard is gone; drop the expired entry
        self.entries.remove_if(token, |_, e| e.expires_at <= now);
        Ok(None)
    }

    async fn delete(&self, token: &str) -> Result<()> {
        self.entries.remove(token);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        Ok(before.saturating_sub(self.entries.len()))
    }
}
