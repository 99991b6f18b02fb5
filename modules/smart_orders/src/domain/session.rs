//! Session registry port
//!
//! Sessions live only in an external key-value store; the service never
//! caches them.

use crate::contract::SessionData;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Key-value store mapping an opaque token to a session, with expiry
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a session under `token` for `ttl`
    async fn create(&self, token: &str, session: SessionData, ttl: Duration) -> Result<()>;

    /// Live session for `token`; expired entries read as absent
    async fn get(&self, token: &str) -> Result<Option<SessionData>>;

    async fn delete(&self, token: &str) -> Result<()>;

    /// Drop expired entries; returns how many were removed
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }
}
