//! In-memory, TTL-bounded [`SyncStore`] (grounded on the teacher's
//! `core/usersync/local_store.rs`, with the outer/inner key roles corrected:
//! the inner map is keyed by `partner_id`, not re-keyed by `local_id`).

use crate::cookiesync::model::SyncEntry;
use crate::cookiesync::store::SyncStore;
use async_trait::async_trait;
use moka::sync::Cache;
use std::collections::HashMap;
use std::time::Duration;

pub struct LocalStore {
    cache: Cache<String, HashMap<String, SyncEntry>>,
}

impl LocalStore {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self { cache: Cache::builder().time_to_live(ttl).max_capacity(max_capacity).build() }
    }
}

#[async_trait]
impl SyncStore for LocalStore {
    async fn append(&self, local_id: &str, partner_id: &str, remote_id: String) -> Option<SyncEntry> {
        let mut entries = self.cache.get(local_id).unwrap_or_default();
        let previous = entries.insert(partner_id.to_string(), SyncEntry::new(remote_id));
        self.cache.insert(local_id.to_string(), entries);
        previous
    }

    async fn load(&self, local_id: &str) -> Option<HashMap<String, SyncEntry>> {
        self.cache.get(local_id)
    }

    async fn remove(&self, local_id: &str) {
        self.cache.invalidate(local_id);
    }
}
