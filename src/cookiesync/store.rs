//! The match-table abstraction backing `/setuid` and `/cookie_sync` lookups.

use crate::cookiesync::model::SyncEntry;
use async_trait::async_trait;
use std::collections::HashMap;

/// Maps a local exchange id to the set of bidder-side ids it has synced with.
///
/// `append`/`load` key the outer table by `local_id` and the inner table by
/// `partner_id` (the bidder code) — a single local id can carry one synced
/// remote id per partner.
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn append(&self, local_id: &str, partner_id: &str, remote_id: String) -> Option<SyncEntry>;
    async fn load(&self, local_id: &str) -> Option<HashMap<String, SyncEntry>>;
    async fn remove(&self, local_id: &str);
}
