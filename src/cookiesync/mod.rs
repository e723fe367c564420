//! Cookie-sync subsystem (§6): `/cookie_sync`, `/setuid`, `/optout`.
//!
//! Grounded on the teacher's `core::usersync` module, with its internal
//! `SyncStore`/`LocalStore` mismatch resolved in favor of the working
//! implementation's shape (see [`store`]/[`local_store`]) and its cookie
//! wire format replaced with the one this exchange's spec names (§6).

pub mod constants;
pub mod cookie;
pub mod local_store;
pub mod model;
pub mod store;
pub mod utils;

use crate::cookiesync::constants::LOCAL_ID_MACRO;
use crate::cookiesync::model::{SyncStatus, UidsCookie};
use crate::cookiesync::store::SyncStore;
use std::collections::HashMap;
use std::sync::Arc;

pub use local_store::LocalStore;

/// Facade the HTTP layer calls into for all three user-sync endpoints.
pub struct CookieSyncService {
    store: Arc<dyn SyncStore>,
    /// bidder code -> sync URL template carrying [`LOCAL_ID_MACRO`].
    sync_urls: HashMap<String, String>,
}

impl CookieSyncService {
    pub fn new(store: Arc<dyn SyncStore>, sync_urls: HashMap<String, String>) -> Self {
        Self { store, sync_urls }
    }

    /// Reports, per requested bidder, whether a sync is already on file or
    /// still needed, handing back the pixel URL to fire when it is.
    pub async fn cookie_sync(&self, local_id: &str, bidders: &[String]) -> Vec<SyncStatus> {
        let known = self.store.load(local_id).await.unwrap_or_default();
        bidders
            .iter()
            .map(|bidder| match self.sync_urls.get(bidder) {
                None => SyncStatus { bidder: bidder.clone(), status: "unknown_bidder", url: None },
                Some(_) if known.contains_key(bidder) => {
                    SyncStatus { bidder: bidder.clone(), status: "no_sync_needed", url: None }
                }
                Some(template) => SyncStatus {
                    bidder: bidder.clone(),
                    status: "pending",
                    url: Some(template.replace(LOCAL_ID_MACRO, local_id)),
                },
            })
            .collect()
    }

    /// Records a bidder's remote id against our local id and returns the
    /// cookie payload the caller should set.
    pub async fn setuid(&self, local_id: &str, bidder: &str, remote_id: String) -> UidsCookie {
        self.store.append(local_id, bidder, remote_id).await;
        let entries = self.store.load(local_id).await.unwrap_or_default();
        let mut cookie = UidsCookie::new();
        cookie.uids = entries.into_iter().map(|(code, entry)| (code, entry.remote_id)).collect();
        cookie
    }

    /// Clears every synced partner for the local id and returns an
    /// opted-out cookie payload.
    pub async fn optout(&self, local_id: &str) -> UidsCookie {
        self.store.remove(local_id).await;
        let mut cookie = UidsCookie::new();
        cookie.optout = Some(true);
        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn service() -> CookieSyncService {
        let mut urls = HashMap::new();
        urls.insert("acme".to_string(), format!("https://acme.example/sync?uid={LOCAL_ID_MACRO}"));
        CookieSyncService::new(Arc::new(LocalStore::new(Duration::from_secs(60), 100)), urls)
    }

    #[tokio::test]
    async fn unknown_bidder_is_reported_as_such() {
        let svc = service();
        let statuses = svc.cookie_sync("rx-1", &["ghost".to_string()]).await;
        assert_eq!(statuses[0].status, "unknown_bidder");
    }

    #[tokio::test]
    async fn first_sync_is_pending_then_no_longer_needed() {
        let svc = service();
        let before = svc.cookie_sync("rx-1", &["acme".to_string()]).await;
        assert_eq!(before[0].status, "pending");
        assert!(before[0].url.as_ref().unwrap().contains("uid=rx-1"));

        svc.setuid("rx-1", "acme", "acme-remote".into()).await;

        let after = svc.cookie_sync("rx-1", &["acme".to_string()]).await;
        assert_eq!(after[0].status, "no_sync_needed");
    }

    #[tokio::test]
    async fn setuid_returns_a_cookie_with_the_recorded_id() {
        let svc = service();
        let cookie = svc.setuid("rx-1", "acme", "acme-remote".into()).await;
        assert_eq!(cookie.uids["acme"], "acme-remote");
    }

    #[tokio::test]
    async fn optout_clears_prior_syncs_and_marks_optout() {
        let svc = service();
        svc.setuid("rx-1", "acme", "acme-remote".into()).await;
        let cookie = svc.optout("rx-1").await;
        assert_eq!(cookie.optout, Some(true));
        assert!(cookie.uids.is_empty());

        let statuses = svc.cookie_sync("rx-1", &["acme".to_string()]).await;
        assert_eq!(statuses[0].status, "pending");
    }
}
