//! Data carried by the cookie-sync subsystem (§6, §10.5).

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

fn epoch_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// One bidder's match-table entry: the remote (bidder-side) id mapped to our
/// local exchange id, stamped when last updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncEntry {
    pub ts: u64,
    pub remote_id: String,
}

impl SyncEntry {
    pub fn new(remote_id: String) -> Self {
        Self { ts: epoch_seconds(), remote_id }
    }
}

/// The wire format of the `uids` cookie (§6 "Cookie format").
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UidsCookie {
    #[serde(default)]
    pub uids: std::collections::HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optout: Option<bool>,
    pub bday: String,
}

impl UidsCookie {
    pub fn new() -> Self {
        Self { uids: Default::default(), optout: None, bday: chrono::Utc::now().to_rfc3339() }
    }
}

/// Per-bidder status reported back from `/cookie_sync`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub bidder: String,
    /// "no_sync_needed" | "pending" | "unknown_bidder"
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
