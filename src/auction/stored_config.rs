//! C2 — Stored-Config Resolver (§4.2).

use crate::auction::nobid::StoredFetchError;
use crate::rtb::BidRequest;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Capability for retrieving stored request/impression templates by id,
/// mirroring the teacher's `Provider<T>` shape (§4.2).
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_requests(&self, ids: &[String]) -> HashMap<String, Value>;
    async fn fetch_impressions(&self, ids: &[String]) -> HashMap<String, Value>;
}

/// Deep-merges `incoming` over `base`: object keys recurse, anything else
/// (scalars, arrays) on the incoming side replaces the base side outright.
/// This is the resolver's central operation (§4.2 step 3/4).
pub fn deep_merge(base: &Value, incoming: &Value) -> Value {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            let mut merged = base_map.clone();
            for (key, incoming_value) in incoming_map {
                let merged_value = match merged.get(key) {
                    Some(base_value) => deep_merge(base_value, incoming_value),
                    None => incoming_value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => incoming.clone(),
    }
}

/// Resolves `ext.prebid.storedrequest.id` references at the top level and
/// per-imp, deep-merging the incoming request over the fetched templates.
/// Per §4.2 step 5, a missing or malformed *imp* stored id is a warning, not
/// a failure; only a missing *top-level* stored id fails the auction.
pub async fn resolve(
    req: &mut BidRequest,
    fetcher: &dyn Fetcher,
    warnings: &mut Vec<String>,
) -> Result<(), StoredFetchError> {
    if let Some(stored_id) = req.stored_request_id().map(str::to_string) {
        let fetched = fetcher.fetch_requests(std::slice::from_ref(&stored_id)).await;
        match fetched.get(&stored_id) {
            Some(stored) => {
                let incoming = serde_json::to_value(&*req)
                    .map_err(|e| StoredFetchError { id: stored_id.clone(), message: e.to_string() })?;
                let merged = deep_merge(stored, &incoming);
                *req = serde_json::from_value(merged)
                    .map_err(|e| StoredFetchError { id: stored_id.clone(), message: e.to_string() })?;
            }
            None => {
                return Err(StoredFetchError {
                    id: stored_id,
                    message: "stored request id not found".into(),
                });
            }
        }
    }

    let imp_ids: Vec<String> =
        req.imp.iter().filter_map(|imp| imp.stored_request_id().map(str::to_string)).collect();
    if imp_ids.is_empty() {
        return Ok(());
    }

    let fetched = fetcher.fetch_impressions(&imp_ids).await;
    for imp in req.imp.iter_mut() {
        let Some(stored_id) = imp.stored_request_id().map(str::to_string) else { continue };
        match fetched.get(&stored_id) {
            Some(stored) => match serde_json::to_value(&*imp) {
                Ok(incoming) => {
                    let merged = deep_merge(stored, &incoming);
                    match serde_json::from_value(merged) {
                        Ok(merged_imp) => *imp = merged_imp,
                        Err(e) => warnings.push(format!("stored imp {stored_id} malformed: {e}")),
                    }
                }
                Err(e) => warnings.push(format!("failed to serialize imp for merge: {e}")),
            },
            None => warnings.push(format!("stored imp {stored_id} not found")),
        }
    }

    Ok(())
}

/// A [`Fetcher`] backed by a fixed in-memory map, used by tests and by the
/// filesystem backend's in-process cache layer.
pub struct StaticFetcher {
    pub requests: HashMap<String, Value>,
    pub imps: HashMap<String, Value>,
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch_requests(&self, ids: &[String]) -> HashMap<String, Value> {
        ids.iter().filter_map(|id| self.requests.get(id).map(|v| (id.clone(), v.clone()))).collect()
    }

    async fn fetch_impressions(&self, ids: &[String]) -> HashMap<String, Value> {
        ids.iter().filter_map(|id| self.imps.get(id).map(|v| (id.clone(), v.clone()))).collect()
    }
}

/// A [`Fetcher`] backed by the filesystem layout named in §6: a well-formed
/// JSON object per id, under `<base>/requests/<id>.json` and
/// `<base>/imps/<id>.json`. Reads are uncached — the teacher's equivalent
/// `Provider<T>` implementations layer a [`StaticFetcher`]-like cache in
/// front when that matters; this backend stays simple and lets callers wrap
/// it if warranted.
pub struct FsFetcher {
    base: PathBuf,
}

impl FsFetcher {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn read_one(&self, subdir: &str, id: &str) -> Option<Value> {
        let path = self.base.join(subdir).join(format!("{id}.json"));
        let bytes = std::fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn read_many(&self, subdir: &str, ids: &[String]) -> HashMap<String, Value> {
        ids.iter().filter_map(|id| self.read_one(subdir, id).map(|v| (id.clone(), v))).collect()
    }
}

#[async_trait]
impl Fetcher for FsFetcher {
    async fn fetch_requests(&self, ids: &[String]) -> HashMap<String, Value> {
        self.read_many("requests", ids)
    }

    async fn fetch_impressions(&self, ids: &[String]) -> HashMap<String, Value> {
        self.read_many("imps", ids)
    }
}
