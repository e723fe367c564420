//! C1 — Adapter Registry: the set of bidder implementations keyed by bidder
//! code, with static metadata. Immutable after service start, so lookups are
//! lock-free reads of a plain map behind an `Arc`.

use crate::auction::adapter::Adapter;
use crate::rtb::MediaType;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Whether a bidder's bids are grouped into its own `SeatBid` or merged into
/// the shared exchange-level seat (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandType {
    PublisherSpecific,
    Exchange,
}

impl Default for DemandType {
    fn default() -> Self {
        DemandType::Exchange
    }
}

/// Media types a bidder accepts, per platform (site vs app).
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub site: HashSet<MediaType>,
    pub app: HashSet<MediaType>,
}

impl Capabilities {
    pub fn all() -> Self {
        let all: HashSet<MediaType> =
            [MediaType::Banner, MediaType::Video, MediaType::Native, MediaType::Audio]
                .into_iter()
                .collect();
        Self { site: all.clone(), app: all }
    }

    pub fn covers(&self, is_app: bool, media_type: MediaType) -> bool {
        if is_app { &self.app } else { &self.site }.contains(&media_type)
    }
}

/// Static metadata about one registered bidder.
#[derive(Clone)]
pub struct BidderInfo {
    pub code: String,
    pub enabled: bool,
    pub gvl_id: Option<u16>,
    pub capabilities: Capabilities,
    pub demand_type: DemandType,
}

struct Entry {
    adapter: Arc<dyn Adapter>,
    info: BidderInfo,
}

/// Holds every configured bidder adapter. Built once at startup and never
/// mutated again — matches the teacher's registry/manager split, collapsed
/// here into one type since this exchange has no hot-reload requirement.
pub struct AdapterRegistry {
    entries: HashMap<String, Entry>,
}

impl AdapterRegistry {
    pub fn lookup(&self, code: &str) -> Option<(Arc<dyn Adapter>, &BidderInfo)> {
        self.entries.get(code).map(|e| (e.adapter.clone(), &e.info))
    }

    pub fn list_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.entries.keys().cloned().collect();
        codes.sort();
        codes.dedup();
        codes
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BidderInfo)> {
        self.entries.iter().map(|(k, v)| (k, &v.info))
    }
}

/// Builds an [`AdapterRegistry`]. Adapters are registered once at process
/// startup from configuration (§4.1 `Register(code, adapter, info)`).
#[derive(Default)]
pub struct AdapterRegistryBuilder {
    entries: HashMap<String, Entry>,
}

impl AdapterRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, code: impl Into<String>, adapter: Arc<dyn Adapter>, info: BidderInfo) -> Self {
        let code = code.into();
        self.entries.insert(code, Entry { adapter, info });
        self
    }

    pub fn build(self) -> AdapterRegistry {
        AdapterRegistry { entries: self.entries }
    }
}

/// Resolves the Open Question in §9: a single capability for listing bidder
/// codes, implemented directly by the registry so `/info/bidders` has one
/// unambiguous source of truth rather than the teacher's overlapping
/// static+dynamic shapes.
pub trait BidderLister: Send + Sync {
    fn list_bidder_codes(&self) -> Vec<String>;
}

impl BidderLister for AdapterRegistry {
    fn list_bidder_codes(&self) -> Vec<String> {
        self.list_codes()
    }
}
