use crate::auction::nobid::{BidderError, Regulation, RejectReason};
use crate::auction::registry::BidderInfo;
use crate::rtb::{Bid, BidRequest, BidResponse};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A single outbound HTTP request an adapter wants issued.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: String,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// A bid paired with the bid-type it came in as (needed by response assembly
/// and, in a fuller build, creative rendering — out of scope here).
#[derive(Debug, Clone)]
pub struct TypedBid {
    pub bid: Bid,
    pub bid_type: crate::rtb::MediaType,
}

/// What an adapter's `MakeBids` produced for one HTTP completion.
#[derive(Debug, Clone, Default)]
pub struct BidderResponse {
    pub currency: String,
    pub bids: Vec<TypedBid>,
}

/// Per-bidder runtime record, alive only for the duration of one auction.
/// Mirrors the teacher's `BidderContext` / `BidderCallout` split: the imps
/// routed to this bidder, the outbound requests it produced, and whatever
/// came back.
pub struct BidderCall {
    pub bidder_code: String,
    pub info: BidderInfo,
    pub imps: Vec<crate::rtb::Imp>,
    pub outbound: Vec<OutboundRequest>,
    pub responses: Vec<BidderResponse>,
    pub errors: Vec<BidderError>,
    pub latency: Option<Duration>,
    /// Set when the bidder was excluded at selection time (capability
    /// mismatch, missing consent, opt-out) rather than having actually run.
    pub skip_reason: Option<String>,
    /// Monotonic completion order assigned by the coordinator, used to break
    /// price ties deterministically regardless of actual wall-clock
    /// scheduling (§4.9).
    pub arrival_seq: Option<u64>,
    /// Set when the deadline fired before this bidder's HTTP call(s)
    /// completed; its bids, if any arrived anyway, are discarded (§4.7).
    pub timed_out: bool,
}

impl BidderCall {
    pub fn new(bidder_code: String, info: BidderInfo, imps: Vec<crate::rtb::Imp>) -> Self {
        Self {
            bidder_code,
            info,
            imps,
            outbound: Vec::new(),
            responses: Vec::new(),
            errors: Vec::new(),
            latency: None,
            skip_reason: None,
            arrival_seq: None,
            timed_out: false,
        }
    }
}

/// The terminal outcome of a completed auction (§2 control flow: every stage
/// past C4 produces *some* response, even on partial failure).
#[derive(Debug, Clone)]
pub enum AuctionOutcome {
    Bid(BidResponse),
    /// No seatbids were produced; still an HTTP 200 (§8 invariant 1).
    NoBid { reqid: String, nbr: i32, desc: String },
}

/// Privacy state computed by the gate (C4) and consumed by the selector (C6).
#[derive(Debug, Clone, Default)]
pub struct PrivacyState {
    pub regulation: Regulation,
    pub gdpr_applies: bool,
    pub vendor_consent: Option<crate::auction::privacy::tcf::VendorConsent>,
    pub purpose_consent: Option<[bool; 24]>,
    pub us_privacy_opt_out: bool,
}

impl Default for Regulation {
    fn default() -> Self {
        Regulation::None
    }
}

/// Top-level context threaded through the whole auction pipeline. Interior
/// mutability throughout, same as the teacher's `AuctionContext`: stages run
/// in sequence on a single task so there's no real contention, but the shape
/// keeps individual stages borrow-checker-simple without needing `&mut`
/// chains through the pipeline trait.
pub struct AuctionContext {
    pub pubid: String,
    pub source: String,
    pub req: RwLock<BidRequest>,
    pub privacy: OnceLock<PrivacyState>,
    pub bidders: Mutex<Vec<BidderCall>>,
    pub warnings: parking_lot::Mutex<Vec<String>>,
    pub reject: OnceLock<RejectReason>,
    pub outcome: OnceLock<AuctionOutcome>,
    pub started_at: Instant,
    pub tmax: Duration,
    /// Debug mode was requested *and* authorized (§6).
    pub debug: bool,
    pub latencies: parking_lot::Mutex<HashMap<String, Duration>>,
}

impl AuctionContext {
    pub fn new(source: String, pubid: String, req: BidRequest, tmax: Duration, debug: bool) -> Self {
        Self {
            pubid,
            source,
            req: RwLock::new(req),
            privacy: OnceLock::new(),
            bidders: Mutex::new(Vec::new()),
            warnings: parking_lot::Mutex::new(Vec::new()),
            reject: OnceLock::new(),
            outcome: OnceLock::new(),
            started_at: Instant::now(),
            tmax,
            debug,
            latencies: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.tmax.saturating_sub(self.elapsed())
    }

    pub fn request_id(&self) -> String {
        self.req.read().id.clone()
    }
}
