//! The adapter contract (§6) and a convenience implementation of the common
//! "POST JSON, parse JSON" pattern so a simple bidder adapter is a few lines
//! of configuration, per the design note in §9.

use crate::auction::context::{BidderResponse, OutboundRequest, TypedBid};
use crate::auction::nobid::{BidderError, BidderErrorCode};
use crate::rtb::{Bid, BidRequest, MediaType};
use anyhow::Error;
use std::time::Duration;

/// Bidders must not retain references to the request beyond the call (§6).
/// Both methods therefore take owned/borrowed data and return owned results.
/// Neither method is `async`: per the coordinator's design, request building
/// and response parsing are pure CPU and need not suspend — only the HTTP
/// call between them, issued by the coordinator via [`DemandClient`], does.
pub trait Adapter: Send + Sync {
    /// Pure function: builds zero or more outbound HTTP requests for the
    /// imps routed to this bidder. Errors are collected, not fatal — a
    /// bidder producing one bad request among several still gets the rest
    /// dispatched.
    fn make_requests(&self, req: &BidRequest) -> (Vec<OutboundRequest>, Vec<BidderError>);

    /// Parses one HTTP response body into typed bids.
    fn make_bids(
        &self,
        req: &BidRequest,
        status: u16,
        body: &[u8],
    ) -> Result<BidderResponse, BidderError>;

    /// Per-call timeout ceiling this adapter would like, before being
    /// clamped against the coordinator's remaining deadline (§5).
    fn default_timeout(&self) -> Duration {
        Duration::from_millis(500)
    }
}

/// Reserved method name (§4.7): an [`OutboundRequest`] with `method == MOCK_METHOD`
/// short-circuits the HTTP step and synthesizes an empty OK response, used by
/// tests. `MOCK_SCHEME` is also honored as a secondary convention for
/// mock URIs built without bothering to set `method`.
pub const MOCK_METHOD: &str = "MOCK";
pub const MOCK_SCHEME: &str = "mock://";

/// Convenience base for bidders that speak plain "POST OpenRTB JSON, get
/// OpenRTB-ish JSON back". Concrete adapters provide only a URL and a bid
/// extraction closure; everything else (encoding, currency, bid typing) is
/// handled here.
pub struct SimpleJsonAdapter {
    pub bidder_code: String,
    pub endpoint: String,
}

#[derive(serde::Deserialize)]
struct SimpleBidWire {
    id: Option<String>,
    #[serde(default)]
    impid: String,
    price: f64,
    #[serde(default)]
    cur: Option<String>,
    #[serde(default)]
    adm: Option<String>,
}

#[derive(serde::Deserialize, Default)]
struct SimpleResponseWire {
    #[serde(default)]
    bids: Vec<SimpleBidWire>,
}

impl Adapter for SimpleJsonAdapter {
    fn make_requests(&self, req: &BidRequest) -> (Vec<OutboundRequest>, Vec<BidderError>) {
        if req.imp.is_empty() {
            return (
                Vec::new(),
                vec![BidderError::new(&self.bidder_code, BidderErrorCode::BadRequest, "no imps")],
            );
        }

        let body = match serde_json::to_vec(req) {
            Ok(body) => body,
            Err(e) => {
                return (
                    Vec::new(),
                    vec![BidderError::new(
                        &self.bidder_code,
                        BidderErrorCode::Marshal,
                        format!("failed to marshal request: {e}"),
                    )],
                );
            }
        };

        (
            vec![OutboundRequest {
                method: "POST".into(),
                uri: self.endpoint.clone(),
                headers: vec![("Content-Type".into(), "application/json".into())],
                body,
            }],
            Vec::new(),
        )
    }

    fn make_bids(
        &self,
        req: &BidRequest,
        status: u16,
        body: &[u8],
    ) -> Result<BidderResponse, BidderError> {
        if status != 200 {
            return Err(BidderError::new(
                &self.bidder_code,
                BidderErrorCode::BadStatus,
                format!("unexpected status {status}"),
            ));
        }

        let wire: SimpleResponseWire = serde_json::from_slice(body).map_err(|e| {
            BidderError::new(&self.bidder_code, BidderErrorCode::Parse, format!("parse error: {e}"))
        })?;

        let mut bids = Vec::with_capacity(wire.bids.len());
        for wb in wire.bids {
            let media_type = req
                .imp
                .iter()
                .find(|imp| imp.id == wb.impid)
                .and_then(|imp| imp.media_type())
                .unwrap_or(MediaType::Banner);

            bids.push(TypedBid {
                bid: Bid {
                    id: wb.id.unwrap_or_else(|| format!("{}-{}", self.bidder_code, wb.impid)),
                    impid: wb.impid,
                    price: wb.price,
                    cur: wb.cur.unwrap_or_else(|| "USD".into()),
                    adm: wb.adm,
                    ext: None,
                },
                bid_type: media_type,
            });
        }

        Ok(BidderResponse { currency: "USD".into(), bids })
    }
}

/// Dispatches adapter-built outbound requests over HTTP. A single
/// `reqwest::Client` is shared and reused (connection pooling), matching the
/// teacher's `DemandClient` pattern; timeouts are applied per-call by the
/// coordinator rather than baked into the client.
pub struct DemandClient {
    http: reqwest::Client,
}

impl DemandClient {
    pub fn new() -> Result<Self, Error> {
        let http = reqwest::ClientBuilder::new()
            .user_agent("hbx-exchange")
            .pool_max_idle_per_host(128)
            .tcp_nodelay(true)
            .gzip(true)
            .deflate(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { http })
    }

    /// Issues one outbound request under `timeout`. A request whose method is
    /// the reserved [`MOCK_METHOD`] (or whose URI carries the [`MOCK_SCHEME`]
    /// prefix) short-circuits to a synthetic empty-200 response without any
    /// network I/O, so unit and integration tests never depend on a live
    /// bidder. A `delay_ms=<n>` query parameter on the URI makes the
    /// short-circuit sleep first, so coordinator tests can exercise deadline
    /// cancellation without a real socket.
    pub async fn send(
        &self,
        outbound: &OutboundRequest,
        timeout: Duration,
    ) -> Result<(u16, Vec<u8>), Error> {
        if outbound.method == MOCK_METHOD || outbound.uri.starts_with(MOCK_SCHEME) {
            if let Some(delay_ms) =
                outbound.uri.split("delay_ms=").nth(1).and_then(|v| v.parse::<u64>().ok())
            {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            return Ok((200, Vec::new()));
        }

        let mut builder = self.http.post(&outbound.uri).body(outbound.body.clone());
        for (key, value) in &outbound.headers {
            builder = builder.header(key, value);
        }

        let response = tokio::time::timeout(timeout, builder.send()).await??;
        let status = response.status().as_u16();
        let bytes = tokio::time::timeout(timeout, response.bytes()).await??;
        Ok((status, bytes.to_vec()))
    }
}

/// Adapters used only by the crate's own test suite.
#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;

    /// An adapter that always bids a fixed price on every imp addressed to
    /// it via the reserved mock scheme, used across the coordinator tests.
    pub struct EchoAdapter {
        pub price: f64,
        pub delay: Duration,
    }

    impl Default for EchoAdapter {
        fn default() -> Self {
            Self { price: 1.0, delay: Duration::ZERO }
        }
    }

    impl Adapter for EchoAdapter {
        fn make_requests(&self, _req: &BidRequest) -> (Vec<OutboundRequest>, Vec<BidderError>) {
            (
                vec![OutboundRequest {
                    method: MOCK_METHOD.into(),
                    uri: format!("{MOCK_SCHEME}echo?delay_ms={}", self.delay.as_millis()),
                    headers: Vec::new(),
                    body: Vec::new(),
                }],
                Vec::new(),
            )
        }

        fn make_bids(
            &self,
            req: &BidRequest,
            _status: u16,
            _body: &[u8],
        ) -> Result<BidderResponse, BidderError> {
            let bids = req
                .imp
                .iter()
                .map(|imp| TypedBid {
                    bid: Bid {
                        id: format!("echo-{}", imp.id),
                        impid: imp.id.clone(),
                        price: self.price,
                        cur: "USD".into(),
                        adm: Some("<ad/>".into()),
                        ext: None,
                    },
                    bid_type: imp.media_type().unwrap_or(MediaType::Banner),
                })
                .collect();

            Ok(BidderResponse { currency: "USD".into(), bids })
        }

        fn default_timeout(&self) -> Duration {
            self.delay + Duration::from_millis(50)
        }
    }
}
