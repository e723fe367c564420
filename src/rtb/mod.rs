//! In-memory OpenRTB 2.5/2.6 object model.
//!
//! Fields map one-to-one onto the wire schema. Anything the exchange doesn't
//! need to reason about structurally is kept as an opaque [`serde_json::Value`]
//! under `ext` so it round-trips untouched.

pub mod bid_request;
pub mod bid_response;

pub use bid_request::{
    App, BidRequest, Device, DistributionChannel, Geo, Imp, MediaType, Regs, Site, Source, User,
};
pub use bid_response::{Bid, BidResponse, SeatBid};
