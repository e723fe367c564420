//! C9 — Winner Selector & Response Builder (§4.9).

use crate::auction::context::{AuctionContext, AuctionOutcome, BidderCall, TypedBid};
use crate::auction::nobid::nbr;
use crate::auction::registry::DemandType;
use crate::pipeline::AsyncTask;
use crate::rtb::{Bid, BidResponse, SeatBid};
use anyhow::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Highest price wins; ties broken by lower arrival sequence (first-arrived),
/// matching `f64::total_cmp` so NaN prices (which shouldn't occur but must
/// not panic sort) sort as the lowest rather than trapping.
fn beats(candidate_price: f64, candidate_seq: u64, incumbent_price: f64, incumbent_seq: u64) -> bool {
    match candidate_price.total_cmp(&incumbent_price) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Equal => candidate_seq < incumbent_seq,
        std::cmp::Ordering::Less => false,
    }
}

struct SeatGroup {
    seat: String,
    /// impid -> (winning bid, its call's arrival sequence)
    winners: HashMap<String, (TypedBid, u64)>,
}

impl SeatGroup {
    fn new(seat: String) -> Self {
        Self { seat, winners: HashMap::new() }
    }

    fn offer(&mut self, impid: &str, bid: TypedBid, seq: u64) {
        match self.winners.get(impid) {
            Some((incumbent, incumbent_seq)) if !beats(bid.bid.price, seq, incumbent.bid.price, *incumbent_seq) => {}
            _ => {
                self.winners.insert(impid.to_string(), (bid, seq));
            }
        }
    }

    fn highest_price(&self) -> f64 {
        self.winners.values().map(|(b, _)| b.bid.price).fold(f64::MIN, f64::max)
    }

    fn into_seat_bid(self) -> Option<SeatBid> {
        if self.winners.is_empty() {
            return None;
        }
        let bids: Vec<Bid> = self.winners.into_values().map(|(typed, _)| typed.bid).collect();
        Some(SeatBid { seat: self.seat, bid: bids })
    }
}

/// Descending by each seat's highest winning price, matching the teacher's
/// `sort_seats_by_highest_bid` convention for a stable, revenue-legible
/// ordering in the response.
fn sort_seats_by_highest_bid(seats: &mut [(SeatBid, f64)]) {
    seats.sort_by(|(_, a), (_, b)| b.total_cmp(a));
}

fn group_and_select(calls: Vec<BidderCall>) -> Vec<SeatBid> {
    let mut exchange_group = SeatGroup::new(String::new());
    let mut publisher_groups: HashMap<String, SeatGroup> = HashMap::new();

    for call in calls {
        let seq = call.arrival_seq.unwrap_or(u64::MAX);
        let group = match call.info.demand_type {
            DemandType::PublisherSpecific => {
                publisher_groups.entry(call.bidder_code.clone()).or_insert_with(|| SeatGroup::new(call.bidder_code.clone()))
            }
            DemandType::Exchange => &mut exchange_group,
        };

        for response in &call.responses {
            for typed in &response.bids {
                group.offer(&typed.bid.impid, typed.clone(), seq);
            }
        }
    }

    let mut seats: Vec<(SeatBid, f64)> = Vec::new();
    if let Some(seat) = {
        let highest = exchange_group.highest_price();
        exchange_group.into_seat_bid().map(|s| (s, highest))
    } {
        seats.push(seat);
    }
    for (_, group) in publisher_groups {
        let highest = group.highest_price();
        if let Some(seat_bid) = group.into_seat_bid() {
            seats.push((seat_bid, highest));
        }
    }

    sort_seats_by_highest_bid(&mut seats);
    seats.into_iter().map(|(s, _)| s).collect()
}

/// Assembles the `ext.errors`/`responsetimemillis`/`tmaxrequest` debug block
/// (§4.9 "Response extension"), only when debug mode was authorized.
fn debug_ext(calls: &[BidderCall], total_latency: Duration) -> serde_json::Value {
    let mut response_times = serde_json::Map::new();
    let mut errors = serde_json::Map::new();

    for call in calls {
        if let Some(latency) = call.latency {
            response_times.insert(call.bidder_code.clone(), serde_json::json!(latency.as_millis() as i64));
        }
        if !call.errors.is_empty() {
            let entries: Vec<serde_json::Value> =
                call.errors.iter().map(|e| serde_json::json!({"code": 1, "message": e.message})).collect();
            errors.insert(call.bidder_code.clone(), serde_json::Value::Array(entries));
        }
    }

    serde_json::json!({
        "responsetimemillis": response_times,
        "errors": errors,
        "tmaxrequest": total_latency.as_millis() as i64,
    })
}

pub struct SettlementTask;

#[async_trait]
impl AsyncTask<AuctionContext> for SettlementTask {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), Error> {
        let calls = std::mem::take(&mut *ctx.bidders.lock().await);
        let reqid = ctx.request_id();
        let total_latency = ctx.elapsed();
        let debug = ctx.debug;

        let ext = if debug { Some(debug_ext(&calls, total_latency)) } else { None };
        let seatbid = group_and_select(calls);

        let outcome = if seatbid.is_empty() {
            AuctionOutcome::NoBid { reqid: reqid.clone(), nbr: nbr::NO_BIDDERS, desc: "no bidders returned a bid".into() }
        } else {
            AuctionOutcome::Bid(BidResponse { id: reqid, seatbid, cur: "USD".into(), nbr: None, ext })
        };

        let _ = ctx.outcome.set(outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::context::BidderResponse;
    use crate::auction::registry::{BidderInfo, Capabilities};
    use crate::rtb::MediaType;

    fn info(code: &str, demand_type: DemandType) -> BidderInfo {
        BidderInfo { code: code.into(), enabled: true, gvl_id: None, capabilities: Capabilities::all(), demand_type }
    }

    fn call_with_bid(code: &str, demand_type: DemandType, impid: &str, price: f64, seq: u64) -> BidderCall {
        let mut call = BidderCall::new(code.into(), info(code, demand_type), Vec::new());
        call.arrival_seq = Some(seq);
        call.responses.push(BidderResponse {
            currency: "USD".into(),
            bids: vec![TypedBid {
                bid: Bid { id: format!("{code}-{impid}"), impid: impid.into(), price, cur: "USD".into(), ..Default::default() },
                bid_type: MediaType::Banner,
            }],
        });
        call
    }

    #[test]
    fn exchange_bidders_are_merged_into_one_seat_with_the_highest_bid() {
        let calls = vec![
            call_with_bid("acme", DemandType::Exchange, "imp-1", 1.0, 0),
            call_with_bid("beta", DemandType::Exchange, "imp-1", 2.5, 1),
        ];
        let seats = group_and_select(calls);
        assert_eq!(seats.len(), 1);
        assert_eq!(seats[0].seat, "");
        assert_eq!(seats[0].bid.len(), 1);
        assert_eq!(seats[0].bid[0].price, 2.5);
    }

    #[test]
    fn publisher_specific_bidders_get_their_own_seat() {
        let calls = vec![
            call_with_bid("acme", DemandType::PublisherSpecific, "imp-1", 1.0, 0),
            call_with_bid("beta", DemandType::PublisherSpecific, "imp-1", 2.0, 1),
        ];
        let seats = group_and_select(calls);
        assert_eq!(seats.len(), 2);
        assert!(seats.iter().any(|s| s.seat == "acme"));
        assert!(seats.iter().any(|s| s.seat == "beta"));
    }

    #[test]
    fn ties_are_broken_by_first_arrival() {
        let calls = vec![
            call_with_bid("acme", DemandType::Exchange, "imp-1", 2.0, 5),
            call_with_bid("beta", DemandType::Exchange, "imp-1", 2.0, 1),
        ];
        let seats = group_and_select(calls);
        assert_eq!(seats[0].bid[0].id, "beta-imp-1");
    }

    #[test]
    fn seats_are_sorted_by_highest_price_descending() {
        let calls = vec![
            call_with_bid("acme", DemandType::PublisherSpecific, "imp-1", 1.0, 0),
            call_with_bid("beta", DemandType::PublisherSpecific, "imp-1", 9.0, 1),
        ];
        let seats = group_and_select(calls);
        assert_eq!(seats[0].seat, "beta");
        assert_eq!(seats[1].seat, "acme");
    }

    #[test]
    fn no_bids_produces_empty_seat_list() {
        let seats = group_and_select(Vec::new());
        assert!(seats.is_empty());
    }
}
