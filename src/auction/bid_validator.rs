//! C8 — Bid Validator (§4.8).

use crate::auction::context::{BidderCall, TypedBid};
use crate::rtb::Imp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloorMode {
    /// Bids under the floor are dropped outright.
    Hard,
    /// Bids under the floor pass through with a warning recorded.
    Soft,
}

/// Validates one bidder's collected bids against their imps' floors,
/// in place. Returns the warnings generated (currency-mismatch skip,
/// soft-floor pass-through) for the caller to fold into the auction's
/// warning log.
pub fn validate_bids(call: &mut BidderCall, mode: FloorMode) -> Vec<String> {
    let mut warnings = Vec::new();
    let imps_by_id: std::collections::HashMap<&str, &Imp> =
        call.imps.iter().map(|imp| (imp.id.as_str(), imp)).collect();

    for response in call.responses.iter_mut() {
        response.bids.retain(|typed: &TypedBid| {
            let Some(imp) = imps_by_id.get(typed.bid.impid.as_str()) else {
                return true;
            };
            if imp.bidfloor <= 0.0 {
                return true;
            }

            if typed.bid.cur != imp.bidfloorcur {
                warnings.push(format!(
                    "bid {} currency {} does not match floor currency {}; floor validation skipped",
                    typed.bid.id, typed.bid.cur, imp.bidfloorcur
                ));
                return true;
            }

            if typed.bid.price >= imp.bidfloor {
                return true;
            }

            match mode {
                FloorMode::Hard => false,
                FloorMode::Soft => {
                    warnings.push(format!(
                        "bid {} price {} below floor {} for imp {} (soft mode, passed through)",
                        typed.bid.id, typed.bid.price, imp.bidfloor, typed.bid.impid
                    ));
                    true
                }
            }
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::context::BidderResponse;
    use crate::auction::registry::{BidderInfo, Capabilities, DemandType};
    use crate::rtb::Bid;

    fn call_with(imp_floor: f64, bid_price: f64, cur: &str) -> BidderCall {
        let mut call = BidderCall::new(
            "acme".into(),
            BidderInfo {
                code: "acme".into(),
                enabled: true,
                gvl_id: None,
                capabilities: Capabilities::all(),
                demand_type: DemandType::Exchange,
            },
            vec![Imp { id: "imp-1".into(), bidfloor: imp_floor, bidfloorcur: "USD".into(), ..Default::default() }],
        );
        call.responses.push(BidderResponse {
            currency: "USD".into(),
            bids: vec![TypedBid {
                bid: Bid { id: "bid-1".into(), impid: "imp-1".into(), price: bid_price, cur: cur.into(), ..Default::default() },
                bid_type: crate::rtb::MediaType::Banner,
            }],
        });
        call
    }

    #[test]
    fn hard_mode_drops_below_floor_bids() {
        let mut call = call_with(2.0, 1.0, "USD");
        let warnings = validate_bids(&mut call, FloorMode::Hard);
        assert!(call.responses[0].bids.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn soft_mode_keeps_below_floor_bids_with_a_warning() {
        let mut call = call_with(2.0, 1.0, "USD");
        let warnings = validate_bids(&mut call, FloorMode::Soft);
        assert_eq!(call.responses[0].bids.len(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn at_or_above_floor_always_passes() {
        let mut call = call_with(2.0, 2.0, "USD");
        let warnings = validate_bids(&mut call, FloorMode::Hard);
        assert_eq!(call.responses[0].bids.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn currency_mismatch_skips_floor_check_with_a_warning() {
        let mut call = call_with(5.0, 1.0, "EUR");
        let warnings = validate_bids(&mut call, FloorMode::Hard);
        assert_eq!(call.responses[0].bids.len(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn zero_floor_skips_validation_entirely() {
        let mut call = call_with(0.0, 0.01, "USD");
        let warnings = validate_bids(&mut call, FloorMode::Hard);
        assert_eq!(call.responses[0].bids.len(), 1);
        assert!(warnings.is_empty());
    }
}
