//! C6 — Bidder Selector (§4.6).

use crate::auction::context::{BidderCall, PrivacyState};
use crate::auction::nobid::{BidderError, BidderErrorCode};
use crate::auction::privacy;
use crate::auction::registry::AdapterRegistry;
use crate::auction::nobid::Regulation;
use crate::rtb::{BidRequest, Imp};
use std::collections::HashMap;

/// Builds the ordered list of `(bidderCode, impsForBidder)` pairs, already
/// carrying the registered adapter and its static info. Bidders skipped for
/// any reason are recorded as a [`BidderCall`] with `skip_reason` set and
/// zero imps, so debug output can surface *why* a targeted bidder never ran.
pub fn select(
    req: &BidRequest,
    registry: &AdapterRegistry,
    privacy_state: &PrivacyState,
) -> Vec<BidderCall> {
    let is_app = req.app.is_some();

    let mut per_bidder_imps: HashMap<String, Vec<Imp>> = HashMap::new();
    for imp in &req.imp {
        for code in imp.targeted_bidders() {
            per_bidder_imps.entry(code).or_default().push(imp.clone());
        }
    }

    let mut calls = Vec::with_capacity(per_bidder_imps.len());
    let mut codes: Vec<String> = per_bidder_imps.keys().cloned().collect();
    codes.sort();

    for code in codes {
        let imps = per_bidder_imps.remove(&code).unwrap_or_default();

        let Some((_, info)) = registry.lookup(&code) else {
            calls.push(skipped(code, "bidder not registered"));
            continue;
        };

        if !info.enabled {
            calls.push(skipped_with(info.clone(), "bidder disabled"));
            continue;
        }

        let uncovered: Vec<&Imp> = imps
            .iter()
            .filter(|imp| match imp.media_type() {
                Some(mt) => !info.capabilities.covers(is_app, mt),
                None => true,
            })
            .collect();
        if !uncovered.is_empty() && uncovered.len() == imps.len() {
            calls.push(skipped_with(info.clone(), "no impression matches bidder capabilities"));
            continue;
        }
        let imps: Vec<Imp> = imps
            .into_iter()
            .filter(|imp| imp.media_type().map(|mt| info.capabilities.covers(is_app, mt)).unwrap_or(false))
            .collect();
        if imps.is_empty() {
            calls.push(skipped_with(info.clone(), "no impression matches bidder capabilities"));
            continue;
        }

        if privacy_state.regulation == Regulation::Gdpr && privacy_state.gdpr_applies {
            let has_consent = info.gvl_id.map(|id| privacy::vendor_has_consent(privacy_state, id)).unwrap_or(false);
            if !has_consent {
                calls.push(skipped_with(info.clone(), "missing GDPR vendor consent"));
                continue;
            }
        }

        if privacy_state.us_privacy_opt_out {
            calls.push(skipped_with(info.clone(), "US privacy opt-out signaled"));
            continue;
        }

        calls.push(BidderCall::new(code, info.clone(), imps));
    }

    calls
}

fn skipped(code: String, reason: &str) -> BidderCall {
    let mut call = BidderCall::new(
        code.clone(),
        crate::auction::registry::BidderInfo {
            code,
            enabled: false,
            gvl_id: None,
            capabilities: crate::auction::registry::Capabilities::default(),
            demand_type: crate::auction::registry::DemandType::default(),
        },
        Vec::new(),
    );
    call.skip_reason = Some(reason.to_string());
    call.errors.push(BidderError::new(&call.bidder_code, BidderErrorCode::BadRequest, reason));
    call
}

fn skipped_with(info: crate::auction::registry::BidderInfo, reason: &str) -> BidderCall {
    let code = info.code.clone();
    let mut call = BidderCall::new(code, info, Vec::new());
    call.skip_reason = Some(reason.to_string());
    call.errors.push(BidderError::new(&call.bidder_code, BidderErrorCode::BadRequest, reason));
    call
}
