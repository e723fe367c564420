//! HTTP surface (§6): six endpoints bound to the auction pipeline and the
//! cookie-sync service. Handlers are thin, matching the teacher's
//! `start_server.rs` pattern of pushing all real work into a pipeline and
//! keeping the actix layer limited to extraction, dispatch, and response
//! shaping.

use crate::auction::context::{AuctionContext, AuctionOutcome};
use crate::auction::nobid::{nbr, RejectReason};
use crate::auction::registry::{AdapterRegistry, BidderLister};
use crate::cookiesync::constants::COOKIE_NAME;
use crate::cookiesync::cookie::{self, cookie_domain};
use crate::cookiesync::model::UidsCookie;
use crate::cookiesync::utils::generate_local_id;
use crate::cookiesync::CookieSyncService;
use crate::pipeline::Pipeline;
use crate::rtb::BidRequest;
use actix_web::cookie::{time::Duration as CookieDuration, Cookie};
use actix_web::{web, HttpRequest, HttpResponse};
use anyhow::Error;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct AppState {
    pub pipeline: Arc<Pipeline<AuctionContext, Error>>,
    pub registry: Arc<AdapterRegistry>,
    pub cookie_sync: Arc<CookieSyncService>,
    pub debug_requires_auth: bool,
}

#[derive(Deserialize)]
struct AuctionQuery {
    #[serde(default)]
    debug: Option<String>,
}

/// §6: debug mode is ignored unless the caller presents `X-API-Key` or a
/// non-empty `Authorization: Bearer` token.
fn is_authorized(http_req: &HttpRequest) -> bool {
    if http_req.headers().contains_key("X-API-Key") {
        return true;
    }
    http_req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| !token.is_empty())
        .unwrap_or(false)
}

pub async fn auction(
    state: web::Data<AppState>,
    body: web::Json<BidRequest>,
    query: web::Query<AuctionQuery>,
    http_req: HttpRequest,
) -> HttpResponse {
    let req = body.into_inner();
    let debug_requested = matches!(query.debug.as_deref(), Some("1") | Some("true"));
    let debug = debug_requested && (!state.debug_requires_auth || is_authorized(&http_req));

    let tmax = if req.tmax > 0 { Duration::from_millis(req.tmax as u64) } else { Duration::from_millis(1000) };
    let pubid = req.publisher_id().unwrap_or_default();
    let source = http_req.path().to_string();

    let ctx = AuctionContext::new(source, pubid, req, tmax, debug);

    match state.pipeline.run(&ctx).await {
        Ok(()) => {}
        Err(e) => {
            debug!("auction pipeline rejected request: {e}");
            return reject_response(&e);
        }
    }

    match ctx.outcome.into_inner() {
        Some(AuctionOutcome::Bid(response)) => HttpResponse::Ok().json(response),
        Some(AuctionOutcome::NoBid { reqid, nbr, desc }) => {
            debug!("no bid: {desc}");
            HttpResponse::Ok().json(crate::rtb::BidResponse {
                id: reqid,
                seatbid: Vec::new(),
                cur: "USD".into(),
                nbr: Some(nbr),
                ext: None,
            })
        }
        None => HttpResponse::InternalServerError().json(serde_json::json!({"error": "Internal server error"})),
    }
}

fn reject_response(e: &Error) -> HttpResponse {
    match e.downcast_ref::<RejectReason>() {
        Some(RejectReason::Validation(v)) => HttpResponse::BadRequest().json(serde_json::json!({"error": v.to_string()})),
        Some(RejectReason::Privacy(p)) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": p.reason,
            "reason": p.reason,
            "regulation": p.regulation.to_string(),
            "nbr": p.nbr,
        })),
        Some(RejectReason::StoredFetch(s)) => {
            HttpResponse::BadRequest().json(serde_json::json!({"error": s.to_string()}))
        }
        None => HttpResponse::InternalServerError().json(serde_json::json!({"error": "Internal server error"})),
    }
}

pub async fn status(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "bidders": state.registry.list_bidder_codes().len(),
    }))
}

pub async fn info_bidders(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.registry.list_bidder_codes())
}

fn local_id_from_rxid_cookie(http_req: &HttpRequest) -> Option<String> {
    http_req.cookie("rxid").map(|c| c.value().to_string())
}

#[derive(Deserialize)]
pub struct CookieSyncRequest {
    #[serde(default)]
    bidders: Vec<String>,
}

pub async fn cookie_sync(state: web::Data<AppState>, body: web::Json<CookieSyncRequest>, http_req: HttpRequest) -> HttpResponse {
    let local_id = local_id_from_rxid_cookie(&http_req).unwrap_or_else(generate_local_id);
    let statuses = state.cookie_sync.cookie_sync(&local_id, &body.bidders).await;

    let rxid_cookie = Cookie::build("rxid", local_id)
        .domain(cookie_domain(http_req.connection_info().host()))
        .path("/")
        .max_age(CookieDuration::days(180))
        .finish();

    HttpResponse::Ok().cookie(rxid_cookie).json(serde_json::json!({"bidders": statuses}))
}

#[derive(Deserialize)]
pub struct SetUidQuery {
    bidder: Option<String>,
    uid: Option<String>,
}

/// 1x1 transparent GIF, returned so `/setuid` can be fired as an `<img>` pixel.
const TRANSPARENT_GIF: &[u8] =
    &[0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b];

pub async fn setuid(state: web::Data<AppState>, query: web::Query<SetUidQuery>, http_req: HttpRequest) -> HttpResponse {
    let Some(bidder) = query.bidder.clone().filter(|b| !b.is_empty()) else {
        return HttpResponse::BadRequest().json(serde_json::json!({"error": "missing bidder"}));
    };
    let Some(uid) = query.uid.clone() else {
        return HttpResponse::BadRequest().json(serde_json::json!({"error": "missing uid"}));
    };

    let local_id = local_id_from_rxid_cookie(&http_req).unwrap_or_else(generate_local_id);
    let cookie_payload = state.cookie_sync.setuid(&local_id, &bidder, uid).await;
    let uids_cookie = build_uids_cookie(&http_req, &cookie_payload);

    HttpResponse::Ok().content_type("image/gif").cookie(uids_cookie).body(TRANSPARENT_GIF)
}

pub async fn optout(state: web::Data<AppState>, http_req: HttpRequest) -> HttpResponse {
    let Some(local_id) = local_id_from_rxid_cookie(&http_req) else {
        return HttpResponse::Ok().body("<html><body>No synced data to opt out of.</body></html>");
    };

    let cookie_payload = state.cookie_sync.optout(&local_id).await;
    let uids_cookie = build_uids_cookie(&http_req, &cookie_payload);

    HttpResponse::Ok().cookie(uids_cookie).body("<html><body>You have been opted out.</body></html>")
}

fn build_uids_cookie<'a>(http_req: &HttpRequest, payload: &UidsCookie) -> Cookie<'a> {
    Cookie::build(COOKIE_NAME, cookie::encode(payload))
        .domain(cookie_domain(http_req.connection_info().host()))
        .path("/")
        .max_age(CookieDuration::days(180))
        .finish()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/openrtb2/auction", web::post().to(auction))
        .route("/status", web::get().to(status))
        .route("/info/bidders", web::get().to(info_bidders))
        .route("/cookie_sync", web::post().to(cookie_sync))
        .route("/setuid", web::get().to(setuid))
        .route("/optout", web::get().to(optout));
}
