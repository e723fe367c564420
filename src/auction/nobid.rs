//! Shared error taxonomy (§7) and the OpenRTB no-bid reason vocabulary (§2 C10).

use serde::Serialize;
use thiserror::Error;

/// OpenRTB 2.5 §5.24 no-bid reason codes, extended locally with the 500-series
/// exchange-specific codes the auction coordinator needs.
pub mod nbr {
    pub const UNKNOWN_ERROR: i32 = 0;
    pub const TECHNICAL_ERROR: i32 = 1;
    pub const INVALID_REQUEST: i32 = 2;
    pub const KNOWN_SPIDER: i32 = 3;
    pub const NON_HUMAN_TRAFFIC: i32 = 4;
    pub const DATA_CENTER: i32 = 5;
    pub const UNSUPPORTED_DEVICE: i32 = 6;
    pub const BLOCKED_PUBLISHER: i32 = 7;
    pub const UNMATCHED_USER: i32 = 8;
    pub const DAILY_USER_CAP: i32 = 9;
    pub const DAILY_DOMAIN_CAP: i32 = 10;
    pub const ADS_NOT_ALLOWED: i32 = 11;
    pub const NO_BIDDERS: i32 = 500;
    pub const TIMEOUT: i32 = 501;
}

/// `ValidationError` — request malformed at the OpenRTB level (§7, C3).
/// Carries a dotted field path and, for array fields, the offending index so
/// the HTTP layer can render an actionable 400.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub index: Option<usize>,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), index: None, message: message.into() }
    }

    pub fn at(field: impl Into<String>, index: usize, message: impl Into<String>) -> Self {
        Self { field: field.into(), index: Some(index), message: message.into() }
    }
}

/// The regulation a request was detected to fall under (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Regulation {
    Gdpr,
    Ccpa,
    Vcdpa,
    Cpa,
    Ctdpa,
    Ucpa,
    /// Detected but not enforced (logged only): LGPD, PIPEDA, PDPA.
    LoggedOnly,
    None,
}

impl std::fmt::Display for Regulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Regulation::Gdpr => "GDPR",
            Regulation::Ccpa => "CCPA",
            Regulation::Vcdpa => "VCDPA",
            Regulation::Cpa => "CPA",
            Regulation::Ctdpa => "CTDPA",
            Regulation::Ucpa => "UCPA",
            Regulation::LoggedOnly => "LOGGED_ONLY",
            Regulation::None => "NONE",
        };
        f.write_str(s)
    }
}

/// `PrivacyViolation` — regulation enforcement blocked the request (§7, C4).
#[derive(Debug, Clone, Error, Serialize)]
#[error("{reason}")]
pub struct PrivacyViolation {
    pub regulation: Regulation,
    pub reason: String,
    pub nbr: i32,
}

impl PrivacyViolation {
    pub fn new(regulation: Regulation, reason: impl Into<String>, nbr: i32) -> Self {
        Self { regulation, reason: reason.into(), nbr }
    }
}

/// `BidderError` — a recoverable per-bidder failure (§7, C7/C10). Never
/// propagated past the bidder's own task; surfaced only in `ext.errors`
/// under debug mode.
#[derive(Debug, Clone, Error, Serialize)]
#[error("[{bidder_code}] {code:?}: {message}")]
pub struct BidderError {
    pub bidder_code: String,
    pub code: BidderErrorCode,
    pub message: String,
}

impl BidderError {
    pub fn new(bidder_code: impl Into<String>, code: BidderErrorCode, message: impl Into<String>) -> Self {
        Self { bidder_code: bidder_code.into(), code, message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BidderErrorCode {
    Marshal,
    BadRequest,
    BadStatus,
    Parse,
    Timeout,
    Connection,
}

/// `StoredFetchError` — a failed stored-config fetch for the *required*
/// top-level stored request id (§4.2, §7). Auxiliary stored-imp fetch
/// failures are demoted to warnings and never reach this type.
#[derive(Debug, Clone, Error)]
#[error("failed to fetch stored request {id}: {message}")]
pub struct StoredFetchError {
    pub id: String,
    pub message: String,
}

/// Request-level rejection raised by an early pipeline stage (C3/C4), caught
/// by the HTTP handler before the coordinator ever runs.
#[derive(Debug, Clone, Error)]
pub enum RejectReason {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Privacy(#[from] PrivacyViolation),
    #[error(transparent)]
    StoredFetch(#[from] StoredFetchError),
}
