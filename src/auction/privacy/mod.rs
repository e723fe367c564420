//! C4 — Privacy Gate: admits or rejects the request, and mutates it
//! (IP anonymization) before fan-out (§4.4).

pub mod ccpa;
pub mod gpp;
pub mod regulation;
pub mod tcf;

use crate::auction::context::PrivacyState;
use crate::auction::nobid::{nbr, PrivacyViolation, Regulation};
use crate::rtb::BidRequest;

/// The five environment flags from §6, each defaulting to true.
#[derive(Debug, Clone, Copy)]
pub struct PrivacyConfig {
    pub enforce_gdpr: bool,
    pub enforce_coppa: bool,
    pub enforce_ccpa: bool,
    pub geo_enforcement: bool,
    pub strict_mode: bool,
    pub anonymize_ip: bool,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            enforce_gdpr: true,
            enforce_coppa: true,
            enforce_ccpa: true,
            geo_enforcement: true,
            strict_mode: true,
            anonymize_ip: true,
        }
    }
}

/// Purposes required in strict mode: storage/access (1), basic ads (2),
/// measurement (7).
const REQUIRED_STRICT_PURPOSES: [usize; 3] = [1, 2, 7];

/// Runs the gate against a request, returning the computed [`PrivacyState`]
/// on success (and mutating `req` in place for IP anonymization) or a
/// [`PrivacyViolation`] that should short-circuit the auction with HTTP 400.
pub fn enforce(req: &mut BidRequest, config: &PrivacyConfig) -> Result<PrivacyState, PrivacyViolation> {
    let geo = req.device.as_ref().and_then(|d| d.geo.as_ref());
    let regulation = regulation::detect(geo);

    let gdpr_applies = req.regs.as_ref().and_then(|r| r.gdpr).unwrap_or(0) == 1;
    let coppa_applies = req.regs.as_ref().and_then(|r| r.coppa).unwrap_or(0) == 1;
    let us_privacy = req.regs.as_ref().map(|r| r.us_privacy.as_str()).unwrap_or("");

    if config.enforce_coppa && coppa_applies {
        return Err(PrivacyViolation::new(Regulation::None, "COPPA applies", nbr::ADS_NOT_ALLOWED));
    }

    if config.geo_enforcement {
        if regulation == Regulation::Gdpr && !gdpr_applies {
            return Err(PrivacyViolation::new(
                Regulation::Gdpr,
                "geo indicates GDPR applies but regs.gdpr is not set",
                nbr::INVALID_REQUEST,
            ));
        }
        if is_us_state_regulation(regulation) && us_privacy.is_empty() {
            return Err(PrivacyViolation::new(
                regulation,
                "geo indicates a US state privacy law applies but us_privacy is empty",
                nbr::INVALID_REQUEST,
            ));
        }
    }

    let mut purpose_consent = None;
    let mut vendor_consent = None;

    if config.enforce_gdpr && gdpr_applies {
        let consent_str = req.user.as_ref().map(|u| u.consent.as_str()).unwrap_or("");
        if consent_str.is_empty() {
            return Err(PrivacyViolation::new(
                Regulation::Gdpr,
                "GDPR applies but user.consent is empty",
                nbr::ADS_NOT_ALLOWED,
            ));
        }

        let consent = tcf::parse(consent_str).map_err(|e| {
            PrivacyViolation::new(Regulation::Gdpr, format!("malformed TCF consent string: {e}"), nbr::INVALID_REQUEST)
        })?;

        if config.strict_mode {
            for purpose in REQUIRED_STRICT_PURPOSES {
                if !consent.purpose_consent(purpose) {
                    return Err(PrivacyViolation::new(
                        Regulation::Gdpr,
                        format!("missing consent for required purpose {purpose}"),
                        nbr::ADS_NOT_ALLOWED,
                    ));
                }
            }
        }

        purpose_consent = Some(consent.purposes);
        vendor_consent = Some(consent.vendor_consent);
    }

    let mut us_opt_out = false;
    if config.enforce_ccpa && !us_privacy.is_empty() {
        if let Some(parsed) = ccpa::parse(us_privacy) {
            if parsed.opt_out {
                return Err(PrivacyViolation::new(
                    regulation,
                    "CCPA opt-out signaled in us_privacy string",
                    nbr::ADS_NOT_ALLOWED,
                ));
            }
            us_opt_out = parsed.opt_out;
        }
    }

    if gdpr_applies && config.anonymize_ip {
        anonymize_device_ips(req);
    }

    Ok(PrivacyState {
        regulation,
        gdpr_applies,
        vendor_consent,
        purpose_consent,
        us_privacy_opt_out: us_opt_out,
    })
}

fn is_us_state_regulation(r: Regulation) -> bool {
    matches!(r, Regulation::Ccpa | Regulation::Vcdpa | Regulation::Cpa | Regulation::Ctdpa | Regulation::Ucpa)
}

/// Zeroes the last octet of an IPv4 address (/24) and the last 10 bytes of
/// an IPv6 address (/48), leaving malformed addresses untouched.
fn anonymize_device_ips(req: &mut BidRequest) {
    let Some(device) = req.device.as_mut() else { return };

    if !device.ip.is_empty() {
        let mut parts: Vec<&str> = device.ip.split('.').collect();
        if parts.len() == 4 {
            parts[3] = "0";
            device.ip = parts.join(".");
        }
    }

    if !device.ipv6.is_empty() {
        if let Some(anon) = anonymize_ipv6(&device.ipv6) {
            device.ipv6 = anon;
        }
    }
}

/// `/48` anonymization: keep the first 3 of 8 hextets, zero the rest.
/// Handles the `::`-compressed form by expanding before truncating.
fn anonymize_ipv6(addr: &str) -> Option<String> {
    use std::net::Ipv6Addr;
    let parsed: Ipv6Addr = addr.parse().ok()?;
    let segments = parsed.segments();
    let anonymized = [segments[0], segments[1], segments[2], 0, 0, 0, 0, 0];
    Some(Ipv6Addr::from(anonymized).to_string())
}

/// Vendor-consent gating used by the selector (C6, §4.4 last paragraph).
pub fn vendor_has_consent(state: &PrivacyState, gvl_id: u16) -> bool {
    match &state.vendor_consent {
        Some(consent) => consent.contains(gvl_id),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtb::{Device, Geo, Regs, User};

    fn base_request() -> BidRequest {
        BidRequest { tmax: 500, ..Default::default() }
    }

    #[test]
    fn coppa_rejects_regardless_of_geo() {
        let mut req = base_request();
        req.regs = Some(Regs { coppa: Some(1), ..Default::default() });
        let err = enforce(&mut req, &PrivacyConfig::default()).unwrap_err();
        assert_eq!(err.nbr, nbr::ADS_NOT_ALLOWED);
    }

    #[test]
    fn gdpr_without_consent_is_rejected() {
        let mut req = base_request();
        req.device = Some(Device {
            geo: Some(Geo { country: "DEU".into(), region: String::new() }),
            ..Default::default()
        });
        req.regs = Some(Regs { gdpr: Some(1), ..Default::default() });
        req.user = Some(User { consent: String::new(), ..Default::default() });

        let err = enforce(&mut req, &PrivacyConfig::default()).unwrap_err();
        assert_eq!(err.regulation, Regulation::Gdpr);
        assert_eq!(err.nbr, nbr::ADS_NOT_ALLOWED);
    }

    #[test]
    fn ccpa_opt_out_is_rejected() {
        let mut req = base_request();
        req.device = Some(Device {
            geo: Some(Geo { country: "USA".into(), region: "CA".into() }),
            ..Default::default()
        });
        req.regs = Some(Regs { us_privacy: "1YYN".into(), ..Default::default() });

        let err = enforce(&mut req, &PrivacyConfig::default()).unwrap_err();
        assert_eq!(err.nbr, nbr::ADS_NOT_ALLOWED);
    }

    #[test]
    fn geo_enforcement_rejects_missing_us_privacy_string() {
        let mut req = base_request();
        req.device = Some(Device {
            geo: Some(Geo { country: "USA".into(), region: "CA".into() }),
            ..Default::default()
        });
        let err = enforce(&mut req, &PrivacyConfig::default()).unwrap_err();
        assert_eq!(err.nbr, nbr::INVALID_REQUEST);
    }

    #[test]
    fn ipv4_anonymized_to_slash_24() {
        let mut req = base_request();
        req.device = Some(Device {
            ip: "192.168.1.100".into(),
            geo: Some(Geo { country: "DEU".into(), region: String::new() }),
            ..Default::default()
        });
        req.regs = Some(Regs { gdpr: Some(1), ..Default::default() });
        req.user = Some(User { consent: tcf_fixture(), ..Default::default() });

        let config = PrivacyConfig { strict_mode: false, ..Default::default() };
        enforce(&mut req, &config).unwrap();
        assert_eq!(req.device.unwrap().ip, "192.168.1.0");
    }

    #[test]
    fn no_regulation_passes_through_untouched() {
        let mut req = base_request();
        let state = enforce(&mut req, &PrivacyConfig::default()).unwrap();
        assert_eq!(state.regulation, Regulation::None);
        assert!(!state.gdpr_applies);
    }

    /// Builds a minimal valid TCF v2 string with purposes 1/2/7 granted, for
    /// tests that need to get past the strict-mode purpose check.
    fn tcf_fixture() -> String {
        let mut bits: Vec<bool> = Vec::new();
        let push_int = |bits: &mut Vec<bool>, value: u64, n: usize| {
            for i in (0..n).rev() {
                bits.push((value >> i) & 1 == 1);
            }
        };
        push_int(&mut bits, 2, 6);
        push_int(&mut bits, 0, 36);
        push_int(&mut bits, 0, 36);
        push_int(&mut bits, 1, 12);
        push_int(&mut bits, 1, 12);
        push_int(&mut bits, 0, 6);
        push_int(&mut bits, 0, 12);
        push_int(&mut bits, 1, 12);
        push_int(&mut bits, 2, 6);
        bits.push(false);
        bits.push(false);
        push_int(&mut bits, 0, 12);
        for p in 1..=24u8 {
            bits.push(p == 1 || p == 2 || p == 7);
        }
        push_int(&mut bits, 0, 24);
        bits.push(false);
        push_int(&mut bits, 0, 12);
        push_int(&mut bits, 1, 16);
        bits.push(false);
        bits.push(true);
        while bits.len() % 8 != 0 {
            bits.push(false);
        }
        let mut out = vec![0u8; bits.len() / 8];
        for (i, bit) in bits.iter().enumerate() {
            if *bit {
                out[i / 8] |= 1 << (7 - i % 8);
            }
        }
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        URL_SAFE_NO_PAD.encode(out)
    }
}
