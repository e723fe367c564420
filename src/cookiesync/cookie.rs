//! Wire encoding for the `uids` cookie (§6 "Cookie format").

use crate::cookiesync::model::UidsCookie;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CookieDecodeError {
    #[error("malformed base64")]
    BadEncoding,
    #[error("malformed json: {0}")]
    BadJson(#[from] serde_json::Error),
}

pub fn encode(cookie: &UidsCookie) -> String {
    let json = serde_json::to_vec(cookie).expect("UidsCookie always serializes");
    URL_SAFE_NO_PAD.encode(json)
}

pub fn decode(value: &str) -> Result<UidsCookie, CookieDecodeError> {
    let bytes = URL_SAFE_NO_PAD.decode(value).map_err(|_| CookieDecodeError::BadEncoding)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// The cookie's `Domain` attribute: the request's Host header minus any
/// trailing `:port`.
pub fn cookie_domain(host: &str) -> String {
    host.rsplit_once(':').map(|(h, _)| h.to_string()).unwrap_or_else(|| host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_base64url_json() {
        let mut cookie = UidsCookie::new();
        cookie.uids.insert("acme".into(), "acme-remote-1".into());
        cookie.optout = Some(false);

        let encoded = encode(&cookie);
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, cookie);
    }

    #[test]
    fn garbage_input_is_rejected() {
        assert!(decode("not valid base64!!").is_err());
    }

    #[test]
    fn host_with_port_strips_port() {
        assert_eq!(cookie_domain("exchange.example.com:8443"), "exchange.example.com");
    }

    #[test]
    fn host_without_port_is_unchanged() {
        assert_eq!(cookie_domain("exchange.example.com"), "exchange.example.com");
    }
}
