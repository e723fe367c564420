//! Bit-level TCF v2 consent string parsing (§3, §4.4, §REDESIGN "Bit-level TCF parsing").
//!
//! The wire format is a base64url (falling back to standard base64) encoded
//! bit string, read big-endian bit-by-bit rather than byte-by-byte. A
//! malformed trailing segment must not invalidate fields already read, so
//! the reader itself never errors — it returns 0/false past the end of the
//! buffer and the caller decides what "short" means.

use thiserror::Error;

/// Minimum decoded length (bytes) below which a TCF string cannot possibly
/// carry its fixed header (version, timestamps, CMP id, purpose bitmap).
const MIN_HEADER_BYTES: usize = 15;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TcfError {
    #[error("consent string is not valid base64")]
    BadEncoding,
    #[error("consent string shorter than the minimum TCF header ({0} bytes)")]
    TooShort(usize),
    #[error("unsupported TCF version {0}")]
    UnsupportedVersion(u8),
}

/// A bit-by-bit reader over a byte slice, tolerant of reads past the end.
struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_bool(&mut self) -> bool {
        self.read_int(1) == 1
    }

    /// Reads `n` bits as a big-endian unsigned integer, 0 if the read runs
    /// past the end of the buffer.
    fn read_int(&mut self, n: usize) -> u64 {
        let mut value: u64 = 0;
        for _ in 0..n {
            let byte_idx = self.pos / 8;
            let bit = if byte_idx < self.bytes.len() {
                let shift = 7 - (self.pos % 8);
                (self.bytes[byte_idx] >> shift) & 1
            } else {
                0
            };
            value = (value << 1) | bit as u64;
            self.pos += 1;
        }
        value
    }

    fn bits_remaining(&self) -> usize {
        self.bytes.len() * 8 - self.pos.min(self.bytes.len() * 8)
    }
}

/// Vendor consent, decoded into whichever concrete shape the string used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorConsent {
    /// Bitfield: bit `i` (1-indexed) set means vendor `i` has consent.
    BitField(Vec<bool>),
    /// Range-encoded: an explicit sorted set of consented vendor ids.
    Ranges(Vec<u16>),
}

impl VendorConsent {
    pub fn contains(&self, gvl_id: u16) -> bool {
        match self {
            VendorConsent::BitField(bits) => {
                let idx = gvl_id as usize;
                idx >= 1 && idx <= bits.len() && bits[idx - 1]
            }
            VendorConsent::Ranges(ids) => ids.binary_search(&gvl_id).is_ok(),
        }
    }
}

/// Decoded TCF v2 consent data (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcfConsent {
    pub version: u8,
    pub cmp_id: u16,
    /// 1-indexed in the spec; stored 0-indexed here (`purposes[0]` == purpose 1).
    pub purposes: [bool; 24],
    pub vendor_consent: VendorConsent,
}

impl TcfConsent {
    pub fn purpose_consent(&self, purpose: usize) -> bool {
        purpose >= 1 && purpose <= self.purposes.len() && self.purposes[purpose - 1]
    }
}

fn decode_payload(consent: &str) -> Result<Vec<u8>, TcfError> {
    use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
    use base64::Engine;

    URL_SAFE_NO_PAD
        .decode(consent)
        .or_else(|_| STANDARD_NO_PAD.decode(consent))
        .map_err(|_| TcfError::BadEncoding)
}

/// Parses a TCF v2 consent string. Tolerant of extra trailing bytes; strict
/// about the fixed-width header fields the gate actually relies on.
pub fn parse(consent: &str) -> Result<TcfConsent, TcfError> {
    let bytes = decode_payload(consent)?;
    if bytes.len() < MIN_HEADER_BYTES {
        return Err(TcfError::TooShort(bytes.len()));
    }

    let mut r = BitReader::new(&bytes);
    let version = r.read_int(6) as u8;
    if version != 1 && version != 2 {
        return Err(TcfError::UnsupportedVersion(version));
    }
    let _created = r.read_int(36);
    let _last_updated = r.read_int(36);
    let cmp_id = r.read_int(12) as u16;
    let _cmp_version = r.read_int(12);
    let _consent_screen = r.read_int(6);
    let _consent_language = r.read_int(12);
    let _vendor_list_version = r.read_int(12);
    let _policy_version = if version == 2 { r.read_int(6) } else { 0 };
    let _is_service_specific = r.read_bool();
    let _use_non_standard_stacks = r.read_bool();
    let _special_feature_opt_ins = r.read_int(12);

    let mut purposes = [false; 24];
    for slot in purposes.iter_mut() {
        *slot = r.read_bool();
    }

    let _purposes_lit_transparency = r.read_int(24);
    let _purpose_one_treatment = r.read_bool();
    let _publisher_cc = r.read_int(12);
    let max_vendor_id = r.read_int(16) as u16;
    let is_range_encoding = r.read_bool();

    let vendor_consent = if is_range_encoding {
        let default_consent = r.read_bool();
        let num_entries = r.read_int(12);
        let mut ranges = Vec::new();
        for _ in 0..num_entries {
            if r.bits_remaining() == 0 {
                break;
            }
            let is_range = r.read_bool();
            let start = r.read_int(16) as u16;
            if is_range {
                let end = r.read_int(16) as u16;
                ranges.extend(start..=end);
            } else {
                ranges.push(start);
            }
        }
        if default_consent && max_vendor_id > 0 {
            for id in 1..=max_vendor_id {
                if !ranges.contains(&id) {
                    ranges.push(id);
                }
            }
        }
        ranges.sort_unstable();
        ranges.dedup();
        VendorConsent::Ranges(ranges)
    } else {
        let mut bits = Vec::with_capacity(max_vendor_id as usize);
        for _ in 0..max_vendor_id {
            bits.push(r.read_bool());
        }
        VendorConsent::BitField(bits)
    };

    Ok(TcfConsent { version, cmp_id, purposes, vendor_consent })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-builds a minimal valid TCF v2 string with purposes 1, 2, 7
    /// granted and vendor 7 consented via a bitfield, then checks the
    /// reader round-trips it.
    fn encode_fixture() -> String {
        let mut bits: Vec<bool> = Vec::new();
        let push_int = |bits: &mut Vec<bool>, value: u64, n: usize| {
            for i in (0..n).rev() {
                bits.push((value >> i) & 1 == 1);
            }
        };

        push_int(&mut bits, 2, 6); // version
        push_int(&mut bits, 0, 36); // created
        push_int(&mut bits, 0, 36); // last updated
        push_int(&mut bits, 42, 12); // cmp id
        push_int(&mut bits, 1, 12); // cmp version
        push_int(&mut bits, 0, 6); // consent screen
        push_int(&mut bits, 0, 12); // consent language
        push_int(&mut bits, 1, 12); // vendor list version
        push_int(&mut bits, 2, 6); // policy version
        bits.push(false); // is service specific
        bits.push(false); // use non-standard stacks
        push_int(&mut bits, 0, 12); // special feature opt-ins

        for p in 1..=24u8 {
            bits.push(p == 1 || p == 2 || p == 7);
        }

        push_int(&mut bits, 0, 24); // purposes lit transparency
        bits.push(false); // purpose one treatment
        push_int(&mut bits, 0, 12); // publisher cc

        push_int(&mut bits, 10, 16); // max vendor id
        bits.push(false); // is range encoding (bitfield)
        for v in 1..=10u8 {
            bits.push(v == 7);
        }

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

    #[test]
    fn parses_purposes_and_bitfield_vendor_consent() {
        let consent = parse(&encode_fixture()).unwrap();
        assert_eq!(consent.version, 2);
        assert_eq!(consent.cmp_id, 42);
        assert!(consent.purpose_consent(1));
        assert!(consent.purpose_consent(2));
        assert!(consent.purpose_consent(7));
        assert!(!consent.purpose_consent(3));
        assert!(consent.vendor_consent.contains(7));
        assert!(!consent.vendor_consent.contains(8));
    }

    #[test]
    fn rejects_strings_shorter_than_the_header() {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        let short = URL_SAFE_NO_PAD.encode([0u8; 4]);
        assert_eq!(parse(&short), Err(TcfError::TooShort(4)));
    }

    #[test]
    fn rejects_invalid_base64() {
        assert_eq!(parse("not valid base64!!!"), Err(TcfError::BadEncoding));
    }

    #[test]
    fn bit_reader_returns_zero_past_the_end_instead_of_panicking() {
        let mut r = BitReader::new(&[0b1010_0000]);
        assert!(r.read_bool());
        assert!(!r.read_bool());
        assert!(r.read_bool());
        // Past the 8 real bits: tolerant zeros, no panic.
        assert_eq!(r.read_int(32), 0);
    }
}
