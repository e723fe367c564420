//! Minimal Global Privacy Platform string splitting (§10.5 supplement).
//!
//! GPP carries a tilde-separated list of per-section payloads, each prefixed
//! by a `SectionId` header. We only need to locate the US-national and the
//! TCF-EU-v2 sections so the gate can fall back to them when the legacy
//! `us_privacy`/`consent` fields are absent; we don't decode the sections
//! themselves (the TCF section, when present, reuses the same bit layout as
//! [`super::tcf`], but is rarely seen in the wild set alongside GPP).

pub const SECTION_TCF_EU_V2: i32 = 2;
pub const SECTION_US_PRIVACY: i32 = 6;
pub const SECTION_US_NATIONAL: i32 = 7;

/// Parses `regs.gpp_sid` (the GPP Section Ids header, §GLOSSARY) together
/// with the tilde-separated `regs.gpp` string into `(section_id, payload)`
/// pairs. Sections are matched positionally against the id list; a
/// mismatched count is tolerated by truncating to the shorter of the two.
pub fn split_sections<'a>(gpp: &'a str, gpp_sid: &[i32]) -> Vec<(i32, &'a str)> {
    if gpp.is_empty() {
        return Vec::new();
    }
    gpp.split('~')
        .zip(gpp_sid.iter().copied())
        .map(|(payload, id)| (id, payload))
        .collect()
}

pub fn section<'a>(gpp: &'a str, gpp_sid: &[i32], id: i32) -> Option<&'a str> {
    split_sections(gpp, gpp_sid).into_iter().find(|(sid, _)| *sid == id).map(|(_, p)| p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_sections_by_positional_id() {
        let sections = split_sections("usnat-payload~tcfeu-payload", &[7, 2]);
        assert_eq!(sections, vec![(7, "usnat-payload"), (2, "tcfeu-payload")]);
    }

    #[test]
    fn finds_the_requested_section() {
        let payload = section("a~b~c", &[7, 2, 6], SECTION_TCF_EU_V2);
        assert_eq!(payload, Some("b"));
    }

    #[test]
    fn empty_gpp_yields_no_sections() {
        assert!(split_sections("", &[7]).is_empty());
    }
}
