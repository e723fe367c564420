//! Regulation detection from geography (§4.4).

use crate::auction::nobid::Regulation;
use crate::rtb::Geo;

const EEA_AND_UK: &[&str] = &[
    "AUT", "BEL", "BGR", "HRV", "CYP", "CZE", "DNK", "EST", "FIN", "FRA", "DEU", "GRC", "HUN",
    "ISL", "IRL", "ITA", "LVA", "LIE", "LTU", "LUX", "MLT", "NLD", "NOR", "POL", "PRT", "ROU",
    "SVK", "SVN", "ESP", "SWE", "GBR",
];

const LOGGED_ONLY: &[&str] = &["BRA", "CAN", "SGP"];

/// Classifies the request's jurisdiction from `device.geo` alone; actual
/// enforcement still depends on the `regs` fields the gate reads separately.
pub fn detect(geo: Option<&Geo>) -> Regulation {
    let Some(geo) = geo else { return Regulation::None };
    let country = geo.country.to_ascii_uppercase();

    if EEA_AND_UK.contains(&country.as_str()) {
        return Regulation::Gdpr;
    }

    if country == "USA" {
        return match geo.region.to_ascii_uppercase().as_str() {
            "CA" => Regulation::Ccpa,
            "VA" => Regulation::Vcdpa,
            "CO" => Regulation::Cpa,
            "CT" => Regulation::Ctdpa,
            "UT" => Regulation::Ucpa,
            _ => Regulation::None,
        };
    }

    if LOGGED_ONLY.contains(&country.as_str()) {
        return Regulation::LoggedOnly;
    }

    Regulation::None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_eea_country_as_gdpr() {
        let geo = Geo { country: "DEU".into(), region: String::new() };
        assert_eq!(detect(Some(&geo)), Regulation::Gdpr);
    }

    #[test]
    fn classifies_california_as_ccpa() {
        let geo = Geo { country: "USA".into(), region: "CA".into() };
        assert_eq!(detect(Some(&geo)), Regulation::Ccpa);
    }

    #[test]
    fn classifies_unlisted_us_state_as_none() {
        let geo = Geo { country: "USA".into(), region: "TX".into() };
        assert_eq!(detect(Some(&geo)), Regulation::None);
    }

    #[test]
    fn missing_geo_is_none() {
        assert_eq!(detect(None), Regulation::None);
    }
}
