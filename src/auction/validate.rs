//! C3 — Request Validator (§4.3).

use crate::auction::nobid::ValidationError;
use crate::rtb::BidRequest;

/// Structural validation; returns the first violation found. Mirrors the
/// field-path/index shape the teacher's own validator uses so the HTTP
/// layer can render an actionable 400 without further translation.
pub fn validate(req: &BidRequest) -> Result<(), ValidationError> {
    if req.id.is_empty() {
        return Err(ValidationError::new("id", "must not be empty"));
    }

    if req.imp.is_empty() {
        return Err(ValidationError::new("imp", "at least one impression required"));
    }

    for (index, imp) in req.imp.iter().enumerate() {
        if imp.id.is_empty() {
            return Err(ValidationError::at("imp[].id", index, "must not be empty"));
        }

        let media_types_set = [imp.banner.is_some(), imp.video.is_some(), imp.native.is_some(), imp.audio.is_some()]
            .iter()
            .filter(|set| **set)
            .count();

        if media_types_set != 1 {
            return Err(ValidationError::at(
                "imp[]",
                index,
                "exactly one of banner|video|native|audio must be set",
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtb::{Banner, Imp};

    fn valid_request() -> BidRequest {
        BidRequest {
            id: "req-1".into(),
            imp: vec![Imp {
                id: "imp-1".into(),
                banner: Some(Banner::default()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn accepts_a_well_formed_request() {
        assert!(validate(&valid_request()).is_ok());
    }

    #[test]
    fn rejects_empty_id() {
        let mut req = valid_request();
        req.id = String::new();
        let err = validate(&req).unwrap_err();
        assert_eq!(err.field, "id");
    }

    #[test]
    fn rejects_empty_imp_list() {
        let mut req = valid_request();
        req.imp.clear();
        let err = validate(&req).unwrap_err();
        assert_eq!(err.field, "imp");
    }

    #[test]
    fn rejects_imp_with_no_media_type() {
        let mut req = valid_request();
        req.imp[0].banner = None;
        let err = validate(&req).unwrap_err();
        assert_eq!(err.field, "imp[]");
        assert_eq!(err.index, Some(0));
    }

    #[test]
    fn rejects_imp_with_two_media_types() {
        let mut req = valid_request();
        req.imp[0].video = Some(crate::rtb::Video::default());
        let err = validate(&req).unwrap_err();
        assert_eq!(err.index, Some(0));
    }

    #[test]
    fn rejects_imp_with_empty_id() {
        let mut req = valid_request();
        req.imp[0].id = String::new();
        let err = validate(&req).unwrap_err();
        assert_eq!(err.field, "imp[].id");
    }
}
