//! C5 — Floor Enricher (§4.5, §3 `FloorRule`/`FloorData`).

use crate::rtb::{BidRequest, Imp, MediaType};
use async_trait::async_trait;
use moka::sync::Cache;
use std::time::Duration;

/// A single floor rule. Every field is a wildcard when `None`.
#[derive(Debug, Clone, Default)]
pub struct FloorRule {
    pub publisher_id: Option<String>,
    pub domain: Option<String>,
    pub ad_unit_code: Option<String>,
    pub media_type: Option<MediaType>,
    pub size: Option<(i32, i32)>,
    pub country: Option<String>,
    pub device_type: Option<i32>,
    pub floor: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FloorData {
    pub default_floor: Option<f64>,
    pub rules: Vec<FloorRule>,
}

/// What the enricher scores a rule against, built per-impression.
struct MatchCriteria {
    publisher_id: Option<String>,
    domain: Option<String>,
    ad_unit_code: Option<String>,
    media_type: Option<MediaType>,
    size: Option<(i32, i32)>,
    country: Option<String>,
    device_type: Option<i32>,
}

fn criteria_for(req: &BidRequest, imp: &Imp) -> MatchCriteria {
    let banner_size = imp.banner.as_ref().and_then(|b| Some((b.w?, b.h?)));
    MatchCriteria {
        publisher_id: req.publisher_id(),
        domain: Some(req.domain()).filter(|d| !d.is_empty()),
        ad_unit_code: Some(imp.tagid.clone()).filter(|t| !t.is_empty()),
        media_type: imp.media_type(),
        size: banner_size,
        country: req.device.as_ref().and_then(|d| d.geo.as_ref()).map(|g| g.country.clone()).filter(|c| !c.is_empty()),
        device_type: req.device.as_ref().map(|d| d.devicetype),
    }
}

/// Sum of per-field weights (§3); a single non-empty-field mismatch
/// invalidates the rule entirely.
fn score(rule: &FloorRule, criteria: &MatchCriteria) -> Option<i32> {
    let mut total = 0;

    macro_rules! field {
        ($rule_field:expr, $criteria_field:expr, $weight:expr) => {
            if let Some(wanted) = &$rule_field {
                match &$criteria_field {
                    Some(actual) if actual == wanted => total += $weight,
                    _ => return None,
                }
            }
        };
    }

    field!(rule.publisher_id, criteria.publisher_id, 10);
    field!(rule.domain, criteria.domain, 8);
    field!(rule.ad_unit_code, criteria.ad_unit_code, 6);
    field!(rule.media_type, criteria.media_type, 4);
    field!(rule.size, criteria.size, 3);
    field!(rule.country, criteria.country, 2);
    field!(rule.device_type, criteria.device_type, 1);

    Some(total)
}

fn best_rule<'a>(rules: &'a [FloorRule], criteria: &MatchCriteria) -> Option<&'a FloorRule> {
    let mut best: Option<(&FloorRule, i32)> = None;
    for rule in rules {
        let Some(s) = score(rule, criteria) else { continue };
        if s <= 0 {
            continue;
        }
        match best {
            Some((_, best_score)) if best_score >= s => {}
            _ => best = Some((rule, s)),
        }
    }
    best.map(|(rule, _)| rule)
}

/// Source of floor data, e.g. a pricing-engine HTTP call. Mirrors the
/// teacher's `Provider<T>` shape.
#[async_trait]
pub trait FloorProvider: Send + Sync {
    async fn get_floors(&self, req: &BidRequest) -> Option<FloorData>;
}

/// No floors configured; the enricher becomes a no-op.
pub struct NoopFloorProvider;

#[async_trait]
impl FloorProvider for NoopFloorProvider {
    async fn get_floors(&self, _req: &BidRequest) -> Option<FloorData> {
        None
    }
}

pub struct FloorEnricher {
    provider: Box<dyn FloorProvider>,
    cache: Cache<String, Option<FloorData>>,
    provider_timeout: Duration,
}

impl FloorEnricher {
    pub fn new(provider: Box<dyn FloorProvider>, ttl: Duration, provider_timeout: Duration) -> Self {
        Self { provider, cache: Cache::builder().time_to_live(ttl).build(), provider_timeout }
    }

    fn cache_key(req: &BidRequest) -> String {
        format!("{}:{}", req.publisher_id().unwrap_or_default(), req.domain())
    }

    /// Fetches (or reuses a cached) [`FloorData`] and applies it to every
    /// impression that doesn't already carry a publisher-set floor.
    pub async fn enrich(&self, req: &mut BidRequest) {
        let key = Self::cache_key(req);

        let data = if let Some(cached) = self.cache.get(&key) {
            cached
        } else {
            let fetched = tokio::time::timeout(self.provider_timeout, self.provider.get_floors(req))
                .await
                .unwrap_or(None);
            self.cache.insert(key, fetched.clone());
            fetched
        };

        let Some(data) = data else { return };

        let criteria: Vec<MatchCriteria> = req.imp.iter().map(|imp| criteria_for(req, imp)).collect();
        for (imp, criteria) in req.imp.iter_mut().zip(criteria) {
            if imp.bidfloor > 0.0 {
                continue;
            }
            if let Some(rule) = best_rule(&data.rules, &criteria) {
                imp.bidfloor = rule.floor;
            } else if let Some(default_floor) = data.default_floor {
                imp.bidfloor = default_floor;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtb::{Banner, Device, Geo, Imp, Publisher, Site};

    fn request_with_imp(tagid: &str, floor: f64) -> BidRequest {
        BidRequest {
            id: "req-1".into(),
            site: Some(Site {
                domain: "example.com".into(),
                publisher: Some(Publisher { id: "pub-1".into() }),
                ..Default::default()
            }),
            device: Some(Device { geo: Some(Geo { country: "USA".into(), region: String::new() }), ..Default::default() }),
            imp: vec![Imp {
                id: "imp-1".into(),
                tagid: tagid.into(),
                banner: Some(Banner { w: Some(300), h: Some(250) }),
                bidfloor: floor,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn highest_scoring_rule_wins() {
        let criteria = criteria_for(&request_with_imp("slot-1", 0.0), &request_with_imp("slot-1", 0.0).imp[0]);
        let rules = vec![
            FloorRule { country: Some("USA".into()), floor: 0.5, ..Default::default() },
            FloorRule {
                ad_unit_code: Some("slot-1".into()),
                country: Some("USA".into()),
                floor: 2.0,
                ..Default::default()
            },
        ];
        let winner = best_rule(&rules, &criteria).unwrap();
        assert_eq!(winner.floor, 2.0);
    }

    #[test]
    fn mismatching_non_empty_field_invalidates_rule() {
        let req = request_with_imp("slot-1", 0.0);
        let criteria = criteria_for(&req, &req.imp[0]);
        let rules = vec![FloorRule { country: Some("DEU".into()), floor: 9.0, ..Default::default() }];
        assert!(best_rule(&rules, &criteria).is_none());
    }

    #[tokio::test]
    async fn never_overwrites_a_publisher_set_floor() {
        struct FixedProvider;
        #[async_trait]
        impl FloorProvider for FixedProvider {
            async fn get_floors(&self, _req: &BidRequest) -> Option<FloorData> {
                Some(FloorData { default_floor: Some(5.0), rules: Vec::new() })
            }
        }

        let enricher = FloorEnricher::new(Box::new(FixedProvider), Duration::from_secs(60), Duration::from_millis(100));
        let mut req = request_with_imp("slot-1", 1.25);
        enricher.enrich(&mut req).await;
        assert_eq!(req.imp[0].bidfloor, 1.25);
    }

    #[tokio::test]
    async fn default_floor_applies_when_no_rule_matches() {
        struct FixedProvider;
        #[async_trait]
        impl FloorProvider for FixedProvider {
            async fn get_floors(&self, _req: &BidRequest) -> Option<FloorData> {
                Some(FloorData { default_floor: Some(5.0), rules: Vec::new() })
            }
        }

        let enricher = FloorEnricher::new(Box::new(FixedProvider), Duration::from_secs(60), Duration::from_millis(100));
        let mut req = request_with_imp("slot-1", 0.0);
        enricher.enrich(&mut req).await;
        assert_eq!(req.imp[0].bidfloor, 5.0);
    }

    #[tokio::test]
    async fn provider_timeout_leaves_floors_unchanged() {
        struct SlowProvider;
        #[async_trait]
        impl FloorProvider for SlowProvider {
            async fn get_floors(&self, _req: &BidRequest) -> Option<FloorData> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Some(FloorData { default_floor: Some(99.0), rules: Vec::new() })
            }
        }

        let enricher = FloorEnricher::new(Box::new(SlowProvider), Duration::from_secs(60), Duration::from_millis(10));
        let mut req = request_with_imp("slot-1", 0.0);
        enricher.enrich(&mut req).await;
        assert_eq!(req.imp[0].bidfloor, 0.0);
    }
}
