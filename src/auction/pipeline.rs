//! Wires C2–C9 into the ordered pipeline described by §2's control flow:
//! `C2 → C3 → C4 → C5 → C6 → C7 → C8 → C9`. Mirrors the teacher's
//! `app/pipeline/ortb/pipeline.rs` — one `PipelineBuilder` call chain, each
//! stage a small task struct rather than a free function, so stages compose
//! uniformly regardless of whether they suspend.

use crate::auction::adapter::DemandClient;
use crate::auction::bid_validator::{self, FloorMode};
use crate::auction::context::AuctionContext;
use crate::auction::coordinator::AuctionCoordinator;
use crate::auction::floors::FloorEnricher;
use crate::auction::nobid::RejectReason;
use crate::auction::privacy::{self, PrivacyConfig};
use crate::auction::registry::AdapterRegistry;
use crate::auction::selector;
use crate::auction::settlement::SettlementTask;
use crate::auction::stored_config::Fetcher;
use crate::auction::validate;
use crate::pipeline::{AsyncTask, BlockingTask, Pipeline, PipelineBuilder};
use anyhow::Error;
use async_trait::async_trait;
use std::sync::Arc;

/// C2.
struct StoredConfigStage {
    fetcher: Arc<dyn Fetcher>,
}

#[async_trait]
impl AsyncTask<AuctionContext> for StoredConfigStage {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), Error> {
        // Clone out, mutate, write back rather than holding the lock guard
        // across the fetch's await point.
        let mut req = ctx.req.read().clone();
        let mut warnings = Vec::new();
        crate::auction::stored_config::resolve(&mut req, &*self.fetcher, &mut warnings)
            .await
            .map_err(RejectReason::from)?;
        *ctx.req.write() = req;
        ctx.warnings.lock().extend(warnings);
        Ok(())
    }
}

/// C3.
struct ValidateStage;

impl BlockingTask<AuctionContext> for ValidateStage {
    fn run(&self, ctx: &AuctionContext) -> Result<(), Error> {
        let req = ctx.req.read();
        validate::validate(&req).map_err(RejectReason::from)?;
        Ok(())
    }
}

/// C4.
struct PrivacyGateStage {
    config: PrivacyConfig,
}

impl BlockingTask<AuctionContext> for PrivacyGateStage {
    fn run(&self, ctx: &AuctionContext) -> Result<(), Error> {
        let mut req = ctx.req.write();
        let state = privacy::enforce(&mut req, &self.config).map_err(RejectReason::from)?;
        drop(req);
        let _ = ctx.privacy.set(state);
        Ok(())
    }
}

/// C5.
struct FloorEnricherStage {
    enricher: Arc<FloorEnricher>,
}

#[async_trait]
impl AsyncTask<AuctionContext> for FloorEnricherStage {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), Error> {
        let mut req = ctx.req.read().clone();
        self.enricher.enrich(&mut req).await;
        *ctx.req.write() = req;
        Ok(())
    }
}

/// C6. An `AsyncTask` purely because `ctx.bidders` is held behind an async
/// mutex (shared with the coordinator, which must hold it across awaits);
/// the selection work itself is plain CPU.
struct BidderSelectorStage {
    registry: Arc<AdapterRegistry>,
}

#[async_trait]
impl AsyncTask<AuctionContext> for BidderSelectorStage {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), Error> {
        let req = ctx.req.read();
        let privacy_state = ctx.privacy.get().cloned().unwrap_or_default();
        let calls = selector::select(&req, &self.registry, &privacy_state);
        drop(req);
        *ctx.bidders.lock().await = calls;
        Ok(())
    }
}

/// C8 runs after the coordinator (C7), before settlement (C9). Same
/// async-mutex reasoning as [`BidderSelectorStage`].
struct BidValidatorStage {
    mode: FloorMode,
}

#[async_trait]
impl AsyncTask<AuctionContext> for BidValidatorStage {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), Error> {
        let mut calls = ctx.bidders.lock().await;
        let mut warnings = Vec::new();
        for call in calls.iter_mut() {
            warnings.extend(bid_validator::validate_bids(call, self.mode));
        }
        drop(calls);
        ctx.warnings.lock().extend(warnings);
        Ok(())
    }
}

pub struct AuctionPipelineConfig {
    pub registry: Arc<AdapterRegistry>,
    pub fetcher: Arc<dyn Fetcher>,
    pub floor_enricher: Arc<FloorEnricher>,
    pub demand_client: Arc<DemandClient>,
    pub privacy: PrivacyConfig,
    pub floor_mode: FloorMode,
}

/// Builds the full auction pipeline, stage order fixed to §2's control flow.
pub fn build(config: AuctionPipelineConfig) -> Pipeline<AuctionContext, Error> {
    PipelineBuilder::new()
        .with_async(Box::new(StoredConfigStage { fetcher: config.fetcher }))
        .with_blocking(Box::new(ValidateStage))
        .with_blocking(Box::new(PrivacyGateStage { config: config.privacy }))
        .with_async(Box::new(FloorEnricherStage { enricher: config.floor_enricher }))
        .with_async(Box::new(BidderSelectorStage { registry: config.registry.clone() }))
        .with_async(Box::new(AuctionCoordinator::new(config.demand_client, config.registry)))
        .with_async(Box::new(BidValidatorStage { mode: config.floor_mode }))
        .with_async(Box::new(SettlementTask))
        .build()
        .expect("auction pipeline always has stages")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::adapter::test_support::EchoAdapter;
    use crate::auction::registry::{AdapterRegistryBuilder, BidderInfo, Capabilities, DemandType};
    use crate::auction::stored_config::StaticFetcher;
    use crate::rtb::{Banner, BidRequest, Imp};
    use std::collections::HashMap;
    use std::time::Duration;

    fn targeted_request() -> BidRequest {
        BidRequest {
            id: "req-1".into(),
            imp: vec![Imp {
                id: "imp-1".into(),
                banner: Some(Banner { w: Some(300), h: Some(250) }),
                ext: Some(serde_json::json!({"prebid": {"bidder": {"acme": {}}}})),
                ..Default::default()
            }],
            tmax: 500,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn full_pipeline_produces_a_winning_bid() {
        let registry = Arc::new(
            AdapterRegistryBuilder::new()
                .register(
                    "acme",
                    Arc::new(EchoAdapter { price: 3.0, delay: Duration::ZERO }),
                    BidderInfo {
                        code: "acme".into(),
                        enabled: true,
                        gvl_id: None,
                        capabilities: Capabilities::all(),
                        demand_type: DemandType::Exchange,
                    },
                )
                .build(),
        );

        let pipeline = build(AuctionPipelineConfig {
            registry: registry.clone(),
            fetcher: Arc::new(StaticFetcher { requests: HashMap::new(), imps: HashMap::new() }),
            floor_enricher: Arc::new(FloorEnricher::new(
                Box::new(crate::auction::floors::NoopFloorProvider),
                Duration::from_secs(60),
                Duration::from_millis(100),
            )),
            demand_client: Arc::new(DemandClient::new().unwrap()),
            privacy: PrivacyConfig::default(),
            floor_mode: FloorMode::Hard,
        });

        let ctx = AuctionContext::new("test".into(), "pub-1".into(), targeted_request(), Duration::from_millis(500), false);
        pipeline.run(&ctx).await.unwrap();

        match ctx.outcome.get().unwrap() {
            crate::auction::context::AuctionOutcome::Bid(response) => {
                assert_eq!(response.seatbid.len(), 1);
                assert_eq!(response.seatbid[0].bid[0].price, 3.0);
            }
            other => panic!("expected a winning bid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn validation_failure_short_circuits_before_the_coordinator() {
        let registry = Arc::new(AdapterRegistryBuilder::new().build());
        let pipeline = build(AuctionPipelineConfig {
            registry: registry.clone(),
            fetcher: Arc::new(StaticFetcher { requests: HashMap::new(), imps: HashMap::new() }),
            floor_enricher: Arc::new(FloorEnricher::new(
                Box::new(crate::auction::floors::NoopFloorProvider),
                Duration::from_secs(60),
                Duration::from_millis(100),
            )),
            demand_client: Arc::new(DemandClient::new().unwrap()),
            privacy: PrivacyConfig::default(),
            floor_mode: FloorMode::Hard,
        });

        let mut req = targeted_request();
        req.id = String::new();
        let ctx = AuctionContext::new("test".into(), "pub-1".into(), req, Duration::from_millis(500), false);
        let err = pipeline.run(&ctx).await.unwrap_err();
        assert!(err.downcast_ref::<RejectReason>().is_some());
    }
}
