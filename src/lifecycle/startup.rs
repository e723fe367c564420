//! Startup pipeline (grounded on the teacher's
//! `app/lifecycle/startup/startup.rs`): config, then observability, then the
//! registry/cookie-store/auction-pipeline builders, then the HTTP server —
//! each step a small task so ordering and failure are explicit rather than
//! buried in `main`.

use crate::auction::adapter::{DemandClient, SimpleJsonAdapter};
use crate::auction::bid_validator::FloorMode;
use crate::auction::floors::{FloorEnricher, NoopFloorProvider};
use crate::auction::pipeline::{self, AuctionPipelineConfig};
use crate::auction::registry::{AdapterRegistryBuilder, BidderInfo, Capabilities, DemandType};
use crate::auction::stored_config::FsFetcher;
use crate::config::HbxConfig;
use crate::cookiesync::{CookieSyncService, LocalStore};
use crate::lifecycle::context::StartupContext;
use crate::observability;
use crate::pipeline::{AsyncTask, BlockingTask, Pipeline, PipelineBuilder};
use crate::server;
use actix_web::{web, App, HttpServer};
use anyhow::{anyhow, Error};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

struct ConfigLoadTask {
    path: PathBuf,
}

impl BlockingTask<StartupContext, Error> for ConfigLoadTask {
    fn run(&self, ctx: &StartupContext) -> Result<(), Error> {
        let config = HbxConfig::load(&self.path)?;
        ctx.config.set(config).map_err(|_| anyhow!("config already loaded"))?;
        Ok(())
    }
}

struct ObservabilityTask;

impl BlockingTask<StartupContext, Error> for ObservabilityTask {
    fn run(&self, ctx: &StartupContext) -> Result<(), Error> {
        let config = ctx.config.get().ok_or_else(|| anyhow!("config missing before observability init"))?;
        if let Some(provider) = observability::init(&config.logging)? {
            ctx.tracer_provider.set(provider).map_err(|_| anyhow!("observability already initialized"))?;
        }
        info!("observability configured");
        Ok(())
    }
}

struct RegistryBuildTask;

impl BlockingTask<StartupContext, Error> for RegistryBuildTask {
    fn run(&self, ctx: &StartupContext) -> Result<(), Error> {
        let config = ctx.config.get().ok_or_else(|| anyhow!("config missing before registry build"))?;

        let mut builder = AdapterRegistryBuilder::new();
        for bidder in &config.bidders {
            let adapter = Arc::new(SimpleJsonAdapter { bidder_code: bidder.code.clone(), endpoint: bidder.endpoint.clone() });
            builder = builder.register(
                bidder.code.clone(),
                adapter,
                BidderInfo {
                    code: bidder.code.clone(),
                    enabled: true,
                    gvl_id: bidder.gvl_id,
                    capabilities: Capabilities::all(),
                    demand_type: DemandType::Exchange,
                },
            );
        }

        ctx.registry.set(Arc::new(builder.build())).map_err(|_| anyhow!("registry already built"))?;
        Ok(())
    }
}

struct CookieSyncBuildTask;

impl BlockingTask<StartupContext, Error> for CookieSyncBuildTask {
    fn run(&self, ctx: &StartupContext) -> Result<(), Error> {
        let config = ctx.config.get().ok_or_else(|| anyhow!("config missing before cookie-sync build"))?;

        let store = Arc::new(LocalStore::new(config.caches.cookie_store_ttl, config.caches.cookie_store_entries));
        let sync_urls: HashMap<String, String> = config
            .bidders
            .iter()
            .filter_map(|b| b.sync_url.clone().map(|url| (b.code.clone(), url)))
            .collect();

        let service = Arc::new(CookieSyncService::new(store, sync_urls));
        ctx.cookie_sync.set(service).map_err(|_| anyhow!("cookie-sync service already built"))?;
        Ok(())
    }
}

struct AuctionPipelineBuildTask;

impl BlockingTask<StartupContext, Error> for AuctionPipelineBuildTask {
    fn run(&self, ctx: &StartupContext) -> Result<(), Error> {
        let config = ctx.config.get().ok_or_else(|| anyhow!("config missing before pipeline build"))?;
        let registry = ctx.registry.get().ok_or_else(|| anyhow!("registry missing before pipeline build"))?.clone();

        let demand_client = Arc::new(DemandClient::new()?);
        let floor_enricher = Arc::new(FloorEnricher::new(
            Box::new(NoopFloorProvider),
            config.caches.floor_cache_ttl,
            std::time::Duration::from_millis(100),
        ));
        let fetcher = Arc::new(FsFetcher::new(config.stored_config_dir.clone()));

        let built = pipeline::build(AuctionPipelineConfig {
            registry,
            fetcher,
            floor_enricher,
            demand_client,
            privacy: config.privacy.to_privacy_config(),
            floor_mode: FloorMode::from(config.floor_mode),
        });

        ctx.auction_pipeline.set(Arc::new(built)).map_err(|_| anyhow!("auction pipeline already built"))?;
        Ok(())
    }
}

struct StartServerTask;

#[async_trait]
impl AsyncTask<StartupContext, Error> for StartServerTask {
    async fn run(&self, ctx: &StartupContext) -> Result<(), Error> {
        let config = ctx.config.get().ok_or_else(|| anyhow!("config missing before server start"))?;
        let port = config.server.http_port;
        let body_limit = config.server.request_body_limit_bytes;
        let debug_requires_auth = config.server.debug_requires_auth;

        let pipeline = ctx.auction_pipeline.get().ok_or_else(|| anyhow!("auction pipeline not built"))?.clone();
        let registry = ctx.registry.get().ok_or_else(|| anyhow!("registry not built"))?.clone();
        let cookie_sync = ctx.cookie_sync.get().ok_or_else(|| anyhow!("cookie-sync service not built"))?.clone();

        let app_state = web::Data::new(server::AppState { pipeline, registry, cookie_sync, debug_requires_auth });

        let http_server = HttpServer::new(move || {
            App::new()
                .app_data(app_state.clone())
                .app_data(web::JsonConfig::default().limit(body_limit))
                .configure(server::configure)
        })
        .bind(("0.0.0.0", port))?
        .run();

        ctx.server.set(http_server.handle()).map_err(|_| anyhow!("server already started"))?;
        tokio::spawn(http_server);

        info!("started http server on port {port}, ready for requests");
        Ok(())
    }
}

pub fn build_start_pipeline(config_path: PathBuf) -> Pipeline<StartupContext, Error> {
    let boot_loader = PipelineBuilder::new()
        .with_blocking(Box::new(ConfigLoadTask { path: config_path }))
        .with_blocking(Box::new(ObservabilityTask))
        .build()
        .expect("boot loader always has tasks");

    let startup = PipelineBuilder::new()
        .with_blocking(Box::new(RegistryBuildTask))
        .with_blocking(Box::new(CookieSyncBuildTask))
        .with_blocking(Box::new(AuctionPipelineBuildTask))
        .with_async(Box::new(StartServerTask))
        .build()
        .expect("startup pipeline always has tasks");

    PipelineBuilder::new()
        .with_async(Box::new(PipelineTask(boot_loader)))
        .with_async(Box::new(PipelineTask(startup)))
        .build()
        .expect("pipeline should have tasks")
}

/// Wraps a sub-pipeline so it can be nested as a single stage of the outer
/// startup pipeline.
struct PipelineTask<C, E>(Pipeline<C, E>);

#[async_trait]
impl<C, E> AsyncTask<C, E> for PipelineTask<C, E>
where
    C: Sync,
    E: Send,
{
    async fn run(&self, context: &C) -> Result<(), E> {
        self.0.run(context).await
    }
}

