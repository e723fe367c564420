//! Startup/shutdown context (grounded on the teacher's
//! `app/lifecycle/context.rs`): a bag of `OnceLock`s that each startup task
//! fills in turn, read back by later tasks and by the running server.

use crate::auction::context::AuctionContext;
use crate::auction::registry::AdapterRegistry;
use crate::config::HbxConfig;
use crate::cookiesync::CookieSyncService;
use crate::pipeline::Pipeline;
use anyhow::Error;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::sync::{Arc, OnceLock};

#[derive(Default)]
pub struct StartupContext {
    pub config: OnceLock<HbxConfig>,
    pub tracer_provider: OnceLock<SdkTracerProvider>,
    pub registry: OnceLock<Arc<AdapterRegistry>>,
    pub cookie_sync: OnceLock<Arc<CookieSyncService>>,
    pub auction_pipeline: OnceLock<Arc<Pipeline<AuctionContext, Error>>>,
    pub server: OnceLock<actix_web::dev::ServerHandle>,
}
