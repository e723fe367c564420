mod auction;
mod config;
mod cookiesync;
mod lifecycle;
mod observability;
mod pipeline;
mod rtb;
mod server;

use crate::lifecycle::context::StartupContext;
use crate::lifecycle::shutdown::build_shutdown_pipeline;
use crate::lifecycle::startup::build_start_pipeline;
use actix_web::rt::signal;
use std::path::PathBuf;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[actix_web::main]
async fn main() {
    let config_path = std::env::var("HBX_CONFIG").unwrap_or_else(|_| "hbx.yaml".into());

    let startup_pipeline = build_start_pipeline(PathBuf::from(config_path));
    let startup_ctx = StartupContext::default();

    match startup_pipeline.run(&startup_ctx).await {
        Ok(()) => println!("startup successful"),
        Err(e) => panic!("startup failed: {e:?}"),
    }

    let shutdown_pipeline = build_shutdown_pipeline();

    signal::ctrl_c().await.expect("failed to listen for sigint");

    match shutdown_pipeline.run(&startup_ctx).await {
        Ok(()) => println!("shutdown successful"),
        Err(e) => panic!("clean shutdown failed: {e:?}"),
    }
}
