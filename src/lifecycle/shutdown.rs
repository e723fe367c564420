//! Shutdown pipeline (grounded on the teacher's `app/lifecycle/shutdown/shutdown.rs`).

use crate::lifecycle::context::StartupContext;
use crate::observability;
use crate::pipeline::{AsyncTask, Pipeline, PipelineBuilder};
use anyhow::Error;
use async_trait::async_trait;
use tracing::info;

struct StopServerTask;

#[async_trait]
impl AsyncTask<StartupContext, Error> for StopServerTask {
    async fn run(&self, ctx: &StartupContext) -> Result<(), Error> {
        match ctx.server.get() {
            Some(handle) => {
                info!("stopping http server");
                handle.stop(true).await;
                info!("http server stopped");
            }
            None => info!("skipping server shutdown, was never started"),
        }
        Ok(())
    }
}

struct ObservabilityShutdownTask;

#[async_trait]
impl AsyncTask<StartupContext, Error> for ObservabilityShutdownTask {
    async fn run(&self, ctx: &StartupContext) -> Result<(), Error> {
        if let Some(provider) = ctx.tracer_provider.get() {
            observability::shutdown(provider).await?;
        }
        Ok(())
    }
}

pub fn build_shutdown_pipeline() -> Pipeline<StartupContext, Error> {
    PipelineBuilder::new()
        .with_async(Box::new(StopServerTask))
        .with_async(Box::new(ObservabilityShutdownTask))
        .build()
        .expect("shutdown pipeline always has tasks")
}
