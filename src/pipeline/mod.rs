//! Minimal task-pipeline runtime.
//!
//! Every stage of the auction (and the smaller cookie-sync flows) is expressed
//! as a small unit implementing [`AsyncTask`] or [`BlockingTask`], strung
//! together by a [`Pipeline`]. A pipeline runs its tasks strictly in order and
//! aborts on the first error, which is exactly the short-circuit behavior the
//! request validator and privacy gate rely on.

use anyhow::Error;
use async_trait::async_trait;
use std::sync::Arc;

/// A task that may suspend (perform I/O). Most auction stages beyond basic
/// validation are async: bidder fan-out, stored-config fetches, floor
/// provider calls.
#[async_trait]
pub trait AsyncTask<C, E = Error>: Send + Sync {
    async fn run(&self, context: &C) -> Result<(), E>;
}

/// A task that is pure CPU work and never suspends. Kept as a distinct trait
/// so a pipeline's structure documents, at the type level, which stages can
/// block a worker thread and which cannot.
pub trait BlockingTask<C, E = Error>: Send + Sync {
    fn run(&self, context: &C) -> Result<(), E>;
}

enum Stage<C, E> {
    Blocking(Box<dyn BlockingTask<C, E>>),
    Async(Box<dyn AsyncTask<C, E>>),
}

#[async_trait]
impl<C, E> AsyncTask<C, E> for Stage<C, E>
where
    C: Sync,
    E: Send,
{
    async fn run(&self, context: &C) -> Result<(), E> {
        match self {
            Stage::Blocking(task) => task.run(context),
            Stage::Async(task) => task.run(context).await,
        }
    }
}

/// An ordered sequence of stages sharing one context. Runs to completion or
/// stops at the first stage to return `Err`.
pub struct Pipeline<C, E = Error> {
    stages: Vec<Stage<C, E>>,
}

impl<C, E> Pipeline<C, E>
where
    C: Sync,
    E: Send,
{
    pub async fn run(&self, context: &C) -> Result<(), E> {
        for stage in &self.stages {
            stage.run(context).await?;
        }
        Ok(())
    }
}

/// Builds a [`Pipeline`] stage by stage. Mirrors the fluent style used across
/// the auction pipeline wiring (`with_blocking` / `with_async`), plus
/// imperative `add_*` variants for pipelines assembled conditionally.
#[derive(Default)]
pub struct PipelineBuilder<C, E = Error> {
    stages: Vec<Stage<C, E>>,
}

impl<C, E> PipelineBuilder<C, E>
where
    C: Sync,
    E: Send,
{
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn with_blocking(mut self, task: Box<dyn BlockingTask<C, E>>) -> Self {
        self.stages.push(Stage::Blocking(task));
        self
    }

    pub fn with_async(mut self, task: Box<dyn AsyncTask<C, E>>) -> Self {
        self.stages.push(Stage::Async(task));
        self
    }

    pub fn add_blocking(&mut self, task: Box<dyn BlockingTask<C, E>>) -> &mut Self {
        self.stages.push(Stage::Blocking(task));
        self
    }

    pub fn add_async(&mut self, task: Box<dyn AsyncTask<C, E>>) -> &mut Self {
        self.stages.push(Stage::Async(task));
        self
    }

    /// Builds the pipeline, or `None` if no stages were ever added — used by
    /// callers that wire optional tail pipelines (e.g. finalizers) only when
    /// a backing store is configured.
    pub fn build(self) -> Option<Pipeline<C, E>> {
        if self.stages.is_empty() {
            None
        } else {
            Some(Pipeline { stages: self.stages })
        }
    }
}

/// Convenience wrapper so a fully built pipeline can be cloned cheaply into
/// request-handler closures.
pub type SharedPipeline<C, E = Error> = Arc<Pipeline<C, E>>;

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct PushTask(i32, Arc<Mutex<Vec<i32>>>);

    #[async_trait]
    impl AsyncTask<()> for PushTask {
        async fn run(&self, _: &()) -> Result<(), Error> {
            self.1.lock().push(self.0);
            Ok(())
        }
    }

    struct FailTask;

    impl BlockingTask<()> for FailTask {
        fn run(&self, _: &()) -> Result<(), Error> {
            Err(anyhow::anyhow!("boom"))
        }
    }

    #[tokio::test]
    async fn runs_stages_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = PipelineBuilder::new()
            .with_async(Box::new(PushTask(1, log.clone())))
            .with_async(Box::new(PushTask(2, log.clone())))
            .build()
            .unwrap();

        pipeline.run(&()).await.unwrap();
        assert_eq!(*log.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn aborts_on_first_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = PipelineBuilder::new()
            .with_blocking(Box::new(FailTask))
            .with_async(Box::new(PushTask(1, log.clone())))
            .build()
            .unwrap();

        assert!(pipeline.run(&()).await.is_err());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn empty_builder_yields_no_pipeline() {
        let pipeline: Option<Pipeline<()>> = PipelineBuilder::new().build();
        assert!(pipeline.is_none());
    }
}
