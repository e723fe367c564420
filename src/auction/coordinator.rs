//! C7 — Auction Coordinator (§4.7, §5). The central algorithm: bounded-time
//! parallel fan-out to every selected bidder under one cancellable deadline.

use crate::auction::adapter::DemandClient;
use crate::auction::context::{AuctionContext, BidderCall};
use crate::auction::nobid::{BidderError, BidderErrorCode};
use crate::auction::registry::AdapterRegistry;
use crate::pipeline::AsyncTask;
use anyhow::Error;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub struct AuctionCoordinator {
    client: Arc<DemandClient>,
    registry: Arc<AdapterRegistry>,
}

impl AuctionCoordinator {
    pub fn new(client: Arc<DemandClient>, registry: Arc<AdapterRegistry>) -> Self {
        Self { client, registry }
    }
}

#[async_trait]
impl AsyncTask<AuctionContext> for AuctionCoordinator {
    async fn run(&self, ctx: &AuctionContext) -> Result<(), Error> {
        let calls = {
            let mut guard = ctx.bidders.lock().await;
            std::mem::take(&mut *guard)
        };

        let (runnable, mut skipped): (Vec<_>, Vec<_>) =
            calls.into_iter().partition(|c| c.skip_reason.is_none());

        let deadline = ctx.remaining();
        let arrival_seq = Arc::new(AtomicU64::new(0));
        let req = ctx.req.read().clone();

        // Completions are drained through a channel (§5: "a completion
        // channel/queue") rather than joined directly, so the deadline race
        // and task fan-in are a single select loop.
        let (tx, mut rx) = tokio::sync::mpsc::channel(runnable.len().max(1));
        let mut handles = Vec::with_capacity(runnable.len());
        // Dispatch-time identity of every spawned bidder, kept outside the
        // task so the coordinator can still report a latency-bearing stub
        // for one that never makes it through the channel before the
        // deadline fires (spec: aborted bidders contribute no bids but
        // their latency is still recorded).
        let mut dispatched_info: Vec<(String, crate::auction::registry::BidderInfo, Vec<crate::rtb::Imp>, Instant)> =
            Vec::with_capacity(runnable.len());
        let dispatched = runnable.len();

        for mut call in runnable {
            let Some((adapter, _)) = self.registry.lookup(&call.bidder_code) else {
                call.errors.push(BidderError::new(
                    &call.bidder_code,
                    BidderErrorCode::BadRequest,
                    "adapter vanished from registry mid-auction",
                ));
                skipped.push(call);
                continue;
            };

            let client = self.client.clone();
            let req = req.clone();
            let arrival_seq = arrival_seq.clone();
            let per_call_timeout = deadline.min(adapter.default_timeout());
            let tx = tx.clone();
            let dispatch_started = Instant::now();
            dispatched_info.push((call.bidder_code.clone(), call.info.clone(), call.imps.clone(), dispatch_started));

            handles.push(tokio::spawn(async move {
                let started = Instant::now();
                run_one_bidder(&*adapter, &client, &req, &mut call, per_call_timeout).await;
                call.latency = Some(started.elapsed());
                call.arrival_seq = Some(arrival_seq.fetch_add(1, Ordering::Relaxed));
                let _ = tx.send(call).await;
            }));
        }
        drop(tx);

        let mut completed = Vec::with_capacity(dispatched);
        let budget = tokio::time::sleep(deadline);
        tokio::pin!(budget);
        let mut deadline_fired = false;

        loop {
            if completed.len() >= dispatched {
                break;
            }
            tokio::select! {
                biased;
                _ = &mut budget => {
                    deadline_fired = true;
                    break;
                }
                received = rx.recv() => {
                    match received {
                        Some(call) => completed.push(call),
                        None => break,
                    }
                }
            }
        }

        if deadline_fired {
            // Drain any results that raced in at the same instant as the
            // deadline before treating the rest as abandoned.
            while let Ok(call) = rx.try_recv() {
                completed.push(call);
            }

            let arrived: HashSet<&str> = completed.iter().map(|c| c.bidder_code.as_str()).collect();
            for (bidder_code, info, imps, dispatch_started) in &dispatched_info {
                if arrived.contains(bidder_code.as_str()) {
                    continue;
                }
                let mut stub = BidderCall::new(bidder_code.clone(), info.clone(), imps.clone());
                stub.latency = Some(dispatch_started.elapsed());
                stub.timed_out = true;
                stub.errors.push(BidderError::new(
                    bidder_code,
                    BidderErrorCode::Timeout,
                    "deadline exceeded before bidder returned",
                ));
                completed.push(stub);
            }

            for handle in &handles {
                handle.abort();
            }
        }

        completed.extend(skipped);
        debug!(count = completed.len(), "auction coordinator collected bidder results");
        *ctx.bidders.lock().await = completed;

        Ok(())
    }
}

async fn run_one_bidder(
    adapter: &dyn crate::auction::adapter::Adapter,
    client: &DemandClient,
    req: &crate::rtb::BidRequest,
    call: &mut crate::auction::context::BidderCall,
    per_call_timeout: Duration,
) {
    let mut scoped_req = req.clone();
    scoped_req.imp = call.imps.clone();

    let (outbound, errors) = adapter.make_requests(&scoped_req);
    call.outbound = outbound;
    call.errors.extend(errors);

    let started = Instant::now();
    for outbound in call.outbound.clone() {
        // Each outbound call gets whatever's left of the per-bidder budget,
        // not the full ceiling again (§4.7: remaining deadline, not a fresh
        // timer per call), so a bidder with several outbound requests can't
        // stack sequential slow calls past its own allotment.
        let per_call = per_call_timeout.saturating_sub(started.elapsed());
        if per_call.is_zero() {
            call.timed_out = true;
            call.errors.push(BidderError::new(
                &call.bidder_code,
                BidderErrorCode::Timeout,
                "deadline exceeded",
            ));
            break;
        }
        match tokio::time::timeout(per_call, client.send(&outbound, per_call)).await {
            Ok(Ok((status, body))) => match adapter.make_bids(&scoped_req, status, &body) {
                Ok(response) => call.responses.push(response),
                Err(e) => call.errors.push(e),
            },
            Ok(Err(e)) => {
                call.errors.push(BidderError::new(
                    &call.bidder_code,
                    BidderErrorCode::Connection,
                    e.to_string(),
                ));
            }
            Err(_elapsed) => {
                call.timed_out = true;
                call.errors.push(BidderError::new(
                    &call.bidder_code,
                    BidderErrorCode::Timeout,
                    "deadline exceeded",
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::adapter::test_support::EchoAdapter;
    use crate::auction::context::BidderCall;
    use crate::auction::registry::{AdapterRegistryBuilder, BidderInfo, Capabilities, DemandType};
    use crate::rtb::{Banner, BidRequest, Imp};

    fn request() -> BidRequest {
        BidRequest {
            id: "req-1".into(),
            imp: vec![Imp { id: "imp-1".into(), banner: Some(Banner::default()), ..Default::default() }],
            tmax: 500,
            ..Default::default()
        }
    }

    fn registry_with_echo(code: &str, delay: Duration) -> AdapterRegistry {
        AdapterRegistryBuilder::new()
            .register(
                code,
                Arc::new(EchoAdapter { price: 2.5, delay }),
                BidderInfo {
                    code: code.into(),
                    enabled: true,
                    gvl_id: None,
                    capabilities: Capabilities::all(),
                    demand_type: DemandType::Exchange,
                },
            )
            .build()
    }

    #[tokio::test]
    async fn collects_bids_from_a_fast_bidder() {
        let registry = Arc::new(registry_with_echo("acme", Duration::ZERO));
        let client = Arc::new(DemandClient::new().unwrap());
        let coordinator = AuctionCoordinator::new(client, registry.clone());

        let ctx = AuctionContext::new("test".into(), "pub-1".into(), request(), Duration::from_millis(500), false);
        let (_, info) = registry.lookup("acme").unwrap();
        *ctx.bidders.lock().await = vec![BidderCall::new("acme".into(), info.clone(), request().imp)];

        coordinator.run(&ctx).await.unwrap();

        let calls = ctx.bidders.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].responses[0].bids[0].bid.price, 2.5);
        assert!(!calls[0].timed_out);
    }

    #[tokio::test]
    async fn slow_bidder_is_abandoned_at_the_deadline_but_latency_is_recorded() {
        let registry = Arc::new(registry_with_echo("slow", Duration::from_millis(200)));
        let client = Arc::new(DemandClient::new().unwrap());
        let coordinator = AuctionCoordinator::new(client, registry.clone());

        let ctx = AuctionContext::new("test".into(), "pub-1".into(), request(), Duration::from_millis(20), false);
        let (_, info) = registry.lookup("slow").unwrap();
        *ctx.bidders.lock().await = vec![BidderCall::new("slow".into(), info.clone(), request().imp)];

        coordinator.run(&ctx).await.unwrap();

        let calls = ctx.bidders.lock().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].responses.is_empty());
        assert!(calls[0].timed_out);
        assert!(calls[0].latency.is_some(), "abandoned bidders must still report a latency");
    }
}
