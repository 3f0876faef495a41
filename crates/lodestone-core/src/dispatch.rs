// crates/lodestone-core/src/dispatch.rs
// Dispatch engine: search plus the all/any/race fan-out combinators

use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::citation::CitationAllocator;
use crate::config::SearchConfig;
use crate::host::SearchContext;
use crate::registry::HandlerRegistry;
use crate::rerank::Reranker;
use lodestone_types::{SearchRequest, SearchResult};

/// The unified dispatch surface.
///
/// One engine serves one assistant: registry and config are built once,
/// immutable afterwards, and freely shared between concurrent dispatches.
/// Each top-level call (`search`, `all`, `any`, `race`) owns one citation
/// allocator whose IDs are unique for that dispatch.
#[derive(Clone)]
pub struct SearchEngine {
    registry: Arc<HandlerRegistry>,
    config: Arc<SearchConfig>,
    reranker: Arc<Reranker>,
}

impl SearchEngine {
    pub fn new(registry: Arc<HandlerRegistry>, config: Arc<SearchConfig>) -> Self {
        let reranker = Arc::new(Reranker::new(&config.uses.rerank, config.rerank.clone()));
        Self {
            registry,
            config,
            reranker,
        }
    }

    pub fn config(&self) -> &Arc<SearchConfig> {
        &self.config
    }

    /// Dispatch a single request. Handler failures come back as a populated
    /// `error` on the result; this method never fails outward.
    pub async fn search(&self, ctx: &SearchContext, req: &SearchRequest) -> SearchResult {
        let allocator = CitationAllocator::new();
        self.search_with_allocator(ctx, req, &allocator).await
    }

    /// One request against a shared per-dispatch allocator. Post-processing
    /// is sequential: weighting, then optional reranking (which reads the
    /// weights), then citation allocation in the final item order.
    async fn search_with_allocator(
        &self,
        ctx: &SearchContext,
        req: &SearchRequest,
        allocator: &CitationAllocator,
    ) -> SearchResult {
        let started = Instant::now();

        let mut result = if self.config.uses.search_disabled() {
            SearchResult::failure(req.kind, &req.query, req.source, "search is disabled")
        } else {
            match self.registry.get(req.kind) {
                Some(handler) => handler.search(ctx, req).await,
                None => SearchResult::failure(
                    req.kind,
                    &req.query,
                    req.source,
                    "unsupported search type",
                ),
            }
        };

        // A failed result never carries items
        if result.error.is_some() {
            result.items.clear();
        }

        let weight = self.config.weight(req.source);
        for item in &mut result.items {
            item.weight = weight;
            item.source = req.source;
        }

        if let Some(threshold) = self.config.options.skip_threshold {
            result.items.retain(|item| item.score >= threshold);
        }

        if let Some(options) = &req.rerank {
            if !result.items.is_empty() {
                match self
                    .reranker
                    .rerank(Some(ctx), &req.query, result.items.clone(), options.top_n)
                    .await
                {
                    Ok(items) => result.items = items,
                    Err(e) => {
                        debug!(error = %e, "Rerank failed, keeping original order");
                    }
                }
            }
        }

        for item in &mut result.items {
            item.citation_id = allocator.next();
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        result.finish();
        result
    }

    /// Fan out every request concurrently and wait for all of them.
    ///
    /// Output order equals input order. A panicking worker yields a
    /// sentinel error result in its slot instead of poisoning the batch.
    pub async fn all(&self, ctx: &SearchContext, reqs: &[SearchRequest]) -> Vec<SearchResult> {
        if reqs.is_empty() {
            return Vec::new();
        }
        let allocator = Arc::new(CitationAllocator::new());
        let mut handles = Vec::with_capacity(reqs.len());
        for req in reqs.iter().cloned() {
            let engine = self.clone();
            let ctx = ctx.clone();
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                engine.search_with_allocator(&ctx, &req, &allocator).await
            }));
        }

        let mut results = Vec::with_capacity(reqs.len());
        for (i, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) if e.is_panic() => {
                    warn!(index = i, query = %reqs[i].query, "Search worker panicked");
                    results.push(SearchResult::failure(
                        reqs[i].kind,
                        &reqs[i].query,
                        reqs[i].source,
                        "search panic recovered",
                    ));
                }
                Err(_) => results.push(SearchResult::failure(
                    reqs[i].kind,
                    &reqs[i].query,
                    reqs[i].source,
                    "search cancelled",
                )),
            }
        }
        results
    }

    /// Fan out all requests and return as soon as one produces a success
    /// (non-empty items, no error). Remaining workers get an abandon
    /// advisory and keep running detached; their slots may still be `None`
    /// in the returned snapshot. With no success, all terminated results
    /// are returned in their slots.
    pub async fn any(
        &self,
        ctx: &SearchContext,
        reqs: &[SearchRequest],
    ) -> Vec<Option<SearchResult>> {
        if reqs.is_empty() {
            return Vec::new();
        }
        let n = reqs.len();
        let allocator = Arc::new(CitationAllocator::new());
        let abandon = CancellationToken::new();
        let slots: Arc<Mutex<Vec<Option<SearchResult>>>> =
            Arc::new(Mutex::new((0..n).map(|_| None).collect()));
        let (tx, mut rx) = mpsc::channel::<usize>(n);

        for (i, req) in reqs.iter().cloned().enumerate() {
            let engine = self.clone();
            let ctx = ctx.clone();
            let allocator = allocator.clone();
            let abandon = abandon.clone();
            let slots = slots.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                // Advisory: skip work that hasn't started once a winner exists
                if !abandon.is_cancelled() {
                    let result = engine.search_with_allocator(&ctx, &req, &allocator).await;
                    if let Ok(mut guard) = slots.lock() {
                        guard[i] = Some(result);
                    }
                }
                let _ = tx.send(i).await;
            });
        }
        drop(tx);

        let mut completed = 0usize;
        while let Some(i) = rx.recv().await {
            completed += 1;
            let success = slots
                .lock()
                .map(|guard| guard[i].as_ref().is_some_and(|r| r.is_success()))
                .unwrap_or(false);
            if success {
                abandon.cancel();
                return snapshot(&slots);
            }
            if completed == n {
                break;
            }
        }
        snapshot(&slots)
    }

    /// Fan out all requests; the first arrival, success or failure, wins.
    /// Unlike `any`, every worker is joined before returning, so no task
    /// outlives the call; slower arrivals appear in their slots when they
    /// finished before the join barrier.
    pub async fn race(
        &self,
        ctx: &SearchContext,
        reqs: &[SearchRequest],
    ) -> Vec<Option<SearchResult>> {
        if reqs.is_empty() {
            return Vec::new();
        }
        let n = reqs.len();
        let allocator = Arc::new(CitationAllocator::new());
        let abandon = CancellationToken::new();
        let slots: Arc<Mutex<Vec<Option<SearchResult>>>> =
            Arc::new(Mutex::new((0..n).map(|_| None).collect()));
        let (tx, mut rx) = mpsc::channel::<(usize, bool)>(n);

        let mut handles = Vec::with_capacity(n);
        for (i, req) in reqs.iter().cloned().enumerate() {
            let engine = self.clone();
            let ctx = ctx.clone();
            let allocator = allocator.clone();
            let abandon = abandon.clone();
            let slots = slots.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                if abandon.is_cancelled() {
                    let _ = tx.send((i, false)).await;
                    return;
                }
                let result = engine.search_with_allocator(&ctx, &req, &allocator).await;
                if let Ok(mut guard) = slots.lock() {
                    guard[i] = Some(result);
                }
                let _ = tx.send((i, true)).await;
            }));
        }
        drop(tx);

        while let Some((_, produced)) = rx.recv().await {
            if produced {
                abandon.cancel();
                break;
            }
        }

        // Join barrier: no unjoined workers leak past this call
        let _ = futures::future::join_all(handles).await;
        snapshot(&slots)
    }
}

fn snapshot(slots: &Arc<Mutex<Vec<Option<SearchResult>>>>) -> Vec<Option<SearchResult>> {
    slots.lock().map(|guard| guard.clone()).unwrap_or_default()
}
