// crates/lodestone-core/src/registry.rs
// Search-type to handler lookup

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::host::SearchContext;
use lodestone_types::{SearchRequest, SearchResult, SearchType};

/// A concrete retrieval backend for one [`SearchType`].
///
/// Handlers receive the caller's context and must degrade gracefully:
/// failures come back as a well-formed [`SearchResult`] with `error` set,
/// never as a panic.
#[async_trait]
pub trait SearchHandler: Send + Sync {
    fn kind(&self) -> SearchType;
    async fn search(&self, ctx: &SearchContext, req: &SearchRequest) -> SearchResult;
}

/// Registry mapping search types to handlers.
///
/// No handlers are assumed; wiring is an explicit construction step.
/// Re-registration overwrites. Read-only during dispatch.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<SearchType, Arc<dyn SearchHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own type, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn SearchHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn get(&self, kind: SearchType) -> Option<Arc<dyn SearchHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn is_registered(&self, kind: SearchType) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn registered_types(&self) -> Vec<SearchType> {
        self.handlers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
