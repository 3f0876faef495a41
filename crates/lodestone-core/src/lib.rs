// crates/lodestone-core/src/lib.rs
// Lodestone - unified retrieval-augmented search core for LLM agent runtimes

#![allow(clippy::collapsible_if)]
#![allow(clippy::type_complexity)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod citation;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod facade;
pub mod host;
pub mod interop;
pub mod kb;
pub mod keyword;
pub mod provider;
pub mod reference;
pub mod registry;
pub mod rerank;
pub mod utils;
pub mod web;

pub use error::{LodestoneError, Result};

pub use citation::CitationAllocator;
pub use config::SearchConfig;
pub use dispatch::SearchEngine;
pub use facade::{SearchFacade, facade_for, set_facade_factory};
pub use host::SearchContext;
pub use provider::{ProviderMode, Uses};
pub use registry::{HandlerRegistry, SearchHandler};

// Shared contracts, re-exported for downstream convenience
pub use lodestone_types::{
    GraphNode, Reference, RerankOptions, ResultItem, Scenario, SearchRequest, SearchResult,
    SearchType, Source,
};
