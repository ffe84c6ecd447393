// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod sentiment;
pub mod store;
pub mod text;
pub mod types;

// Rule engines (classification, entities, scoring, angles, cross-references)
pub mod analyze;

// Feed fetching, parsing and the generic scan module
pub mod ingest;

// ---- Re-exports for stable public API ----
pub use crate::config::ReconConfig;
pub use crate::error::{ReconError, Result};
pub use crate::ingest::fetch::{FeedFetcher, FetchOutcome, HttpFetcher, StaticFetcher};
pub use crate::pipeline::{Pipeline, RunReport};
pub use crate::store::{IntelStore, StoreLimits};
pub use crate::types::{CrossReference, Finding, IntelDatabase, IntelItem, Sentiment, Target};
