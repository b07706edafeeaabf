//! Multi-collection search
//!
//! Parses a query once, picks the collections it applies to and searches
//! them concurrently, then merges the per-collection results.
//!
//! # Architecture
//!
//! ```text
//! raw query → parse → select collections → [search 1, search 2, ...] → merge
//!                                                 ↓
//!                           bounded concurrency, per-collection timeout
//!                                                 ↓
//!                            failures isolated to their own result
//! ```

use crate::query::StructuredQuery;
use crate::registry::Collection;
use crate::search::{CollectionResult, CollectionSearch, PageParams, SearchFailure};
use crate::{metrics, Error};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Aggregator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregatorConfig {
    /// Maximum collections searched at the same time
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_searches: usize,

    /// Time allowed for a single collection search
    #[serde(default = "default_collection_timeout")]
    pub collection_timeout_ms: u64,
}

fn default_max_concurrent() -> usize {
    10
}

fn default_collection_timeout() -> u64 {
    5000
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: default_max_concurrent(),
            collection_timeout_ms: default_collection_timeout(),
        }
    }
}

/// Merged outcome of a multi-collection search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedResult {
    /// Sum of every collection's count
    pub count: usize,
    /// One entry per searched collection, in selection order
    pub results: Vec<CollectionResult>,
}

impl AggregatedResult {
    pub fn from_results(results: Vec<CollectionResult>) -> Self {
        let count = results.iter().map(|r| r.count).sum();
        Self { count, results }
    }

    pub fn failures(&self) -> impl Iterator<Item = &CollectionResult> {
        self.results.iter().filter(|r| r.is_failed())
    }

    /// True when at least one collection failed
    pub fn is_partial(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Collections a query applies to: the one named by `@source=`, or all of them.
pub fn select_collections<'a>(
    query: &StructuredQuery,
    collections: &'a [Collection],
) -> Vec<&'a Collection> {
    match query.collection_selector() {
        Some(selector) => collections
            .iter()
            .filter(|c| c.canonical_name() == selector)
            .collect(),
        None => collections.iter().collect(),
    }
}

/// Fans a query out over many collections.
pub struct SearchAggregator {
    search: CollectionSearch,
    config: AggregatorConfig,
    semaphore: Arc<Semaphore>,
}

impl SearchAggregator {
    pub fn new(search: CollectionSearch, config: AggregatorConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_searches.max(1)));
        Self {
            search,
            config,
            semaphore,
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Parse `raw_query` and search every matching collection.
    pub async fn search_all(
        &self,
        raw_query: &str,
        collections: &[Collection],
        page: &PageParams,
    ) -> AggregatedResult {
        let query = StructuredQuery::parse(raw_query);
        self.search_query(&query, collections, page).await
    }

    /// Search every collection matching an already parsed query.
    ///
    /// A collection that fails or times out contributes a result carrying
    /// the failure and a zero count; the others are unaffected.
    pub async fn search_query(
        &self,
        query: &StructuredQuery,
        collections: &[Collection],
        page: &PageParams,
    ) -> AggregatedResult {
        let candidates = select_collections(query, collections);
        debug!(
            "Routing query to {} collections: {:?}",
            candidates.len(),
            candidates
                .iter()
                .map(|c| c.canonical_name())
                .collect::<Vec<_>>()
        );

        if candidates.is_empty() {
            return AggregatedResult::default();
        }

        let timeout = Duration::from_millis(self.config.collection_timeout_ms);
        let futures: Vec<_> = candidates
            .into_iter()
            .map(|collection| self.search_one(query, collection, page, timeout))
            .collect();

        // Every collection must finish (or time out) before counts are merged
        let results = futures::future::join_all(futures).await;
        let merged = AggregatedResult::from_results(results);

        let failed = merged.failures().count();
        if failed > 0 {
            warn!(
                "Search returned partial results: {}/{} collections failed",
                failed,
                merged.results.len()
            );
        }
        metrics::record_aggregate_search(merged.results.len(), failed, merged.count);

        merged
    }

    async fn search_one(
        &self,
        query: &StructuredQuery,
        collection: &Collection,
        page: &PageParams,
        timeout: Duration,
    ) -> CollectionResult {
        // A closed semaphore only happens on shutdown; search anyway
        let _permit = self.semaphore.acquire().await.ok();

        let outcome =
            match tokio::time::timeout(timeout, self.search.search(query, collection, page)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::Timeout(format!(
                    "{} did not answer within {}ms",
                    collection.canonical_name(),
                    timeout.as_millis()
                ))),
            };

        match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!("Collection {} failed: {}", collection.display_name(), e);
                // Errors returned by the search itself are already counted
                if e.is_timeout() {
                    metrics::record_collection_search_error(
                        &collection.canonical_name(),
                        e.error_type(),
                    );
                }
                CollectionResult::failed(collection.reference(), SearchFailure::from(&e))
            }
        }
    }
}
