//! Single-collection search
//!
//! Resolves a query against one collection's schema, runs it through the
//! collection's executor and packages the page with counts, cursors and the
//! collection identity.

use crate::backends::{SchemaProvider, SearchExecutor};
use crate::engine::{self, EngineQuery};
use crate::fieldset::{self, QueryFieldset};
use crate::metrics;
use crate::query::StructuredQuery;
use crate::registry::{Collection, CollectionRef};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Requested page (1-based) and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    pub page: usize,
    pub page_size: usize,
}

/// Position of an adjacent page.
pub type PageCursor = PageParams;

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageParams {
    /// Zero values are raised to 1
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn clamped(self, max_page_size: usize) -> Self {
        Self::new(self.page, self.page_size.min(max_page_size.max(1)))
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn next(&self, count: usize) -> Option<PageCursor> {
        if self.offset().saturating_add(self.page_size) >= count {
            return None;
        }
        self.page
            .checked_add(1)
            .map(|page| Self::new(page, self.page_size))
    }

    pub fn previous(&self) -> Option<PageCursor> {
        (self.page > 1).then(|| Self::new(self.page - 1, self.page_size))
    }
}

/// Why a collection produced no results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFailure {
    pub reason: String,
    pub error_type: String,
    pub is_timeout: bool,
}

impl From<&Error> for SearchFailure {
    fn from(err: &Error) -> Self {
        Self {
            reason: err.to_string(),
            error_type: err.error_type().to_string(),
            is_timeout: err.is_timeout(),
        }
    }
}

/// Outcome of searching one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionResult {
    pub collection: CollectionRef,
    /// Total matches in the store, not just on this page
    pub count: usize,
    pub results: Vec<Value>,
    pub next: Option<PageCursor>,
    pub previous: Option<PageCursor>,
    #[serde(skip)]
    pub fieldsets: Vec<QueryFieldset>,
    /// `None` when no query was sent to the backend
    #[serde(skip)]
    pub engine_query: Option<EngineQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SearchFailure>,
}

impl CollectionResult {
    /// Result for a collection that was not queried.
    pub fn empty(collection: CollectionRef, fieldsets: Vec<QueryFieldset>) -> Self {
        Self {
            collection,
            count: 0,
            results: Vec::new(),
            next: None,
            previous: None,
            fieldsets,
            engine_query: None,
            error: None,
        }
    }

    /// Result standing in for a collection whose search failed.
    pub fn failed(collection: CollectionRef, failure: SearchFailure) -> Self {
        Self {
            error: Some(failure),
            ..Self::empty(collection, Vec::new())
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Searches one collection at a time through injected collaborators.
#[derive(Clone)]
pub struct CollectionSearch {
    schemas: Arc<dyn SchemaProvider>,
    executor: Arc<dyn SearchExecutor>,
}

impl CollectionSearch {
    pub fn new(schemas: Arc<dyn SchemaProvider>, executor: Arc<dyn SearchExecutor>) -> Self {
        Self { schemas, executor }
    }

    /// Search `collection`. Schema and execution failures are returned as errors.
    pub async fn search(
        &self,
        query: &StructuredQuery,
        collection: &Collection,
        page: &PageParams,
    ) -> Result<CollectionResult> {
        if query.is_empty() {
            debug!("Empty query, skipping {}", collection.display_name());
            return Ok(CollectionResult::empty(collection.reference(), Vec::new()));
        }

        let name = collection.canonical_name();
        let schema = match self.schemas.schema(collection).await {
            Ok(schema) => schema,
            Err(e) => {
                metrics::record_collection_search_error(&name, e.error_type());
                return Err(e);
            }
        };
        let fieldsets = fieldset::build(query, &schema);

        let Some(engine_query) = engine::translate(collection.backend, &fieldsets) else {
            debug!(
                "No fields of {} match the query, skipping",
                collection.display_name()
            );
            return Ok(CollectionResult::empty(collection.reference(), fieldsets));
        };

        let start = Instant::now();
        let outcome = self.executor.execute(collection, &engine_query, page).await;
        metrics::record_collection_search_duration(&name, start.elapsed());

        let result_page = match outcome {
            Ok(p) => {
                metrics::record_collection_search_success(&name);
                p
            }
            Err(e) => {
                metrics::record_collection_search_error(&name, e.error_type());
                return Err(e);
            }
        };

        debug!(
            "{} returned {} results (total={})",
            collection.display_name(),
            result_page.results.len(),
            result_page.total
        );

        Ok(CollectionResult {
            collection: collection.reference(),
            count: result_page.total,
            results: result_page.results,
            next: page.next(result_page.total),
            previous: page.previous(),
            fieldsets,
            engine_query: Some(engine_query),
            error: None,
        })
    }
}
