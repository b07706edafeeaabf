//! Storage collaborators
//!
//! The core never talks to a storage engine directly. It goes through two
//! traits: [`SchemaProvider`] to learn a collection's fields and
//! [`SearchExecutor`] to run an [`EngineQuery`] and get one page back.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::engine::EngineQuery;
use crate::registry::{BackendKind, Collection};
use crate::schema::CollectionSchema;
use crate::search::PageParams;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One page of matches plus the total number of matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultPage {
    pub results: Vec<Value>,
    pub total: usize,
}

#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Field schema of a collection
    async fn schema(&self, collection: &Collection) -> Result<CollectionSchema>;
}

#[async_trait]
pub trait SearchExecutor: Send + Sync {
    /// Run a query against a collection and return the requested page
    async fn execute(
        &self,
        collection: &Collection,
        query: &EngineQuery,
        page: &PageParams,
    ) -> Result<ResultPage>;
}

/// Dispatches execution to the executor registered for each backend kind.
#[derive(Default, Clone)]
pub struct BackendRouter {
    executors: HashMap<BackendKind, Arc<dyn SearchExecutor>>,
}

impl BackendRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, backend: BackendKind, executor: Arc<dyn SearchExecutor>) -> Self {
        self.register(backend, executor);
        self
    }

    pub fn register(&mut self, backend: BackendKind, executor: Arc<dyn SearchExecutor>) {
        self.executors.insert(backend, executor);
    }
}

#[async_trait]
impl SearchExecutor for BackendRouter {
    async fn execute(
        &self,
        collection: &Collection,
        query: &EngineQuery,
        page: &PageParams,
    ) -> Result<ResultPage> {
        let executor = self.executors.get(&collection.backend).ok_or_else(|| {
            Error::Backend(format!(
                "No executor registered for backend {}",
                collection.backend
            ))
        })?;
        executor.execute(collection, query, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_router_dispatches_by_backend() {
        let store = Arc::new(MemoryStore::new());
        store.insert(1, vec![json!({ "message": "hello" })]);

        let router = BackendRouter::new().with(BackendKind::MongoDb, store);
        let collection = Collection::new(1, BackendKind::MongoDb, "db", "posts");
        let query = EngineQuery::Document(json!({ "message": "hello" }));

        let page = router
            .execute(&collection, &query, &PageParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_router_without_executor() {
        let router = BackendRouter::new();
        let collection = Collection::new(1, BackendKind::Sqlite, "db", "events");
        let query = EngineQuery::Document(json!({}));

        let err = router
            .execute(&collection, &query, &PageParams::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("sqlite"));
    }
}
