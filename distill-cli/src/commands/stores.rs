//! Local executors for registered collections
//!
//! Document collections are read from JSONL files into one shared
//! [`MemoryStore`]. Each relational collection opens its own SQLite file.

use async_trait::async_trait;
use distill::backends::{BackendRouter, MemoryStore, ResultPage, SearchExecutor, SqliteStore};
use distill::engine::EngineQuery;
use distill::{BackendKind, Collection, CollectionRegistry, Error, PageParams, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// SQLite databases keyed by collection id.
#[derive(Default)]
pub struct SqliteFiles {
    stores: HashMap<u64, SqliteStore>,
}

#[async_trait]
impl SearchExecutor for SqliteFiles {
    async fn execute(
        &self,
        collection: &Collection,
        query: &EngineQuery,
        page: &PageParams,
    ) -> Result<ResultPage> {
        let store = self.stores.get(&collection.id).ok_or_else(|| {
            Error::Backend(format!(
                "{} has no database location",
                collection.canonical_name()
            ))
        })?;
        store.execute(collection, query, page).await
    }
}

/// Routed local stores plus the collections whose data could not be opened.
///
/// Searching an unavailable collection fails with the reason it was
/// skipped, so the aggregate reports it next to the healthy ones.
pub struct LocalStores {
    router: BackendRouter,
    unavailable: HashMap<u64, String>,
}

impl LocalStores {
    pub fn unavailable(&self) -> usize {
        self.unavailable.len()
    }
}

#[async_trait]
impl SearchExecutor for LocalStores {
    async fn execute(
        &self,
        collection: &Collection,
        query: &EngineQuery,
        page: &PageParams,
    ) -> Result<ResultPage> {
        if let Some(reason) = self.unavailable.get(&collection.id) {
            return Err(Error::Backend(reason.clone()));
        }
        self.router.execute(collection, query, page).await
    }
}

/// Open the backing data of every collection and route by backend.
///
/// A collection without usable data is logged and marked unavailable.
pub fn open_stores(registry: &CollectionRegistry) -> LocalStores {
    let documents = MemoryStore::new();
    let mut sqlite = SqliteFiles::default();
    let mut unavailable = HashMap::new();

    for collection in registry.all() {
        let Some(location) = &collection.location else {
            warn!("{} has no data location", collection.display_name());
            unavailable.insert(
                collection.id,
                format!("{} has no data location", collection.canonical_name()),
            );
            continue;
        };
        let opened = match collection.backend {
            BackendKind::MongoDb => documents.load_jsonl(collection.id, location).map(|count| {
                info!("Loaded {} records into {}", count, collection.display_name());
            }),
            BackendKind::Sqlite => SqliteStore::open(location).map(|store| {
                sqlite.stores.insert(collection.id, store);
                info!("Opened {} at {}", collection.display_name(), location.display());
            }),
        };
        if let Err(e) = opened {
            warn!(
                "Skipping {}: cannot open {}: {}",
                collection.display_name(),
                location.display(),
                e
            );
            unavailable.insert(
                collection.id,
                format!("cannot open {}: {}", location.display(), e),
            );
        }
    }

    let router = BackendRouter::new()
        .with(BackendKind::MongoDb, Arc::new(documents))
        .with(BackendKind::Sqlite, Arc::new(sqlite));
    LocalStores {
        router,
        unavailable,
    }
}
