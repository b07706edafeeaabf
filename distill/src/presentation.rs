//! Response shapes
//!
//! Turns search results into the JSON documents served to clients:
//!
//! ```json
//! {
//!   "count": 1,
//!   "results": [...],
//!   "next": null,
//!   "previous": null,
//!   "distillery": { "id": 1, "name": "mongodb.db.posts", "url": ".../distilleries/1/" }
//! }
//! ```
//!
//! URLs come from a [`LinkBuilder`] supplied by the caller.

use crate::aggregator::AggregatedResult;
use crate::registry::CollectionRef;
use crate::search::{CollectionResult, PageCursor};
use serde_json::{json, Value};

pub trait LinkBuilder {
    /// Detail URL of a collection
    fn collection_url(&self, collection: &CollectionRef) -> String;

    /// URL of another page of a collection's results
    fn page_url(&self, collection: &CollectionRef, cursor: &PageCursor) -> String;
}

/// Builds links below a fixed API root, e.g. `http://localhost:8000/api/v1`.
#[derive(Debug, Clone)]
pub struct BaseUrlLinks {
    base_url: String,
}

impl BaseUrlLinks {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }
}

impl LinkBuilder for BaseUrlLinks {
    fn collection_url(&self, collection: &CollectionRef) -> String {
        format!("{}/distilleries/{}/", self.base_url, collection.id)
    }

    fn page_url(&self, collection: &CollectionRef, cursor: &PageCursor) -> String {
        format!(
            "{}/distilleries/{}/search/?page={}&page_size={}",
            self.base_url, collection.id, cursor.page, cursor.page_size
        )
    }
}

/// One collection's result document.
pub fn present_collection(result: &CollectionResult, links: &impl LinkBuilder) -> Value {
    let link = |cursor: &Option<PageCursor>| match cursor {
        Some(c) => Value::String(links.page_url(&result.collection, c)),
        None => Value::Null,
    };

    let mut doc = json!({
        "count": result.count,
        "results": result.results,
        "next": link(&result.next),
        "previous": link(&result.previous),
        "distillery": {
            "id": result.collection.id,
            "name": result.collection.name,
            "url": links.collection_url(&result.collection),
        },
    });
    if let (Some(failure), Value::Object(map)) = (&result.error, &mut doc) {
        map.insert("error".to_string(), json!(failure));
    }
    doc
}

/// Aggregate document: the summed count and every collection's document.
pub fn present_aggregate(result: &AggregatedResult, links: &impl LinkBuilder) -> Value {
    json!({
        "count": result.count,
        "results": result
            .results
            .iter()
            .map(|r| present_collection(r, links))
            .collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{BackendKind, Collection};
    use crate::search::{PageParams, SearchFailure};
    use crate::Error;

    fn links() -> BaseUrlLinks {
        BaseUrlLinks::new("http://testserver/api/v1/")
    }

    fn posts_result() -> CollectionResult {
        let collection = Collection::new(1, BackendKind::MongoDb, "test_database", "test_posts");
        let mut result = CollectionResult::empty(collection.reference(), Vec::new());
        result.count = 1;
        result.results = vec![json!({ "id": 1, "content": "content" })];
        result
    }

    #[test]
    fn test_collection_document() {
        assert_eq!(
            present_collection(&posts_result(), &links()),
            json!({
                "count": 1,
                "results": [{ "id": 1, "content": "content" }],
                "next": null,
                "previous": null,
                "distillery": {
                    "id": 1,
                    "name": "mongodb.test_database.test_posts",
                    "url": "http://testserver/api/v1/distilleries/1/",
                }
            })
        );
    }

    #[test]
    fn test_page_links() {
        let mut result = posts_result();
        result.next = Some(PageParams::new(3, 10));
        result.previous = Some(PageParams::new(1, 10));

        let doc = present_collection(&result, &links());
        assert_eq!(
            doc["next"],
            "http://testserver/api/v1/distilleries/1/search/?page=3&page_size=10"
        );
        assert_eq!(
            doc["previous"],
            "http://testserver/api/v1/distilleries/1/search/?page=1&page_size=10"
        );
    }

    #[test]
    fn test_failed_collection_carries_error() {
        let collection = Collection::new(2, BackendKind::Sqlite, "logs", "events");
        let failure = SearchFailure::from(&Error::Backend("connection refused".into()));
        let doc = present_collection(&CollectionResult::failed(collection.reference(), failure), &links());

        assert_eq!(doc["count"], 0);
        assert_eq!(doc["error"]["error_type"], "backend");
        assert_eq!(doc["error"]["is_timeout"], false);
    }

    #[test]
    fn test_aggregate_document() {
        let aggregate = AggregatedResult::from_results(vec![posts_result()]);
        let doc = present_aggregate(&aggregate, &links());

        assert_eq!(doc["count"], 1);
        assert_eq!(doc["results"].as_array().unwrap().len(), 1);
        assert_eq!(doc["results"][0]["distillery"]["id"], 1);
        assert!(doc["results"][0].get("error").is_none());
    }
}
