//! Distill - one query across many collections
//!
//! A raw query such as `@source=db.posts host=10.0.0.1 disk full` is parsed
//! into free-text terms, `field=value` parameters and an optional collection
//! selector. Each selected collection turns it into fieldsets against its
//! own schema, then into a backend query, and the aggregator runs every
//! collection concurrently and merges the counts.
//!
//! # Architecture
//!
//! - **Query**: nom tokenizer producing a [`StructuredQuery`]; never fails
//! - **Fieldsets**: parameters matched to schema fields, plus one regex
//!   keyword fieldset per free-text field
//! - **Engine**: Mongo-style JSON filters or parameterized SQL
//! - **Backends**: [`SearchExecutor`](backends::SearchExecutor) for an
//!   in-memory document store and SQLite, routed by [`BackendKind`]
//! - **Aggregator**: bounded concurrency and a per-collection timeout; a
//!   failing collection is reported without affecting the others
//!
//! # Usage
//!
//! ```
//! use distill::StructuredQuery;
//!
//! let query = StructuredQuery::parse("@source=db.posts host=10.0.0.1 disk full");
//! assert_eq!(query.collection_selector(), Some("db.posts"));
//! assert_eq!(query.field_parameters()[0].field_name, "host");
//! assert_eq!(query.terms(), &["disk", "full"]);
//! ```
//!
//! ```rust,ignore
//! use distill::{CollectionSearch, PageParams, SearchAggregator};
//!
//! let search = CollectionSearch::new(registry.clone(), executor);
//! let aggregator = SearchAggregator::new(search, config.search.aggregator());
//! let result = aggregator
//!     .search_all("level=error disk", registry.all(), &PageParams::default())
//!     .await;
//! println!("{} hits", result.count);
//! ```

pub mod aggregator;
pub mod backends;
pub mod config;
pub mod engine;
pub mod error;
pub mod fieldset;
pub mod metrics;
pub mod presentation;
pub mod query;
pub mod registry;
pub mod schema;
pub mod search;

pub use aggregator::{AggregatedResult, AggregatorConfig, SearchAggregator};
pub use config::Config;
pub use error::{Error, Result};
pub use query::StructuredQuery;
pub use registry::{BackendKind, Collection, CollectionRegistry};
pub use search::{CollectionResult, CollectionSearch, PageParams};
