//! Collection registry
//!
//! Holds the identity and declared schema of every searchable collection.
//! Collections are loaded from a directory of YAML files, one per
//! collection:
//!
//! ```yaml
//! id: 1
//! backend: mongodb
//! warehouse: test_database
//! name: test_posts
//! location: ./data/test_posts.jsonl
//! schema:
//!   fields:
//!     - name: host
//!       type: ip_address
//!     - name: message
//!       type: text
//! ```

use crate::backends::SchemaProvider;
use crate::schema::CollectionSchema;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Storage engine behind a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Document store queried with Mongo-style filters
    #[serde(rename = "mongodb")]
    MongoDb,
    /// Relational table queried with SQL
    #[serde(rename = "sqlite")]
    Sqlite,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::MongoDb => "mongodb",
            BackendKind::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered collection ("distillery").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: u64,
    pub backend: BackendKind,
    /// Database (or index) the collection lives in
    pub warehouse: String,
    /// Collection or table name inside the warehouse
    pub name: String,
    /// Where the backing data lives, for backends that read local files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
}

impl Collection {
    pub fn new(
        id: u64,
        backend: BackendKind,
        warehouse: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            backend,
            warehouse: warehouse.into(),
            name: name.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// `warehouse.name`, the value matched by `@source=`
    pub fn canonical_name(&self) -> String {
        format!("{}.{}", self.warehouse, self.name)
    }

    /// `backend.warehouse.name`
    pub fn display_name(&self) -> String {
        format!("{}.{}.{}", self.backend, self.warehouse, self.name)
    }

    pub fn reference(&self) -> CollectionRef {
        CollectionRef {
            id: self.id,
            name: self.display_name(),
            canonical: self.canonical_name(),
        }
    }
}

/// Identity of a searched collection, carried on every result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRef {
    pub id: u64,
    pub name: String,
    pub canonical: String,
}

/// On-disk form of a collection: identity plus declared schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDefinition {
    #[serde(flatten)]
    pub collection: Collection,
    pub schema: CollectionSchema,
}

#[derive(Debug, Default)]
pub struct CollectionRegistry {
    collections: Vec<Collection>,
    schemas: HashMap<u64, CollectionSchema>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.yaml` / `*.yml` file in `dir`. Collections are ordered by id.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Err(Error::Config(format!(
                "Collections directory does not exist: {}",
                dir.display()
            )));
        }

        let mut definitions = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_yaml = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            );
            if !is_yaml {
                continue;
            }
            definitions.push(Self::load_definition(&path)?);
        }
        definitions.sort_by_key(|d| d.collection.id);

        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition.collection, definition.schema)?;
        }
        info!(
            "Loaded {} collections from {}",
            registry.len(),
            dir.display()
        );
        Ok(registry)
    }

    pub fn load_definition(path: &Path) -> Result<CollectionDefinition> {
        let content = fs::read_to_string(path)?;
        let mut definition: CollectionDefinition = serde_yaml::from_str(&content)?;

        // Relative data locations are resolved against the definition file
        if let (Some(location), Some(parent)) = (&definition.collection.location, path.parent()) {
            if location.is_relative() {
                definition.collection.location = Some(parent.join(location));
            }
        }
        Ok(definition)
    }

    /// Return a list of human-readable issues for one definition (empty = ok)
    pub fn lint(collection: &Collection, schema: &CollectionSchema) -> Vec<String> {
        let mut issues = Vec::new();
        if collection.warehouse.trim().is_empty() || collection.name.trim().is_empty() {
            issues.push("warehouse and name must be set".to_string());
        }
        if schema.is_empty() {
            issues.push("schema should declare at least one field".to_string());
        }
        let schema_matches_backend = matches!(
            (collection.backend, schema),
            (BackendKind::MongoDb, CollectionSchema::Document(_))
                | (BackendKind::Sqlite, CollectionSchema::Relational(_))
        );
        if !schema_matches_backend {
            issues.push(format!(
                "schema kind does not match backend {}",
                collection.backend
            ));
        }
        issues
    }

    /// Add a collection. Ids and canonical names must be unique.
    pub fn register(&mut self, collection: Collection, schema: CollectionSchema) -> Result<()> {
        let issues = Self::lint(&collection, &schema);
        if !issues.is_empty() {
            return Err(Error::Schema(format!(
                "{}: {}",
                collection.canonical_name(),
                issues.join("; ")
            )));
        }
        if self.schemas.contains_key(&collection.id) {
            return Err(Error::Config(format!(
                "Duplicate collection id {}",
                collection.id
            )));
        }
        let canonical = collection.canonical_name();
        if self.by_canonical_name(&canonical).is_some() {
            return Err(Error::Config(format!(
                "Duplicate collection name {}",
                canonical
            )));
        }

        self.schemas.insert(collection.id, schema);
        self.collections.push(collection);
        Ok(())
    }

    pub fn all(&self) -> &[Collection] {
        &self.collections
    }

    pub fn get(&self, id: u64) -> Option<&Collection> {
        self.collections.iter().find(|c| c.id == id)
    }

    pub fn by_canonical_name(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.canonical_name() == name)
    }

    pub fn declared_schema(&self, id: u64) -> Option<&CollectionSchema> {
        self.schemas.get(&id)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

#[async_trait]
impl SchemaProvider for CollectionRegistry {
    async fn schema(&self, collection: &Collection) -> Result<CollectionSchema> {
        self.declared_schema(collection.id)
            .cloned()
            .ok_or_else(|| Error::CollectionNotFound(collection.canonical_name()))
    }
}
