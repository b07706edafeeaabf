//! SQLite-backed relational collections

use super::{ResultPage, SchemaProvider, SearchExecutor};
use crate::engine::{quote_ident, EngineQuery, SqlFilter};
use crate::registry::Collection;
use crate::schema::{CollectionSchema, ColumnDef, TableSchema};
use crate::search::PageParams;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Executes SQL filters against tables of one SQLite database.
///
/// The collection name is the table name. Statements run on the blocking
/// pool, so a slow scan never holds up the async workers and the caller's
/// timeout can fire while it runs.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open the database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        register_regexp(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run raw SQL, e.g. to create and fill tables
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.blocking(move |conn| Ok(conn.execute_batch(&sql)?)).await
    }

    /// Run `f` with the connection on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&*conn.lock()))
            .await
            .map_err(|e| Error::Backend(format!("SQLite task failed: {}", e)))?
    }
}

/// `x REGEXP y` calls `regexp(y, x)`. Matching is case-insensitive.
fn register_regexp(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let regex: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> std::result::Result<_, BoxError> {
                Ok(RegexBuilder::new(vr.as_str()?)
                    .case_insensitive(true)
                    .build()?)
            })?;
            let is_match = match ctx.get_raw(1) {
                ValueRef::Text(bytes) => regex.is_match(&String::from_utf8_lossy(bytes)),
                ValueRef::Integer(i) => regex.is_match(&i.to_string()),
                ValueRef::Real(f) => regex.is_match(&f.to_string()),
                ValueRef::Null | ValueRef::Blob(_) => false,
            };
            Ok(is_match)
        },
    )
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// SQLite integers are signed; oversized values are capped.
fn sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn run_page(conn: &Connection, table: &str, filter: &SqlFilter, page: PageParams) -> Result<ResultPage> {
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE {}", table, filter.clause),
        params_from_iter(filter.params.iter()),
        |row| row.get(0),
    )?;

    let mut bound: Vec<SqlValue> = filter.params.iter().cloned().map(SqlValue::Text).collect();
    bound.push(SqlValue::Integer(sql_int(page.page_size)));
    bound.push(SqlValue::Integer(sql_int(page.offset())));

    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM {} WHERE {} LIMIT ? OFFSET ?",
        table, filter.clause
    ))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let results = stmt
        .query_map(params_from_iter(bound), |row| {
            let mut record = Map::new();
            for (i, column) in columns.iter().enumerate() {
                record.insert(column.clone(), to_json(row.get_ref(i)?));
            }
            Ok(Value::Object(record))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(ResultPage {
        results,
        total: usize::try_from(total).unwrap_or(0),
    })
}

#[async_trait]
impl SearchExecutor for SqliteStore {
    async fn execute(
        &self,
        collection: &Collection,
        query: &EngineQuery,
        page: &PageParams,
    ) -> Result<ResultPage> {
        let EngineQuery::Sql(filter) = query else {
            return Err(Error::Backend(format!(
                "{} only accepts SQL queries",
                collection.canonical_name()
            )));
        };
        let table = quote_ident(&collection.name);
        let filter = filter.clone();
        let page = *page;

        self.blocking(move |conn| run_page(conn, &table, &filter, page))
            .await
    }
}

#[async_trait]
impl SchemaProvider for SqliteStore {
    /// Columns as reported by `PRAGMA table_info`
    async fn schema(&self, collection: &Collection) -> Result<CollectionSchema> {
        let table = quote_ident(&collection.name);
        let columns = self
            .blocking(move |conn| {
                let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
                let columns = stmt
                    .query_map([], |row| {
                        Ok(ColumnDef {
                            name: row.get(1)?,
                            sql_type: row.get(2)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(columns)
            })
            .await?;

        if columns.is_empty() {
            return Err(Error::CollectionNotFound(collection.canonical_name()));
        }
        Ok(CollectionSchema::Relational(TableSchema { columns }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BackendKind;
    use crate::schema::{FieldLookup, FieldType};

    async fn events_store() -> (SqliteStore, Collection) {
        let store = SqliteStore::in_memory().unwrap();
        store
            .execute_batch(
                r#"
                CREATE TABLE events (id INTEGER PRIMARY KEY, host INET, message TEXT, port INTEGER, raw BLOB);
                INSERT INTO events (host, message, port) VALUES ('10.0.0.1', 'Disk full', 22);
                INSERT INTO events (host, message, port) VALUES ('10.0.0.2', 'login ok', 443);
                INSERT INTO events (host, message, port) VALUES ('10.0.0.3', 'disk check', 22);
                "#,
            )
            .await
            .unwrap();
        (store, Collection::new(7, BackendKind::Sqlite, "logs", "events"))
    }

    fn sql(clause: &str, params: &[&str]) -> EngineQuery {
        EngineQuery::Sql(SqlFilter {
            clause: clause.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
        })
    }

    #[tokio::test]
    async fn test_regexp_function() {
        let (store, c) = events_store().await;
        let page = store
            .execute(&c, &sql(r#""message" REGEXP ?"#, &["disk"]), &PageParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.results[0]["host"], "10.0.0.1");
        assert!(page.results[0]["raw"].is_null());
    }

    #[tokio::test]
    async fn test_integer_equality_with_text_param() {
        let (store, c) = events_store().await;
        let page = store
            .execute(&c, &sql(r#""port" = ?"#, &["22"]), &PageParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_paging_reports_full_total() {
        let (store, c) = events_store().await;
        let page = store
            .execute(&c, &sql(r#""port" REGEXP ?"#, &["\\d+"]), &PageParams::new(2, 2))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0]["id"], 3);
    }

    #[tokio::test]
    async fn test_schema_from_table_info() {
        let (store, c) = events_store().await;
        let schema = store.schema(&c).await.unwrap();
        assert_eq!(schema.field_type("host"), Some(FieldType::IpAddress));
        assert_eq!(schema.field_type("message"), Some(FieldType::Text));
        assert_eq!(schema.field_type("raw"), None);

        let missing = Collection::new(8, BackendKind::Sqlite, "logs", "nope");
        assert!(matches!(
            store.schema(&missing).await,
            Err(Error::CollectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_document_queries() {
        let (store, c) = events_store().await;
        let err = store
            .execute(
                &c,
                &EngineQuery::Document(serde_json::json!({})),
                &PageParams::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
    }

    #[tokio::test]
    async fn test_huge_page_is_capped() {
        let (store, c) = events_store().await;
        let page = store
            .execute(
                &c,
                &sql(r#""port" = ?"#, &["22"]),
                &PageParams::new(usize::MAX / 2, 50),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert!(page.results.is_empty());
        assert_eq!(sql_int(usize::MAX), i64::MAX);
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_an_error() {
        let (store, c) = events_store().await;
        let err = store
            .execute(&c, &sql(r#""message" REGEXP ?"#, &["("]), &PageParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "sqlite");
    }
}
