//! In-memory document store
//!
//! Evaluates Mongo-style filters (`$and`, `$or`, `$regex` and plain
//! equality) over JSON records. Backs JSONL collections in the CLI and the
//! fakes used throughout the tests.

use super::{ResultPage, SearchExecutor};
use crate::engine::EngineQuery;
use crate::registry::Collection;
use crate::search::PageParams;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<u64, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records to a collection
    pub fn insert(&self, collection_id: u64, records: Vec<Value>) {
        self.records
            .write()
            .entry(collection_id)
            .or_default()
            .extend(records);
    }

    /// Load newline-delimited JSON records. Blank lines are skipped.
    pub fn load_jsonl(&self, collection_id: u64, path: impl AsRef<Path>) -> Result<usize> {
        let content = fs::read_to_string(path)?;
        let records = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<std::result::Result<Vec<Value>, _>>()?;
        let count = records.len();
        self.insert(collection_id, records);
        Ok(count)
    }

    pub fn len(&self, collection_id: u64) -> usize {
        self.records
            .read()
            .get(&collection_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl SearchExecutor for MemoryStore {
    async fn execute(
        &self,
        collection: &Collection,
        query: &EngineQuery,
        page: &PageParams,
    ) -> Result<ResultPage> {
        let EngineQuery::Document(filter) = query else {
            return Err(Error::Backend(format!(
                "{} only accepts document queries",
                collection.canonical_name()
            )));
        };
        let matcher = Matcher::compile(filter)?;

        let records = self.records.read();
        let Some(records) = records.get(&collection.id) else {
            return Ok(ResultPage::default());
        };

        let matching: Vec<&Value> = records.iter().filter(|r| matcher.matches(r)).collect();
        let results = matching
            .iter()
            .skip(page.offset())
            .take(page.page_size)
            .map(|r| (*r).clone())
            .collect();

        Ok(ResultPage {
            results,
            total: matching.len(),
        })
    }
}

/// Compiled form of a filter document.
#[derive(Debug)]
enum Matcher {
    All(Vec<Matcher>),
    Any(Vec<Matcher>),
    Regex { path: String, regex: Regex },
    Equals { path: String, value: Value },
}

impl Matcher {
    fn compile(filter: &Value) -> Result<Matcher> {
        let Value::Object(map) = filter else {
            return Err(Error::InvalidQuery(format!(
                "filter must be an object, got {}",
                filter
            )));
        };

        let mut clauses = Vec::with_capacity(map.len());
        for (key, condition) in map {
            let clause = match key.as_str() {
                "$and" => Matcher::All(Self::compile_list(condition)?),
                "$or" => Matcher::Any(Self::compile_list(condition)?),
                op if op.starts_with('$') => {
                    return Err(Error::InvalidQuery(format!("unsupported operator {}", op)))
                }
                path => Self::compile_condition(path, condition)?,
            };
            clauses.push(clause);
        }
        Ok(Matcher::All(clauses))
    }

    fn compile_list(value: &Value) -> Result<Vec<Matcher>> {
        value
            .as_array()
            .ok_or_else(|| Error::InvalidQuery("$and/$or expect an array".to_string()))?
            .iter()
            .map(Self::compile)
            .collect()
    }

    fn compile_condition(path: &str, condition: &Value) -> Result<Matcher> {
        if let Some(pattern) = condition.get("$regex") {
            let pattern = pattern
                .as_str()
                .ok_or_else(|| Error::InvalidQuery("$regex expects a string".to_string()))?;
            let case_insensitive = condition
                .get("$options")
                .and_then(Value::as_str)
                .map(|o| o.contains('i'))
                .unwrap_or(false);
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|e| Error::InvalidQuery(e.to_string()))?;
            return Ok(Matcher::Regex {
                path: path.to_string(),
                regex,
            });
        }
        Ok(Matcher::Equals {
            path: path.to_string(),
            value: condition.clone(),
        })
    }

    fn matches(&self, record: &Value) -> bool {
        match self {
            Matcher::All(clauses) => clauses.iter().all(|c| c.matches(record)),
            Matcher::Any(clauses) => clauses.iter().any(|c| c.matches(record)),
            Matcher::Regex { path, regex } => lookup(record, path)
                .map(|v| any_scalar(v, |s| scalar_text(s).is_some_and(|t| regex.is_match(&t))))
                .unwrap_or(false),
            Matcher::Equals { path, value } => lookup(record, path)
                .map(|v| any_scalar(v, |s| scalar_eq(s, value)))
                .unwrap_or(false),
        }
    }
}

/// Resolve a dotted path (`user.name`) inside a record.
fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |current, part| current.get(part))
}

/// Arrays match when any element matches.
fn any_scalar(value: &Value, pred: impl Fn(&Value) -> bool) -> bool {
    match value {
        Value::Array(items) => items.iter().any(pred),
        other => pred(other),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => match (actual, expected) {
            (Value::String(a), other) | (other, Value::String(a)) => {
                scalar_text(other).is_some_and(|t| &t == a)
            }
            _ => false,
        },
    }
}
