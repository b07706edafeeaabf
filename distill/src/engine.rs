//! Engine-native query translation
//!
//! Fieldsets are turned into the query format of the collection's backend.
//! Both translations use the same grouping:
//!
//! ```text
//! param_1 AND param_2 AND (keyword_field_1 OR keyword_field_2 ...)
//! ```

use crate::fieldset::{FieldsetSource, Operator, QueryFieldset};
use crate::registry::BackendKind;
use crate::schema::FieldType;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Query in the dialect of one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", content = "query", rename_all = "snake_case")]
pub enum EngineQuery {
    /// Mongo-style filter document
    Document(Value),
    /// SQL `WHERE` clause with positional parameters
    Sql(SqlFilter),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlFilter {
    pub clause: String,
    pub params: Vec<String>,
}

/// Translate fieldsets for `backend`. Returns `None` when there is nothing to filter on.
pub fn translate(backend: BackendKind, fieldsets: &[QueryFieldset]) -> Option<EngineQuery> {
    if fieldsets.is_empty() {
        return None;
    }
    match backend {
        BackendKind::MongoDb => document_query(fieldsets).map(EngineQuery::Document),
        BackendKind::Sqlite => sql_query(fieldsets).map(EngineQuery::Sql),
    }
}

fn split(fieldsets: &[QueryFieldset]) -> (Vec<&QueryFieldset>, Vec<&QueryFieldset>) {
    fieldsets
        .iter()
        .partition(|f| f.source == FieldsetSource::Parameter)
}

fn document_query(fieldsets: &[QueryFieldset]) -> Option<Value> {
    let (params, keywords) = split(fieldsets);

    let mut clauses: Vec<Value> = params.into_iter().map(document_condition).collect();
    let mut alternatives: Vec<Value> = keywords.into_iter().map(document_condition).collect();
    match alternatives.len() {
        0 => {}
        1 => clauses.append(&mut alternatives),
        _ => clauses.push(json!({ "$or": alternatives })),
    }

    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(json!({ "$and": clauses })),
    }
}

fn document_condition(fieldset: &QueryFieldset) -> Value {
    let condition = match fieldset.operator {
        Operator::Eq => typed_value(fieldset.field_type, &fieldset.value),
        Operator::Contains => json!({
            "$regex": regex::escape(&fieldset.value),
            "$options": "i",
        }),
        Operator::Regex => json!({
            "$regex": fieldset.value,
            "$options": "i",
        }),
    };
    let mut map = Map::new();
    map.insert(fieldset.field_name.clone(), condition);
    Value::Object(map)
}

/// Coerce a query string value to the JSON type of the field when possible.
fn typed_value(field_type: FieldType, raw: &str) -> Value {
    match field_type {
        FieldType::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(raw)),
        FieldType::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(raw)),
        FieldType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Value::Bool(true),
            "false" | "0" | "no" => Value::Bool(false),
            _ => Value::from(raw),
        },
        _ => Value::from(raw),
    }
}

fn sql_query(fieldsets: &[QueryFieldset]) -> Option<SqlFilter> {
    let (params, keywords) = split(fieldsets);
    let mut values = Vec::new();

    let mut clauses: Vec<String> = params
        .into_iter()
        .map(|f| sql_condition(f, &mut values))
        .collect();
    let alternatives: Vec<String> = keywords
        .into_iter()
        .map(|f| sql_condition(f, &mut values))
        .collect();
    match alternatives.len() {
        0 => {}
        1 => clauses.extend(alternatives),
        _ => clauses.push(format!("({})", alternatives.join(" OR "))),
    }

    if clauses.is_empty() {
        return None;
    }
    Some(SqlFilter {
        clause: clauses.join(" AND "),
        params: values,
    })
}

fn sql_condition(fieldset: &QueryFieldset, values: &mut Vec<String>) -> String {
    let column = quote_ident(&fieldset.field_name);
    match fieldset.operator {
        Operator::Eq => {
            values.push(fieldset.value.clone());
            format!("{} = ?", column)
        }
        Operator::Contains => {
            values.push(format!("%{}%", escape_like(&fieldset.value)));
            format!("{} LIKE ? ESCAPE '\\'", column)
        }
        Operator::Regex => {
            values.push(fieldset.value.clone());
            format!("{} REGEXP ?", column)
        }
    }
}

/// Quote an SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldset;
    use crate::query::StructuredQuery;
    use crate::schema::{CollectionSchema, ColumnDef, FieldDef, TableSchema};

    fn document_schema() -> CollectionSchema {
        CollectionSchema::document(vec![
            FieldDef::new("host", FieldType::IpAddress),
            FieldDef::new("message", FieldType::Text),
            FieldDef::new("port", FieldType::Integer),
        ])
    }

    fn table_schema() -> CollectionSchema {
        CollectionSchema::Relational(TableSchema {
            columns: vec![
                ColumnDef { name: "host".into(), sql_type: "INET".into() },
                ColumnDef { name: "message".into(), sql_type: "TEXT".into() },
                ColumnDef { name: "port".into(), sql_type: "INTEGER".into() },
            ],
        })
    }

    fn fieldsets(raw: &str, schema: &CollectionSchema) -> Vec<QueryFieldset> {
        fieldset::build(&StructuredQuery::parse(raw), schema)
    }

    #[test]
    fn test_empty_fieldsets_translate_to_nothing() {
        assert!(translate(BackendKind::MongoDb, &[]).is_none());
        assert!(translate(BackendKind::Sqlite, &[]).is_none());
    }

    #[test]
    fn test_document_keywords_are_ored() {
        let query = translate(BackendKind::MongoDb, &fieldsets("error", &document_schema())).unwrap();
        assert_eq!(
            query,
            EngineQuery::Document(json!({
                "$or": [
                    { "host": { "$regex": "error", "$options": "i" } },
                    { "message": { "$regex": "error", "$options": "i" } },
                ]
            }))
        );
    }

    #[test]
    fn test_document_parameters_are_anded() {
        let query = translate(
            BackendKind::MongoDb,
            &fieldsets("port=22 message=disk", &document_schema()),
        )
        .unwrap();
        assert_eq!(
            query,
            EngineQuery::Document(json!({
                "$and": [
                    { "port": 22 },
                    { "message": { "$regex": "disk", "$options": "i" } },
                ]
            }))
        );
    }

    #[test]
    fn test_single_condition_is_not_wrapped() {
        let query = translate(BackendKind::MongoDb, &fieldsets("host=10.0.0.1", &document_schema())).unwrap();
        assert_eq!(query, EngineQuery::Document(json!({ "host": "10.0.0.1" })));
    }

    #[test]
    fn test_sql_grouping() {
        let query = translate(BackendKind::Sqlite, &fieldsets("port=22 fail", &table_schema())).unwrap();
        assert_eq!(
            query,
            EngineQuery::Sql(SqlFilter {
                clause: r#""port" = ? AND ("host" REGEXP ? OR "message" REGEXP ?)"#.to_string(),
                params: vec!["22".into(), "fail".into(), "fail".into()],
            })
        );
    }

    #[test]
    fn test_sql_contains_escapes_wildcards() {
        let query = translate(BackendKind::Sqlite, &fieldsets("message=50%_off", &table_schema())).unwrap();
        let EngineQuery::Sql(filter) = query else {
            panic!("expected sql");
        };
        assert_eq!(filter.clause, r#""message" LIKE ? ESCAPE '\'"#);
        assert_eq!(filter.params, vec![r"%50\%\_off%".to_string()]);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_typed_values() {
        assert_eq!(typed_value(FieldType::Integer, "7"), json!(7));
        assert_eq!(typed_value(FieldType::Integer, "seven"), json!("seven"));
        assert_eq!(typed_value(FieldType::Float, "1.5"), json!(1.5));
        assert_eq!(typed_value(FieldType::Boolean, "TRUE"), json!(true));
        assert_eq!(typed_value(FieldType::IpAddress, "13.43"), json!("13.43"));
    }
}
