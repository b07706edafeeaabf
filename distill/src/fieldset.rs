//! Fieldset construction
//!
//! Resolves a [`StructuredQuery`] against one collection's schema. Field
//! parameters become one criterion each (when the field exists); keyword
//! terms become one `regex` criterion per free-text field, all carrying the
//! same `term1|term2|...` alternation.

use crate::query::StructuredQuery;
use crate::schema::{FieldLookup, FieldType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a fieldset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Exact match
    Eq,
    /// Case-insensitive substring match
    Contains,
    /// Case-insensitive regular expression match
    Regex,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Contains => "contains",
            Operator::Regex => "regex",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which pass produced a fieldset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldsetSource {
    Parameter,
    Keyword,
}

/// Operator used for `field=value` parameters, by field type.
const PARAMETER_OPERATORS: &[(FieldType, Operator)] = &[
    (FieldType::Char, Operator::Contains),
    (FieldType::Text, Operator::Contains),
    (FieldType::Email, Operator::Eq),
    (FieldType::Url, Operator::Eq),
    (FieldType::IpAddress, Operator::Eq),
    (FieldType::Integer, Operator::Eq),
    (FieldType::Float, Operator::Eq),
    (FieldType::Boolean, Operator::Eq),
    (FieldType::Datetime, Operator::Eq),
];

/// Operator used for keyword terms on free-text fields.
pub const KEYWORD_OPERATOR: Operator = Operator::Regex;

/// Delimiter joining keyword terms into one pattern.
pub const TERM_DELIMITER: &str = "|";

pub fn parameter_operator(field_type: FieldType) -> Operator {
    PARAMETER_OPERATORS
        .iter()
        .find(|(t, _)| *t == field_type)
        .map(|(_, op)| *op)
        .unwrap_or(Operator::Eq)
}

/// One resolved filter criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFieldset {
    pub field_name: String,
    pub field_type: FieldType,
    pub operator: Operator,
    pub value: String,
    pub source: FieldsetSource,
}

/// Build the fieldsets for `query` against `schema`.
///
/// Parameter fieldsets come first (query order), then keyword fieldsets
/// (schema declaration order). Parameters naming unknown fields are skipped.
pub fn build(query: &StructuredQuery, schema: &impl FieldLookup) -> Vec<QueryFieldset> {
    let mut fieldsets = parameter_fieldsets(query, schema);
    fieldsets.extend(keyword_fieldsets(query, schema));
    fieldsets
}

fn parameter_fieldsets(query: &StructuredQuery, schema: &impl FieldLookup) -> Vec<QueryFieldset> {
    query
        .field_parameters()
        .iter()
        .filter_map(|param| {
            let field_type = schema.field_type(&param.field_name)?;
            Some(QueryFieldset {
                field_name: param.field_name.clone(),
                field_type,
                operator: parameter_operator(field_type),
                value: param.value.clone(),
                source: FieldsetSource::Parameter,
            })
        })
        .collect()
}

fn keyword_fieldsets(query: &StructuredQuery, schema: &impl FieldLookup) -> Vec<QueryFieldset> {
    if query.terms().is_empty() {
        return Vec::new();
    }

    let pattern = keyword_pattern(query.terms());
    schema
        .fields()
        .into_iter()
        .filter(|(_, field_type)| field_type.is_free_text())
        .map(|(name, field_type)| QueryFieldset {
            field_name: name.to_string(),
            field_type,
            operator: KEYWORD_OPERATOR,
            value: pattern.clone(),
            source: FieldsetSource::Keyword,
        })
        .collect()
}

/// Join terms into one alternation. Terms are passed through as written,
/// so regex syntax inside a term reaches the backend unchanged.
pub fn keyword_pattern(terms: &[String]) -> String {
    terms.join(TERM_DELIMITER)
}
