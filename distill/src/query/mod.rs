//! Query string parsing
//!
//! Turns a raw search string into a [`StructuredQuery`]: free-text terms,
//! `field=value` parameters and an optional `@source=` collection selector.
//!
//! ```text
//! @source=test_database.test_posts ip_address=10.0.0.1 error "disk full"
//!   selector: test_database.test_posts
//!   parameters: [(ip_address, 10.0.0.1)]
//!   terms: [error, disk full]
//! ```
//!
//! Parsing never fails. Fragments that do not fit the grammar are kept as
//! free-text terms.

pub mod tokenizer;

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use tokenizer::{tokenize, Token};

/// Reserved key that restricts a query to one collection.
pub const SOURCE_KEY: &str = "@source";

/// A `field=value` restriction taken from the query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldParameter {
    pub field_name: String,
    pub value: String,
}

impl FieldParameter {
    pub fn new(field_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            value: value.into(),
        }
    }
}

/// Parsed form of a search string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredQuery {
    terms: Vec<String>,
    field_parameters: Vec<FieldParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    collection_selector: Option<String>,
}

impl StructuredQuery {
    /// Parse a raw query string.
    ///
    /// When several `@source=` tokens appear, the last one wins.
    pub fn parse(raw: &str) -> Self {
        let tokens = match tokenize(raw) {
            Ok((_, tokens)) => tokens,
            Err(_) => raw
                .split_whitespace()
                .map(|w| Token::Word(w.to_string()))
                .collect(),
        };

        let mut query = Self::default();
        for token in tokens {
            match token {
                Token::Pair(key, value) if key == SOURCE_KEY => {
                    query.collection_selector = Some(value);
                }
                Token::Pair(key, value) => {
                    query.field_parameters.push(FieldParameter::new(key, value));
                }
                Token::Phrase(phrase) => query.push_term(&phrase),
                Token::Word(word) => query.push_term(word.trim_matches('"')),
            }
        }
        query
    }

    fn push_term(&mut self, term: &str) {
        if !term.trim().is_empty() {
            self.terms.push(term.to_string());
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn field_parameters(&self) -> &[FieldParameter] {
        &self.field_parameters
    }

    pub fn collection_selector(&self) -> Option<&str> {
        self.collection_selector.as_deref()
    }

    /// True when there is nothing to search for (a selector alone does not count).
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.field_parameters.is_empty()
    }
}

impl FromStr for StructuredQuery {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    if value.chars().any(|c| c.is_whitespace() || c == '=') {
        write!(f, "\"{}\"", value)
    } else {
        f.write_str(value)
    }
}

impl fmt::Display for StructuredQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut sep = |f: &mut fmt::Formatter<'_>| -> fmt::Result {
            if !std::mem::replace(&mut first, false) {
                f.write_str(" ")?;
            }
            Ok(())
        };

        if let Some(selector) = &self.collection_selector {
            sep(f)?;
            write!(f, "{}=", SOURCE_KEY)?;
            write_value(f, selector)?;
        }
        for param in &self.field_parameters {
            sep(f)?;
            write!(f, "{}=", param.field_name)?;
            write_value(f, &param.value)?;
        }
        for term in &self.terms {
            sep(f)?;
            write_value(f, term)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let query = StructuredQuery::parse("");
        assert!(query.terms().is_empty());
        assert!(query.field_parameters().is_empty());
        assert!(query.collection_selector().is_none());
        assert!(query.is_empty());
    }

    #[test]
    fn test_parse_whitespace_only() {
        assert!(StructuredQuery::parse("   \t\n ").is_empty());
    }

    #[test]
    fn test_parse_field_parameter() {
        let query = StructuredQuery::parse("ip_address=13.43");
        assert_eq!(
            query.field_parameters(),
            &[FieldParameter::new("ip_address", "13.43")]
        );
        assert!(query.terms().is_empty());
    }

    #[test]
    fn test_parse_keywords_and_phrase() {
        let query = StructuredQuery::parse(r#"test "more testing""#);
        assert_eq!(query.terms(), &["test", "more testing"]);
        assert!(query.field_parameters().is_empty());
    }

    #[test]
    fn test_parse_selector() {
        let query = StructuredQuery::parse("@source=db.posts test");
        assert_eq!(query.collection_selector(), Some("db.posts"));
        assert_eq!(query.terms(), &["test"]);
        assert!(query.field_parameters().is_empty());
    }

    #[test]
    fn test_last_selector_wins() {
        let query = StructuredQuery::parse("@source=a.one @source=b.two");
        assert_eq!(query.collection_selector(), Some("b.two"));
        assert!(query.is_empty());
    }

    #[test]
    fn test_order_is_preserved() {
        let query = StructuredQuery::parse("b=2 zeta a=1 alpha \"mid phrase\"");
        assert_eq!(query.terms(), &["zeta", "alpha", "mid phrase"]);
        let names: Vec<_> = query
            .field_parameters()
            .iter()
            .map(|p| p.field_name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_malformed_fragments_become_terms() {
        let query = StructuredQuery::parse("=oops half= \"unterminated phrase");
        assert_eq!(query.terms(), &["=oops", "half=", "unterminated", "phrase"]);
        assert!(query.field_parameters().is_empty());
    }

    #[test]
    fn test_punctuated_keys_are_parameters() {
        let query = StructuredQuery::parse("src:ip=1 user/name=x");
        assert!(query.terms().is_empty());
        let params: Vec<(&str, &str)> = query
            .field_parameters()
            .iter()
            .map(|p| (p.field_name.as_str(), p.value.as_str()))
            .collect();
        assert_eq!(params, vec![("src:ip", "1"), ("user/name", "x")]);
    }

    #[test]
    fn test_lone_quotes_are_dropped() {
        let query = StructuredQuery::parse("\" \"\" word");
        assert_eq!(query.terms(), &["word"]);
    }

    #[test]
    fn test_display_round_trips() {
        let raw = r#"@source=db.posts host=10.0.0.1 message="disk full" error "two words""#;
        let query = StructuredQuery::parse(raw);
        assert_eq!(query.to_string(), raw);
        assert_eq!(StructuredQuery::parse(&query.to_string()), query);
    }

    #[test]
    fn test_from_str() {
        let query: StructuredQuery = "a=1".parse().unwrap();
        assert_eq!(query.field_parameters().len(), 1);
    }
}
