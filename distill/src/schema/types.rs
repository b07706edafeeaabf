use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a collection field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Char,
    Text,
    Email,
    Url,
    IpAddress,
    Integer,
    Float,
    Boolean,
    Datetime,
}

impl FieldType {
    /// Whether keyword terms are matched against fields of this type.
    pub fn is_free_text(&self) -> bool {
        matches!(
            self,
            FieldType::Char | FieldType::Text | FieldType::Email | FieldType::Url | FieldType::IpAddress
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Char => "char",
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Url => "url",
            FieldType::IpAddress => "ip_address",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Datetime => "datetime",
        }
    }

    /// Map a declared SQL column type to a field type.
    ///
    /// Follows SQLite's affinity rules (substring matching on the upper-cased
    /// declaration) with a few extra names for address, boolean and time
    /// columns. Returns `None` for types that are never searched (BLOB, ...).
    pub fn from_sql_type(declared: &str) -> Option<FieldType> {
        let decl = declared.trim().to_ascii_uppercase();
        if decl.is_empty() {
            return None;
        }
        if decl.contains("INET") || decl.contains("CIDR") {
            Some(FieldType::IpAddress)
        } else if decl.contains("BOOL") {
            Some(FieldType::Boolean)
        } else if decl.contains("INT") {
            Some(FieldType::Integer)
        } else if decl.contains("CHAR") {
            Some(FieldType::Char)
        } else if decl.contains("CLOB") || decl.contains("TEXT") {
            Some(FieldType::Text)
        } else if decl.contains("DATE") || decl.contains("TIME") {
            Some(FieldType::Datetime)
        } else if decl.contains("REAL")
            || decl.contains("FLOA")
            || decl.contains("DOUB")
            || decl.contains("NUMERIC")
            || decl.contains("DECIMAL")
        {
            Some(FieldType::Float)
        } else {
            None
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field lookup capability shared by every schema flavour.
pub trait FieldLookup {
    /// Searchable fields in declaration order.
    fn fields(&self) -> Vec<(&str, FieldType)>;

    fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields()
            .into_iter()
            .find(|(field, _)| *field == name)
            .map(|(_, field_type)| field_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Schema of a document-store collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSchema {
    pub fields: Vec<FieldDef>,
}

impl FieldLookup for DocumentSchema {
    fn fields(&self) -> Vec<(&str, FieldType)> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), f.field_type))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
}

/// Schema of a relational table; column types are raw SQL declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnDef>,
}

impl FieldLookup for TableSchema {
    fn fields(&self) -> Vec<(&str, FieldType)> {
        self.columns
            .iter()
            .filter_map(|c| FieldType::from_sql_type(&c.sql_type).map(|t| (c.name.as_str(), t)))
            .collect()
    }
}

/// Schema of one collection, tagged by backend family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionSchema {
    Document(DocumentSchema),
    Relational(TableSchema),
}

impl CollectionSchema {
    pub fn document(fields: Vec<FieldDef>) -> Self {
        CollectionSchema::Document(DocumentSchema { fields })
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CollectionSchema::Document(s) => s.fields.is_empty(),
            CollectionSchema::Relational(s) => s.columns.is_empty(),
        }
    }
}

impl FieldLookup for CollectionSchema {
    fn fields(&self) -> Vec<(&str, FieldType)> {
        match self {
            CollectionSchema::Document(schema) => schema.fields(),
            CollectionSchema::Relational(schema) => schema.fields(),
        }
    }
}
