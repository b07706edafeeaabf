pub mod types;

pub use types::{
    CollectionSchema, ColumnDef, DocumentSchema, FieldDef, FieldLookup, FieldType, TableSchema,
};
