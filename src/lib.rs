pub mod dynamic_record;
pub mod error;
pub mod field_path;
pub mod schema;
pub mod table;
pub mod types;
pub mod variant;

pub use dynamic_record::{DynamicRecord, RecordFactory, RepeatedField, SerializeOptions};
pub use error::{ErrorKind, RecordError};
pub use field_path::{FieldPath, FieldStep, ResolvedFieldPath};
pub use schema::{BaseType, SchemaCatalog, SchemaField, SchemaObject};
pub use table::TableView;
pub use variant::Variant;
