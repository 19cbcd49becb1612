use crate::error::RecordError;
use crate::types::{VTABLE_FIELDS_START, field_offset};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use xxhash_rust::xxh64::xxh64;

// ─── BaseType ───────────────────────────────────────────────────────────────

/// Declared storage type of a schema field.
///
/// `Int16`, `UInt16` and `Union` can be described by schema metadata but
/// records cannot hold them; operations touching such fields fail with
/// `UnsupportedType` or `TypeMismatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    String,
    Object,
    Vector,
    Union,
}

impl BaseType {
    /// Inline scalar types a record can store.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            BaseType::Bool
                | BaseType::Int8
                | BaseType::UInt8
                | BaseType::Int32
                | BaseType::UInt32
                | BaseType::Int64
                | BaseType::UInt64
                | BaseType::Float
                | BaseType::Double
        )
    }

    /// Element types a repeated field can be built over.
    pub fn is_supported_element(self) -> bool {
        self.is_scalar() || matches!(self, BaseType::String | BaseType::Object)
    }
}

impl std::fmt::Display for BaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

// ─── SchemaField ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: SmolStr,
    /// Vtable byte offset of the field's slot.
    pub offset: u16,
    pub base_type: BaseType,
    /// Element type, only for `Vector` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<BaseType>,
    /// Nested object name for `Object` and `Vector<Object>` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<SmolStr>,
    #[serde(default)]
    pub default_integer: i64,
    #[serde(default)]
    pub default_real: f64,
    #[serde(skip)]
    pub(crate) object_index: Option<usize>,
}

impl SchemaField {
    /// A scalar or string field. `id` is the declaration id, the slot
    /// offset is derived from it. Ids above
    /// [`MAX_FIELD_ID`](crate::types::MAX_FIELD_ID) yield an
    /// offset that [`SchemaCatalog::new`] rejects.
    pub fn new(name: &str, id: u16, base_type: BaseType) -> Self {
        Self {
            name: SmolStr::new(name),
            offset: field_offset(id),
            base_type,
            element: None,
            object: None,
            default_integer: 0,
            default_real: 0.0,
            object_index: None,
        }
    }

    /// A nested table field.
    pub fn object(name: &str, id: u16, object: &str) -> Self {
        Self {
            object: Some(SmolStr::new(object)),
            ..Self::new(name, id, BaseType::Object)
        }
    }

    /// A vector of scalars or strings.
    pub fn vector(name: &str, id: u16, element: BaseType) -> Self {
        Self {
            element: Some(element),
            ..Self::new(name, id, BaseType::Vector)
        }
    }

    /// A vector of nested tables.
    pub fn vector_of(name: &str, id: u16, object: &str) -> Self {
        Self {
            element: Some(BaseType::Object),
            object: Some(SmolStr::new(object)),
            ..Self::new(name, id, BaseType::Vector)
        }
    }

    pub fn with_default_integer(mut self, value: i64) -> Self {
        self.default_integer = value;
        self
    }

    pub fn with_default_real(mut self, value: f64) -> Self {
        self.default_real = value;
        self
    }

    /// Index of the nested object in the owning catalog.
    #[inline]
    pub fn object_index(&self) -> Option<usize> {
        self.object_index
    }

    fn references_object(&self) -> bool {
        self.base_type == BaseType::Object
            || (self.base_type == BaseType::Vector && self.element == Some(BaseType::Object))
    }
}

// ─── SchemaObject ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaObject {
    pub name: SmolStr,
    pub fields: Vec<SchemaField>,
    /// (xxh64(name), field position), sorted by hash.
    #[serde(skip)]
    hash_index: Vec<(u64, usize)>,
}

impl SchemaObject {
    pub fn new(name: &str, fields: Vec<SchemaField>) -> Self {
        let mut object = Self {
            name: SmolStr::new(name),
            fields,
            hash_index: Vec::new(),
        };
        object.reindex();
        object
    }

    fn reindex(&mut self) {
        self.hash_index = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (xxh64(f.name.as_bytes(), 0), i))
            .collect();
        self.hash_index.sort_unstable_by_key(|(hash, _)| *hash);
    }

    /// Exact-name lookup. `None` if the object does not declare the field.
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        let hash = xxh64(name.as_bytes(), 0);
        let n = self.hash_index.len();
        if n <= 4 {
            return self
                .hash_index
                .iter()
                .filter(|(h, _)| *h == hash)
                .map(|(_, i)| &self.fields[*i])
                .find(|f| f.name == name);
        }
        // Binary search, then walk the run of equal hashes.
        let start = self.hash_index.partition_point(|(h, _)| *h < hash);
        self.hash_index[start..]
            .iter()
            .take_while(|(h, _)| *h == hash)
            .map(|(_, i)| &self.fields[*i])
            .find(|f| f.name == name)
    }

    pub fn field_by_offset(&self, offset: u16) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.offset == offset)
    }

    #[inline]
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }
}

// ─── SchemaCatalog ──────────────────────────────────────────────────────────

/// Load-time schema metadata. Immutable once built; share it behind an
/// `Arc` across any number of record trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CatalogDef", into = "CatalogDef")]
pub struct SchemaCatalog {
    objects: Vec<SchemaObject>,
    root_table: Option<usize>,
    by_name: FxHashMap<SmolStr, usize>,
}

#[derive(Serialize, Deserialize)]
struct CatalogDef {
    objects: Vec<SchemaObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    root_table: Option<SmolStr>,
}

impl TryFrom<CatalogDef> for SchemaCatalog {
    type Error = RecordError;

    fn try_from(def: CatalogDef) -> Result<Self, Self::Error> {
        SchemaCatalog::new(def.objects, def.root_table.as_deref())
    }
}

impl From<SchemaCatalog> for CatalogDef {
    fn from(catalog: SchemaCatalog) -> Self {
        let root_table = catalog
            .root_table
            .map(|i| catalog.objects[i].name.clone());
        CatalogDef {
            objects: catalog.objects,
            root_table,
        }
    }
}

/// Field names must read back unchanged from the dotted text form of a
/// field path: not empty, no `.`, no surrounding whitespace, and not all
/// digits, which parse as an offset.
fn is_path_safe(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('.')
        && name.trim() == name
        && !name.bytes().all(|b| b.is_ascii_digit())
}

impl SchemaCatalog {
    /// Validate the objects and resolve nested object references.
    pub fn new(mut objects: Vec<SchemaObject>, root_table: Option<&str>) -> Result<Self, RecordError> {
        let mut by_name = FxHashMap::default();
        for (i, object) in objects.iter().enumerate() {
            if by_name.insert(object.name.clone(), i).is_some() {
                return Err(RecordError::InvalidSchema(format!(
                    "duplicate object {}",
                    object.name
                )));
            }
        }

        for object in objects.iter_mut() {
            for (i, field) in object.fields.iter().enumerate() {
                if !is_path_safe(&field.name) {
                    return Err(RecordError::InvalidSchema(format!(
                        "field {}.{:?} has a name field paths cannot spell",
                        object.name, field.name
                    )));
                }
                if field.offset < VTABLE_FIELDS_START || field.offset % 2 != 0 {
                    return Err(RecordError::InvalidSchema(format!(
                        "field {}.{} has invalid offset {}",
                        object.name, field.name, field.offset
                    )));
                }
                let clash = object.fields[..i]
                    .iter()
                    .any(|f| f.offset == field.offset || f.name == field.name);
                if clash {
                    return Err(RecordError::InvalidSchema(format!(
                        "field {}.{} clashes with an earlier field",
                        object.name, field.name
                    )));
                }
            }

            for field in object.fields.iter_mut() {
                if field.base_type == BaseType::Vector && field.element.is_none() {
                    return Err(RecordError::InvalidSchema(format!(
                        "vector field {}.{} has no element type",
                        object.name, field.name
                    )));
                }
                field.object_index = if field.references_object() {
                    let nested = field.object.as_ref().ok_or_else(|| {
                        RecordError::InvalidSchema(format!(
                            "field {}.{} does not name its object",
                            object.name, field.name
                        ))
                    })?;
                    let index = by_name
                        .get(nested)
                        .copied()
                        .ok_or_else(|| RecordError::UnknownObject(nested.clone()))?;
                    Some(index)
                } else {
                    None
                };
            }
            object.reindex();
        }

        let root_table = match root_table {
            Some(name) => Some(
                by_name
                    .get(name)
                    .copied()
                    .ok_or_else(|| RecordError::UnknownObject(SmolStr::new(name)))?,
            ),
            None => None,
        };

        Ok(Self {
            objects,
            root_table,
            by_name,
        })
    }

    #[inline]
    pub fn objects(&self) -> &[SchemaObject] {
        &self.objects
    }

    #[inline]
    pub fn object(&self, index: usize) -> Option<&SchemaObject> {
        self.objects.get(index)
    }

    pub fn object_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn object_by_name(&self, name: &str) -> Option<&SchemaObject> {
        self.object_index(name).map(|i| &self.objects[i])
    }

    #[inline]
    pub fn root_index(&self) -> Option<usize> {
        self.root_table
    }

    pub fn root(&self) -> Option<&SchemaObject> {
        self.root_table.map(|i| &self.objects[i])
    }

    // ════════════════════════════════════════════════════════════════════════
    // Schema blobs
    // ════════════════════════════════════════════════════════════════════════

    pub fn from_json(text: &str) -> Result<Self, RecordError> {
        serde_json::from_str(text).map_err(|e| RecordError::SchemaCodec(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, RecordError> {
        serde_json::to_string(self).map_err(|e| RecordError::SchemaCodec(e.to_string()))
    }

    pub fn from_cbor(data: &[u8]) -> Result<Self, RecordError> {
        cbor4ii::serde::from_slice(data).map_err(|e| RecordError::SchemaCodec(e.to_string()))
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, RecordError> {
        cbor4ii::serde::to_vec(Vec::new(), self).map_err(|e| RecordError::SchemaCodec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MAX_FIELD_ID;

    fn person_catalog() -> SchemaCatalog {
        let person = SchemaObject::new(
            "Person",
            vec![
                SchemaField::new("name", 0, BaseType::String),
                SchemaField::new("age", 1, BaseType::Int32),
                SchemaField::vector("pets", 2, BaseType::String),
                SchemaField::object("address", 3, "Address"),
                SchemaField::new("height", 4, BaseType::Float),
                SchemaField::new("active", 5, BaseType::Bool),
            ],
        );
        let address = SchemaObject::new("Address", vec![SchemaField::new("city", 0, BaseType::String)]);
        SchemaCatalog::new(vec![person, address], Some("Person")).unwrap()
    }

    #[test]
    fn test_field_lookup_by_name_and_offset() {
        let catalog = person_catalog();
        let person = catalog.root().unwrap();
        assert_eq!(person.name, "Person");
        // >4 fields takes the binary-search path
        assert_eq!(person.field("age").unwrap().offset, 6);
        assert_eq!(person.field("active").unwrap().offset, 14);
        assert!(person.field("missing").is_none());
        assert_eq!(person.field_by_offset(4).unwrap().name, "name");
        assert!(person.field_by_offset(40).is_none());

        let address = catalog.object_by_name("Address").unwrap();
        assert_eq!(address.field("city").unwrap().offset, 4);
        assert!(address.field("street").is_none());
    }

    #[test]
    fn test_nested_object_index_resolved() {
        let catalog = person_catalog();
        let field = catalog.root().unwrap().field("address").unwrap();
        assert_eq!(field.object_index(), catalog.object_index("Address"));
        assert_eq!(catalog.root().unwrap().field("name").unwrap().object_index(), None);
    }

    #[test]
    fn test_unknown_nested_object_rejected() {
        let person = SchemaObject::new("Person", vec![SchemaField::object("pet", 0, "Pet")]);
        let err = SchemaCatalog::new(vec![person], None).unwrap_err();
        assert!(matches!(err, RecordError::UnknownObject(ref name) if name == "Pet"));
    }

    #[test]
    fn test_unknown_root_rejected() {
        let err = SchemaCatalog::new(vec![], Some("Nope")).unwrap_err();
        assert!(matches!(err, RecordError::UnknownObject(_)));
    }

    #[test]
    fn test_duplicate_offsets_rejected() {
        let person = SchemaObject::new(
            "Person",
            vec![
                SchemaField::new("a", 0, BaseType::Int32),
                SchemaField::new("b", 0, BaseType::Int64),
            ],
        );
        assert!(matches!(
            SchemaCatalog::new(vec![person], None),
            Err(RecordError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_field_id_out_of_slot_range_rejected() {
        assert_eq!(field_offset(MAX_FIELD_ID), u16::MAX - 1);
        assert_eq!(field_offset(MAX_FIELD_ID + 1), 0);

        let edge = SchemaObject::new("Edge", vec![SchemaField::new("last", MAX_FIELD_ID, BaseType::Int32)]);
        let catalog = SchemaCatalog::new(vec![edge], None).unwrap();
        assert_eq!(catalog.objects()[0].field("last").unwrap().offset, 65534);

        let wide = SchemaObject::new("Wide", vec![SchemaField::new("far", 40000, BaseType::Int32)]);
        assert!(matches!(
            SchemaCatalog::new(vec![wide], None),
            Err(RecordError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_names_a_path_cannot_spell_rejected() {
        for name in ["42", "", "geo.lat", " age"] {
            let object = SchemaObject::new("Person", vec![SchemaField::new(name, 0, BaseType::Int32)]);
            assert!(
                matches!(SchemaCatalog::new(vec![object], None), Err(RecordError::InvalidSchema(_))),
                "{name:?}"
            );
        }
        let object = SchemaObject::new("Person", vec![SchemaField::new("x2", 0, BaseType::Int32)]);
        assert!(SchemaCatalog::new(vec![object], None).is_ok());
    }

    #[test]
    fn test_vector_without_element_rejected() {
        let person = SchemaObject::new("Person", vec![SchemaField::new("v", 0, BaseType::Vector)]);
        assert!(matches!(
            SchemaCatalog::new(vec![person], None),
            Err(RecordError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_json_blob_roundtrip() {
        let catalog = person_catalog();
        let json = catalog.to_json().unwrap();
        let loaded = SchemaCatalog::from_json(&json).unwrap();
        assert_eq!(loaded, catalog);
        assert_eq!(
            loaded.root().unwrap().field("address").unwrap().object_index(),
            loaded.object_index("Address")
        );
    }

    #[test]
    fn test_json_blob_handwritten() {
        let json = r#"{
            "root_table": "Person",
            "objects": [
                {"name": "Person", "fields": [
                    {"name": "name", "offset": 4, "base_type": "String"},
                    {"name": "age", "offset": 6, "base_type": "Int32", "default_integer": 18}
                ]}
            ]
        }"#;
        let catalog = SchemaCatalog::from_json(json).unwrap();
        let age = catalog.root().unwrap().field("age").unwrap();
        assert_eq!(age.default_integer, 18);
        assert_eq!(age.base_type, BaseType::Int32);
    }

    #[test]
    fn test_cbor_blob_roundtrip() {
        let catalog = person_catalog();
        let blob = catalog.to_cbor().unwrap();
        let loaded = SchemaCatalog::from_cbor(&blob).unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn test_invalid_blob_is_codec_error() {
        assert!(matches!(
            SchemaCatalog::from_json("{not json"),
            Err(RecordError::SchemaCodec(_))
        ));
        assert!(matches!(
            SchemaCatalog::from_cbor(&[0xff, 0x00]),
            Err(RecordError::SchemaCodec(_))
        ));
    }
}
