use super::repeated::RepeatedField;
use crate::error::RecordError;
use crate::field_path::{FieldPath, FieldStep};
use crate::schema::{BaseType, SchemaCatalog, SchemaField, SchemaObject};
use crate::variant::Variant;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-record storage keyed by field slot offset. Ordered, so iteration
/// follows declaration order for schemas that number fields sequentially.
pub type FieldMap<V> = BTreeMap<u16, V>;

// ─── FieldSelector ──────────────────────────────────────────────────────────

/// Anything that can pick a field out of a schema object: a name, a path
/// step, or a field definition taken from the catalog.
pub trait FieldSelector {
    fn select<'s>(&self, object: &'s SchemaObject) -> Result<&'s SchemaField, RecordError>;
}

impl FieldSelector for str {
    fn select<'s>(&self, object: &'s SchemaObject) -> Result<&'s SchemaField, RecordError> {
        object.field(self).ok_or_else(|| {
            tracing::warn!("unknown field {self} in {}", object.name);
            RecordError::UnknownField(SmolStr::new(self))
        })
    }
}

impl FieldSelector for String {
    #[inline]
    fn select<'s>(&self, object: &'s SchemaObject) -> Result<&'s SchemaField, RecordError> {
        self.as_str().select(object)
    }
}

impl FieldSelector for SchemaField {
    fn select<'s>(&self, object: &'s SchemaObject) -> Result<&'s SchemaField, RecordError> {
        object
            .field_by_offset(self.offset)
            .filter(|f| f.name == self.name && f.base_type == self.base_type)
            .ok_or_else(|| {
                tracing::warn!("field {} does not belong to {}", self.name, object.name);
                RecordError::UnknownField(self.name.clone())
            })
    }
}

impl FieldSelector for FieldStep {
    fn select<'s>(&self, object: &'s SchemaObject) -> Result<&'s SchemaField, RecordError> {
        self.lookup(object).ok_or_else(|| match self {
            FieldStep::Name(name) => RecordError::UnknownField(name.clone()),
            FieldStep::Offset(offset) => RecordError::UnknownOffset {
                object: object.name.clone(),
                offset: *offset,
            },
        })
    }
}

#[inline]
pub(crate) fn schema_of(catalog: &SchemaCatalog, object: usize) -> &SchemaObject {
    &catalog.objects()[object]
}

// ─── RecordFactory ──────────────────────────────────────────────────────────

/// Creates root records bound to objects of one catalog.
#[derive(Debug, Clone)]
pub struct RecordFactory {
    catalog: Arc<SchemaCatalog>,
}

impl RecordFactory {
    pub fn new(catalog: Arc<SchemaCatalog>) -> Self {
        Self { catalog }
    }

    #[inline]
    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    /// A record for the catalog's root table.
    pub fn new_root(&self) -> Result<DynamicRecord, RecordError> {
        let root = self.catalog.root_index().ok_or_else(|| {
            tracing::warn!("no root table specified");
            RecordError::NoRootTable
        })?;
        Ok(DynamicRecord::bound(Arc::clone(&self.catalog), root))
    }

    /// A record for any named object.
    pub fn new_table(&self, name: &str) -> Result<DynamicRecord, RecordError> {
        let index = self
            .catalog
            .object_index(name)
            .ok_or_else(|| RecordError::UnknownObject(SmolStr::new(name)))?;
        Ok(DynamicRecord::bound(Arc::clone(&self.catalog), index))
    }
}

// ─── DynamicRecord ──────────────────────────────────────────────────────────

/// Mutable, schema-bound record tree.
///
/// Scalars and strings, nested tables, and repeated fields live in three
/// disjoint maps; a field's base type decides which one can hold it.
/// Children and repeated containers are created on first access and owned
/// exclusively by this record.
#[derive(Clone)]
pub struct DynamicRecord {
    pub(crate) catalog: Arc<SchemaCatalog>,
    pub(crate) object: usize,
    pub(crate) values: FieldMap<Variant>,
    pub(crate) children: FieldMap<DynamicRecord>,
    pub(crate) repeated: FieldMap<RepeatedField>,
}

impl DynamicRecord {
    pub(crate) fn bound(catalog: Arc<SchemaCatalog>, object: usize) -> Self {
        debug_assert!(object < catalog.objects().len());
        Self {
            catalog,
            object,
            values: FieldMap::new(),
            children: FieldMap::new(),
            repeated: FieldMap::new(),
        }
    }

    #[inline]
    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    /// The schema object this record is bound to.
    #[inline]
    pub fn schema(&self) -> &SchemaObject {
        schema_of(&self.catalog, self.object)
    }

    #[inline]
    pub fn object_index(&self) -> usize {
        self.object
    }

    /// Field definition by exact name, `None` if undeclared.
    pub fn get_field(&self, name: &str) -> Option<&SchemaField> {
        self.schema().field(name)
    }

    /// True if nothing has been set, created or merged into this record.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.children.is_empty() && self.repeated.is_empty()
    }

    // ════════════════════════════════════════════════════════════════════════
    // Scalars and strings
    // ════════════════════════════════════════════════════════════════════════

    /// Store `value` for a scalar or string field. The value's type must be
    /// the field's declared base type; on mismatch nothing changes.
    pub fn set<F, V>(&mut self, field: &F, value: V) -> Result<(), RecordError>
    where
        F: FieldSelector + ?Sized,
        V: Into<Variant>,
    {
        let value = value.into();
        let field = field.select(schema_of(&self.catalog, self.object))?;
        if field.base_type != value.base_type() {
            tracing::warn!(
                "type mismatch for field {}: expected {}, got {}",
                field.name,
                field.base_type,
                value.base_type()
            );
            return Err(RecordError::TypeMismatch {
                field: field.name.clone(),
                expected: field.base_type,
                actual: value.base_type(),
            });
        }
        self.values.insert(field.offset, value);
        Ok(())
    }

    /// Value previously set or merged, `None` if absent or undeclared.
    pub fn get<F: FieldSelector + ?Sized>(&self, field: &F) -> Option<&Variant> {
        let field = field.select(self.schema()).ok()?;
        self.values.get(&field.offset)
    }

    /// Stored value, or the declared default when the field is absent.
    /// `None` for undeclared fields and for Object or Vector fields.
    pub fn get_or_default<F: FieldSelector + ?Sized>(&self, field: &F) -> Option<Variant> {
        let field = field.select(self.schema()).ok()?;
        match self.values.get(&field.offset) {
            Some(value) => Some(value.clone()),
            None => Variant::default_for(field),
        }
    }

    /// Whether the field holds anything: a value (even one equal to the
    /// declared default), a child record, or a repeated container.
    pub fn has_field<F: FieldSelector + ?Sized>(&self, field: &F) -> bool {
        match field.select(self.schema()) {
            Ok(field) => {
                let offset = field.offset;
                self.values.contains_key(&offset)
                    || self.children.contains_key(&offset)
                    || self.repeated.contains_key(&offset)
            }
            Err(_) => false,
        }
    }

    /// Parse `text` into the field's declared type and store it.
    /// Supported targets: String, Int32, Int64, Float, Double.
    pub fn parse_and_set<F: FieldSelector + ?Sized>(
        &mut self,
        field: &F,
        text: &str,
    ) -> Result<(), RecordError> {
        let field = field.select(schema_of(&self.catalog, self.object))?;
        let parse_error = || {
            tracing::warn!("could not parse '{text}' as {}", field.base_type);
            RecordError::Parse {
                text: text.to_string(),
                target: field.base_type,
            }
        };
        let trimmed = text.trim();
        let value = match field.base_type {
            BaseType::String => Variant::from(text),
            BaseType::Int32 => Variant::Int32(trimmed.parse().map_err(|_| parse_error())?),
            BaseType::Int64 => Variant::Int64(trimmed.parse().map_err(|_| parse_error())?),
            BaseType::Float => {
                Variant::Float(trimmed.parse::<f64>().map_err(|_| parse_error())? as f32)
            }
            BaseType::Double => Variant::Double(trimmed.parse().map_err(|_| parse_error())?),
            other => {
                tracing::warn!("unhandled field type {other} for {}", field.name);
                return Err(RecordError::UnsupportedType {
                    field: field.name.clone(),
                    base_type: other,
                });
            }
        };
        self.values.insert(field.offset, value);
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════
    // Nested tables and repeated fields
    // ════════════════════════════════════════════════════════════════════════

    /// Child record for an Object field, created on first call. Later calls
    /// return the same instance so mutations accumulate.
    pub fn mutable_child<F: FieldSelector + ?Sized>(
        &mut self,
        field: &F,
    ) -> Result<&mut DynamicRecord, RecordError> {
        let field = field.select(schema_of(&self.catalog, self.object))?;
        if field.base_type != BaseType::Object {
            tracing::warn!("field {} is not of type Object", field.name);
            return Err(RecordError::TypeMismatch {
                field: field.name.clone(),
                expected: BaseType::Object,
                actual: field.base_type,
            });
        }
        let nested = field
            .object_index()
            .ok_or_else(|| RecordError::UnknownObject(field.object.clone().unwrap_or_default()))?;
        let catalog = &self.catalog;
        Ok(self.children.entry(field.offset).or_insert_with(|| {
            tracing::debug!("creating child {} for {}", field.name, schema_of(catalog, nested).name);
            DynamicRecord::bound(Arc::clone(catalog), nested)
        }))
    }

    /// Existing child record, without creating one.
    pub fn child<F: FieldSelector + ?Sized>(&self, field: &F) -> Option<&DynamicRecord> {
        let field = field.select(self.schema()).ok()?;
        self.children.get(&field.offset)
    }

    /// Repeated container for a Vector field, created on first call.
    pub fn repeated<F: FieldSelector + ?Sized>(
        &mut self,
        field: &F,
    ) -> Result<&mut RepeatedField, RecordError> {
        let field = field.select(schema_of(&self.catalog, self.object))?;
        if field.base_type != BaseType::Vector {
            tracing::warn!("field {} is not of type Vector", field.name);
            return Err(RecordError::TypeMismatch {
                field: field.name.clone(),
                expected: BaseType::Vector,
                actual: field.base_type,
            });
        }
        match self.repeated.entry(field.offset) {
            std::collections::btree_map::Entry::Occupied(entry) => Ok(entry.into_mut()),
            std::collections::btree_map::Entry::Vacant(entry) => {
                let container = RepeatedField::for_field(&self.catalog, field)?;
                tracing::debug!("creating repeated field {}", field.name);
                Ok(entry.insert(container))
            }
        }
    }

    /// Existing repeated container, without creating one.
    pub fn repeated_ref<F: FieldSelector + ?Sized>(&self, field: &F) -> Option<&RepeatedField> {
        let field = field.select(self.schema()).ok()?;
        self.repeated.get(&field.offset)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Field paths
    // ════════════════════════════════════════════════════════════════════════

    /// Walk `path`, creating intermediate children, and return the record
    /// owning the final field together with that field's definition.
    pub fn field_with_parent(
        &mut self,
        path: &FieldPath,
    ) -> Result<(&mut DynamicRecord, SchemaField), RecordError> {
        let (last, init) = path.steps().split_last().ok_or(RecordError::EmptyPath)?;
        let mut parent: &mut DynamicRecord = self;
        for (i, step) in init.iter().enumerate() {
            let field = step.lookup(parent.schema()).ok_or_else(|| RecordError::UnresolvedStep {
                step: i,
                reason: format!("{} has no field {step}", parent.schema().name),
            })?;
            if field.base_type != BaseType::Object {
                return Err(RecordError::NotAnObject {
                    step: i,
                    field: field.name.clone(),
                });
            }
            parent = parent.mutable_child(step)?;
        }
        let field = last
            .lookup(parent.schema())
            .cloned()
            .ok_or_else(|| RecordError::UnresolvedStep {
                step: init.len(),
                reason: format!("{} has no field {last}", parent.schema().name),
            })?;
        Ok((parent, field))
    }

    /// `set` on the field addressed by `path`.
    pub fn set_path<V: Into<Variant>>(&mut self, path: &FieldPath, value: V) -> Result<(), RecordError> {
        let (parent, field) = self.field_with_parent(path)?;
        parent.set(&field, value)
    }

    /// `parse_and_set` on the field addressed by `path`.
    pub fn parse_and_set_path(&mut self, path: &FieldPath, text: &str) -> Result<(), RecordError> {
        let (parent, field) = self.field_with_parent(path)?;
        parent.parse_and_set(&field, text)
    }
}

impl PartialEq for DynamicRecord {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
            && self.values == other.values
            && self.children == other.children
            && self.repeated == other.repeated
    }
}

impl std::fmt::Debug for DynamicRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicRecord")
            .field("object", &self.schema().name)
            .field("values", &self.values)
            .field("children", &self.children)
            .field("repeated", &self.repeated)
            .finish()
    }
}
