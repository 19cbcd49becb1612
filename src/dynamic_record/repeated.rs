use super::record::DynamicRecord;
use crate::error::RecordError;
use crate::schema::{BaseType, SchemaCatalog, SchemaField};
use crate::variant::Variant;
use smol_str::SmolStr;
use std::sync::Arc;

// ─── ElementType ────────────────────────────────────────────────────────────

/// Element types a repeated field can hold. Narrower than [`BaseType`]:
/// no shorts, unions or nested vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Bool,
    Int8,
    UInt8,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    String,
    Object,
}

impl TryFrom<BaseType> for ElementType {
    type Error = BaseType;

    fn try_from(base_type: BaseType) -> Result<Self, Self::Error> {
        Ok(match base_type {
            BaseType::Bool => ElementType::Bool,
            BaseType::Int8 => ElementType::Int8,
            BaseType::UInt8 => ElementType::UInt8,
            BaseType::Int32 => ElementType::Int32,
            BaseType::UInt32 => ElementType::UInt32,
            BaseType::Int64 => ElementType::Int64,
            BaseType::UInt64 => ElementType::UInt64,
            BaseType::Float => ElementType::Float,
            BaseType::Double => ElementType::Double,
            BaseType::String => ElementType::String,
            BaseType::Object => ElementType::Object,
            other => return Err(other),
        })
    }
}

impl From<ElementType> for BaseType {
    fn from(element: ElementType) -> Self {
        match element {
            ElementType::Bool => BaseType::Bool,
            ElementType::Int8 => BaseType::Int8,
            ElementType::UInt8 => BaseType::UInt8,
            ElementType::Int32 => BaseType::Int32,
            ElementType::UInt32 => BaseType::UInt32,
            ElementType::Int64 => BaseType::Int64,
            ElementType::UInt64 => BaseType::UInt64,
            ElementType::Float => BaseType::Float,
            ElementType::Double => BaseType::Double,
            ElementType::String => BaseType::String,
            ElementType::Object => BaseType::Object,
        }
    }
}

// ─── RepeatedField ──────────────────────────────────────────────────────────

/// Homogeneous, ordered contents of one Vector field.
#[derive(Clone)]
pub struct RepeatedField {
    field: SmolStr,
    element: ElementType,
    items: RepeatedItems,
}

#[derive(Clone)]
enum RepeatedItems {
    Values {
        zero: Variant,
        values: Vec<Variant>,
    },
    Records {
        catalog: Arc<SchemaCatalog>,
        object: usize,
        records: Vec<DynamicRecord>,
    },
}

/// Handle returned by [`RepeatedField::add`].
pub enum RepeatedSlot<'a> {
    Value(ValueSlot<'a>),
    Record(&'a mut DynamicRecord),
}

impl<'a> RepeatedSlot<'a> {
    pub fn into_record(self) -> Option<&'a mut DynamicRecord> {
        match self {
            RepeatedSlot::Record(record) => Some(record),
            RepeatedSlot::Value(_) => None,
        }
    }

    pub fn into_value(self) -> Option<ValueSlot<'a>> {
        match self {
            RepeatedSlot::Value(slot) => Some(slot),
            RepeatedSlot::Record(_) => None,
        }
    }
}

/// A freshly appended primitive or string element. Writes are type-checked
/// so the container stays homogeneous.
pub struct ValueSlot<'a> {
    field: &'a str,
    value: &'a mut Variant,
}

impl ValueSlot<'_> {
    #[inline]
    pub fn get(&self) -> &Variant {
        self.value
    }

    pub fn set<V: Into<Variant>>(&mut self, value: V) -> Result<(), RecordError> {
        let value = value.into();
        if value.base_type() != self.value.base_type() {
            return Err(RecordError::TypeMismatch {
                field: SmolStr::new(self.field),
                expected: self.value.base_type(),
                actual: value.base_type(),
            });
        }
        *self.value = value;
        Ok(())
    }
}

impl RepeatedField {
    /// Container for a Vector field. Fails for element types outside
    /// primitives, String and Object.
    pub(crate) fn for_field(catalog: &Arc<SchemaCatalog>, field: &SchemaField) -> Result<Self, RecordError> {
        let unsupported = |base_type: BaseType| {
            tracing::warn!("repeated field {} has unsupported type {base_type}", field.name);
            RecordError::UnsupportedType {
                field: field.name.clone(),
                base_type,
            }
        };
        let declared = field.element.ok_or_else(|| unsupported(BaseType::Vector))?;
        let element = ElementType::try_from(declared).map_err(unsupported)?;

        let items = match Variant::zero(declared) {
            Some(zero) => RepeatedItems::Values {
                zero,
                values: Vec::new(),
            },
            None => RepeatedItems::Records {
                catalog: Arc::clone(catalog),
                object: field
                    .object_index()
                    .ok_or_else(|| RecordError::UnknownObject(field.object.clone().unwrap_or_default()))?,
                records: Vec::new(),
            },
        };
        Ok(Self {
            field: field.name.clone(),
            element,
            items,
        })
    }

    #[inline]
    pub fn element(&self) -> ElementType {
        self.element
    }

    #[inline]
    pub fn element_type(&self) -> BaseType {
        self.element.into()
    }

    pub fn len(&self) -> usize {
        match &self.items {
            RepeatedItems::Values { values, .. } => values.len(),
            RepeatedItems::Records { records, .. } => records.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a default element: a new child record bound to the nested
    /// object, or the element type's zero value.
    pub fn add(&mut self) -> RepeatedSlot<'_> {
        match &mut self.items {
            RepeatedItems::Values { zero, values } => {
                values.push(zero.clone());
                let i = values.len() - 1;
                RepeatedSlot::Value(ValueSlot {
                    field: &self.field,
                    value: &mut values[i],
                })
            }
            RepeatedItems::Records {
                catalog,
                object,
                records,
            } => RepeatedSlot::Record(append_record(catalog, *object, records)),
        }
    }

    /// Append a new child record. Only for Object elements.
    pub fn add_record(&mut self) -> Result<&mut DynamicRecord, RecordError> {
        let mismatch = self.mismatch(BaseType::Object);
        match &mut self.items {
            RepeatedItems::Records {
                catalog,
                object,
                records,
            } => Ok(append_record(catalog, *object, records)),
            RepeatedItems::Values { .. } => Err(mismatch),
        }
    }

    /// Append a primitive or string value of the element type.
    pub fn push<V: Into<Variant>>(&mut self, value: V) -> Result<(), RecordError> {
        let value = value.into();
        let actual = value.base_type();
        if let RepeatedItems::Values { zero, values } = &mut self.items {
            if zero.base_type() == actual {
                values.push(value);
                return Ok(());
            }
        }
        Err(self.mismatch(actual))
    }

    /// Drop trailing elements so that `len` remain.
    pub(crate) fn truncate(&mut self, len: usize) {
        match &mut self.items {
            RepeatedItems::Values { values, .. } => values.truncate(len),
            RepeatedItems::Records { records, .. } => records.truncate(len),
        }
    }

    pub fn get(&self, i: usize) -> Option<&Variant> {
        self.values().get(i)
    }

    pub fn record(&self, i: usize) -> Option<&DynamicRecord> {
        self.records().get(i)
    }

    pub fn record_mut(&mut self, i: usize) -> Option<&mut DynamicRecord> {
        match &mut self.items {
            RepeatedItems::Records { records, .. } => records.get_mut(i),
            RepeatedItems::Values { .. } => None,
        }
    }

    /// Primitive or string elements; empty for Object elements.
    pub fn values(&self) -> &[Variant] {
        match &self.items {
            RepeatedItems::Values { values, .. } => values,
            RepeatedItems::Records { .. } => &[],
        }
    }

    /// Record elements; empty for primitive or string elements.
    pub fn records(&self) -> &[DynamicRecord] {
        match &self.items {
            RepeatedItems::Records { records, .. } => records,
            RepeatedItems::Values { .. } => &[],
        }
    }

    fn mismatch(&self, actual: BaseType) -> RecordError {
        RecordError::TypeMismatch {
            field: self.field.clone(),
            expected: self.element.into(),
            actual,
        }
    }
}

fn append_record<'r>(
    catalog: &Arc<SchemaCatalog>,
    object: usize,
    records: &'r mut Vec<DynamicRecord>,
) -> &'r mut DynamicRecord {
    records.push(DynamicRecord::bound(Arc::clone(catalog), object));
    let i = records.len() - 1;
    &mut records[i]
}

impl PartialEq for RepeatedField {
    fn eq(&self, other: &Self) -> bool {
        self.element == other.element && self.values() == other.values() && self.records() == other.records()
    }
}

impl std::fmt::Debug for RepeatedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.items {
            RepeatedItems::Values { values, .. } => f.debug_list().entries(values).finish(),
            RepeatedItems::Records { records, .. } => f.debug_list().entries(records).finish(),
        }
    }
}
