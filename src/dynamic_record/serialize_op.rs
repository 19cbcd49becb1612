use super::record::DynamicRecord;
use super::repeated::{ElementType, RepeatedField};
use crate::error::RecordError;
use crate::schema::SchemaField;
use crate::types::FILE_IDENTIFIER_LEN;
use crate::variant::Variant;
use flatbuffers::{FlatBufferBuilder, TableFinishedWIPOffset, UnionWIPOffset, WIPOffset};
use serde::{Deserialize, Serialize};

type TableOffset = WIPOffset<TableFinishedWIPOffset>;

// ─── SerializeOptions ───────────────────────────────────────────────────────

/// Knobs for [`DynamicRecord::serialize_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializeOptions {
    /// Exactly four bytes, written after the root offset.
    pub file_identifier: Option<String>,
    /// Write scalars even when they equal the declared default, so a
    /// decoder sees them as present.
    pub force_defaults: bool,
}

impl SerializeOptions {
    pub fn validate(&self) -> Result<(), RecordError> {
        match &self.file_identifier {
            Some(id) if id.len() != FILE_IDENTIFIER_LEN => {
                tracing::warn!("file identifier {id:?} is not {FILE_IDENTIFIER_LEN} bytes");
                Err(RecordError::InvalidOption(format!(
                    "file identifier must be {FILE_IDENTIFIER_LEN} bytes, got {}",
                    id.len()
                )))
            }
            _ => Ok(()),
        }
    }
}

// ─── Serialization ──────────────────────────────────────────────────────────

enum Task<'r> {
    /// Schedule the record's nested tables, then its own build.
    Visit(&'r DynamicRecord),
    /// All nested tables are finished; write this one.
    Build(&'r DynamicRecord),
}

impl DynamicRecord {
    /// Serialize this record tree as a finished buffer rooted at this record.
    pub fn serialize(&self) -> Vec<u8> {
        self.finish(None, false)
    }

    pub fn serialize_with(&self, options: &SerializeOptions) -> Result<Vec<u8>, RecordError> {
        options.validate()?;
        Ok(self.finish(options.file_identifier.as_deref(), options.force_defaults))
    }

    fn finish(&self, file_identifier: Option<&str>, force_defaults: bool) -> Vec<u8> {
        let mut fbb = FlatBufferBuilder::with_capacity(1024);
        fbb.force_defaults(force_defaults);
        let root = self.serialize_into(&mut fbb);
        fbb.finish(root, file_identifier);
        let data = fbb.finished_data().to_vec();
        tracing::debug!("serialized {} into {} bytes", self.schema().name, data.len());
        data
    }

    /// Write the tree into an open builder and return the root table's
    /// offset, leaving `finish` to the caller.
    ///
    /// Post-order over an explicit stack: every child and every element
    /// of an object vector is finished before the table referencing it
    /// is started, whatever the nesting depth.
    pub fn serialize_into<'fbb>(&self, fbb: &mut FlatBufferBuilder<'fbb>) -> TableOffset {
        let mut tasks: Vec<Task<'_>> = self.nested_records().map(Task::Visit).collect();
        tasks.reverse();
        let mut finished: Vec<TableOffset> = Vec::new();

        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit(record) => {
                    tasks.push(Task::Build(record));
                    let first = tasks.len();
                    tasks.extend(record.nested_records().map(Task::Visit));
                    tasks[first..].reverse();
                }
                Task::Build(record) => {
                    // Nested tables of `record` sit on top of `finished`, in order.
                    let count = record.nested_records().count();
                    let nested = finished.split_off(finished.len() - count);
                    let table = record.build_table(fbb, &nested);
                    finished.push(table);
                }
            }
        }

        self.build_table(fbb, &finished)
    }

    /// Records whose tables this record references: children in slot
    /// order, then elements of object vectors in slot and element order.
    fn nested_records(&self) -> impl Iterator<Item = &DynamicRecord> {
        self.children
            .values()
            .chain(self.repeated.values().flat_map(|r| r.records().iter()))
    }

    fn build_table(&self, fbb: &mut FlatBufferBuilder<'_>, nested: &[TableOffset]) -> TableOffset {
        let schema = self.schema();
        let mut nested = nested.iter().copied();
        let mut offsets: Vec<(u16, WIPOffset<UnionWIPOffset>)> =
            Vec::with_capacity(self.children.len() + self.repeated.len());

        for (&slot, _) in &self.children {
            if let Some(table) = nested.next() {
                offsets.push((slot, table.as_union_value()));
            }
        }
        for (&slot, repeated) in &self.repeated {
            offsets.push((slot, write_vector(fbb, repeated, &mut nested)));
        }
        for (&slot, value) in &self.values {
            if let Variant::String(s) = value {
                offsets.push((slot, fbb.create_string(s).as_union_value()));
            }
        }

        let start = fbb.start_table();
        for field in schema.fields() {
            if let Some(value) = self.values.get(&field.offset) {
                push_scalar(fbb, field, value);
            }
        }
        for (slot, offset) in offsets {
            fbb.push_slot_always(slot, offset);
        }
        fbb.end_table(start)
    }
}

/// Scalars are compared against the field's declared default; equal values
/// are elided unless the builder forces defaults.
fn push_scalar(fbb: &mut FlatBufferBuilder<'_>, field: &SchemaField, value: &Variant) {
    let slot = field.offset;
    let int = field.default_integer;
    let real = field.default_real;
    match *value {
        Variant::Bool(v) => fbb.push_slot(slot, v, int != 0),
        Variant::Int8(v) => fbb.push_slot(slot, v, int as i8),
        Variant::UInt8(v) => fbb.push_slot(slot, v, int as u8),
        Variant::Int32(v) => fbb.push_slot(slot, v, int as i32),
        Variant::UInt32(v) => fbb.push_slot(slot, v, int as u32),
        Variant::Int64(v) => fbb.push_slot(slot, v, int),
        Variant::UInt64(v) => fbb.push_slot(slot, v, int as u64),
        Variant::Float(v) => fbb.push_slot(slot, v, real as f32),
        Variant::Double(v) => fbb.push_slot(slot, v, real),
        Variant::String(_) => {}
    }
}

macro_rules! scalar_vector {
    ($fbb:expr, $values:expr, $variant:ident, $ty:ty) => {{
        let items: Vec<$ty> = $values
            .iter()
            .filter_map(|v| match v {
                Variant::$variant(x) => Some(*x),
                _ => None,
            })
            .collect();
        $fbb.create_vector(&items).as_union_value()
    }};
}

fn write_vector<'fbb>(
    fbb: &mut FlatBufferBuilder<'fbb>,
    repeated: &RepeatedField,
    nested: &mut impl Iterator<Item = TableOffset>,
) -> WIPOffset<UnionWIPOffset> {
    let values = repeated.values();
    match repeated.element() {
        ElementType::Bool => scalar_vector!(fbb, values, Bool, bool),
        ElementType::Int8 => scalar_vector!(fbb, values, Int8, i8),
        ElementType::UInt8 => scalar_vector!(fbb, values, UInt8, u8),
        ElementType::Int32 => scalar_vector!(fbb, values, Int32, i32),
        ElementType::UInt32 => scalar_vector!(fbb, values, UInt32, u32),
        ElementType::Int64 => scalar_vector!(fbb, values, Int64, i64),
        ElementType::UInt64 => scalar_vector!(fbb, values, UInt64, u64),
        ElementType::Float => scalar_vector!(fbb, values, Float, f32),
        ElementType::Double => scalar_vector!(fbb, values, Double, f64),
        ElementType::String => {
            let items: Vec<_> = values
                .iter()
                .filter_map(Variant::as_str)
                .map(|s| fbb.create_string(s))
                .collect();
            fbb.create_vector(&items).as_union_value()
        }
        ElementType::Object => {
            let items: Vec<TableOffset> = nested.take(repeated.len()).collect();
            fbb.create_vector(&items).as_union_value()
        }
    }
}
