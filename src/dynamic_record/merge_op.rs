use super::record::{DynamicRecord, schema_of};
use super::repeated::{ElementType, RepeatedField};
use crate::error::RecordError;
use crate::schema::{BaseType, SchemaField, SchemaObject};
use crate::table::{LeScalar, TableView, VectorView};
use crate::types::SIZE_UOFFSET;
use crate::variant::Variant;
use std::sync::Arc;

// ─── Work stack ─────────────────────────────────────────────────────────────

/// How a frame's record hangs off the record of the frame below it.
#[derive(Debug, Clone, Copy)]
enum Hop {
    /// Memoized child of an Object field.
    Child(u16),
    /// Element `index` of an object vector, appended for this frame.
    Element(u16, usize),
}

/// One table being applied. Its target record is reached from the merge
/// root by following the hops of every frame up to and including this one.
#[derive(Clone, Copy)]
struct Frame<'a> {
    hop: Option<Hop>,
    table: TableView<'a>,
    /// Next schema field to apply.
    field: usize,
    /// Next element of the object vector at `field`.
    element: usize,
}

impl<'a> Frame<'a> {
    fn new(hop: Option<Hop>, table: TableView<'a>) -> Self {
        Self {
            hop,
            table,
            field: 0,
            element: 0,
        }
    }
}

enum Step<'a> {
    /// Every present field of the table is applied.
    Done,
    /// Apply `nested` first, then continue with `resume`.
    Descend { resume: Frame<'a>, nested: Frame<'a> },
}

// ─── Merge ──────────────────────────────────────────────────────────────────

impl DynamicRecord {
    /// Decode a finished buffer and apply it on top of this record.
    ///
    /// Scalars and strings the buffer marks present overwrite, nested
    /// tables merge into the memoized child, vectors append. Not atomic:
    /// fields applied before a failure stay applied.
    pub fn merge_from(&mut self, buf: &[u8]) -> Result<(), RecordError> {
        let table = TableView::root(buf)?;
        self.merge_from_table(table)
    }

    /// Apply an already located table.
    ///
    /// Nested tables are walked with an explicit stack in field order, so
    /// nesting depth is bounded by memory only. An object-vector element
    /// whose table fails is removed again; elements before it stay.
    pub fn merge_from_table(&mut self, table: TableView<'_>) -> Result<(), RecordError> {
        check_declared(self.schema(), table)?;
        let mut frames = vec![Frame::new(None, table)];
        let result = self.drain_frames(&mut frames);
        if result.is_err() {
            self.discard_unfinished(&frames);
        }
        result
    }

    fn drain_frames(&mut self, frames: &mut Vec<Frame<'_>>) -> Result<(), RecordError> {
        while let Some(&frame) = frames.last() {
            let step = self.descend(frames)?.merge_step(frame)?;
            match step {
                Step::Done => {
                    frames.pop();
                }
                Step::Descend { resume, nested } => {
                    if let Some(top) = frames.last_mut() {
                        *top = resume;
                    }
                    frames.push(nested);
                }
            }
        }
        Ok(())
    }

    /// The record targeted by the top of `frames`.
    fn descend(&mut self, frames: &[Frame<'_>]) -> Result<&mut DynamicRecord, RecordError> {
        let mut record = self;
        for hop in frames.iter().filter_map(|f| f.hop) {
            record = match hop {
                Hop::Child(offset) => record.children.get_mut(&offset),
                Hop::Element(offset, index) => record
                    .repeated
                    .get_mut(&offset)
                    .and_then(|r| r.record_mut(index)),
            }
            .ok_or(RecordError::InvalidBuffer("merge target missing"))?;
        }
        Ok(record)
    }

    /// Remove object-vector elements whose tables did not finish, innermost
    /// first. Each is the last element of its container.
    fn discard_unfinished(&mut self, frames: &[Frame<'_>]) {
        for depth in (1..frames.len()).rev() {
            let Some(Hop::Element(offset, index)) = frames[depth].hop else {
                continue;
            };
            let container = self
                .descend(&frames[..depth])
                .ok()
                .and_then(|parent| parent.repeated.get_mut(&offset));
            if let Some(container) = container {
                tracing::debug!("dropping unfinished element {index} at offset {offset}");
                container.truncate(index);
            }
        }
    }

    /// Apply fields of `frame.table` from the frame's cursor on, stopping
    /// at the first nested table.
    fn merge_step<'a>(&mut self, frame: Frame<'a>) -> Result<Step<'a>, RecordError> {
        let catalog = Arc::clone(&self.catalog);
        let schema = schema_of(&catalog, self.object);
        let table = frame.table;

        for (i, field) in schema.fields().iter().enumerate().skip(frame.field) {
            let offset = field.offset;
            if !table.has_field(offset) {
                continue;
            }
            match field.base_type {
                BaseType::Object => {
                    let Some(nested) = table.table(offset)? else {
                        continue;
                    };
                    check_declared(self.mutable_child(field)?.schema(), nested)?;
                    return Ok(Step::Descend {
                        resume: Frame {
                            field: i + 1,
                            element: 0,
                            ..frame
                        },
                        nested: Frame::new(Some(Hop::Child(offset)), nested),
                    });
                }
                BaseType::Vector => {
                    let Some(vector) = table.vector(offset)? else {
                        continue;
                    };
                    let repeated = self.repeated(field)?;
                    if repeated.element() != ElementType::Object {
                        append_values(repeated, vector)?;
                        continue;
                    }
                    let next = if i == frame.field { frame.element } else { 0 };
                    if next == 0 {
                        vector.check_span(SIZE_UOFFSET)?;
                    }
                    if next >= vector.len() {
                        continue;
                    }
                    let element = vector.table_at(next)?;
                    let object = field
                        .object_index()
                        .ok_or_else(|| RecordError::UnknownObject(field.object.clone().unwrap_or_default()))?;
                    check_declared(schema_of(&catalog, object), element)?;
                    let index = repeated.len();
                    repeated.add_record()?;
                    return Ok(Step::Descend {
                        resume: Frame {
                            field: i,
                            element: next + 1,
                            ..frame
                        },
                        nested: Frame::new(Some(Hop::Element(offset, index)), element),
                    });
                }
                _ => self.merge_value(field, table)?,
            }
        }
        Ok(Step::Done)
    }

    fn merge_value(&mut self, field: &SchemaField, table: TableView<'_>) -> Result<(), RecordError> {
        let offset = field.offset;
        let value = match field.base_type {
            BaseType::Bool => table.scalar::<bool>(offset)?.map(Variant::Bool),
            BaseType::Int8 => table.scalar::<i8>(offset)?.map(Variant::Int8),
            BaseType::UInt8 => table.scalar::<u8>(offset)?.map(Variant::UInt8),
            BaseType::Int32 => table.scalar::<i32>(offset)?.map(Variant::Int32),
            BaseType::UInt32 => table.scalar::<u32>(offset)?.map(Variant::UInt32),
            BaseType::Int64 => table.scalar::<i64>(offset)?.map(Variant::Int64),
            BaseType::UInt64 => table.scalar::<u64>(offset)?.map(Variant::UInt64),
            BaseType::Float => table.scalar::<f32>(offset)?.map(Variant::Float),
            BaseType::Double => table.scalar::<f64>(offset)?.map(Variant::Double),
            BaseType::String => table.string(offset)?.map(Variant::from),
            other => {
                tracing::warn!("cannot merge field {} of type {other}", field.name);
                return Err(RecordError::UnsupportedType {
                    field: field.name.clone(),
                    base_type: other,
                });
            }
        };
        if let Some(value) = value {
            self.values.insert(offset, value);
        }
        Ok(())
    }
}

/// Reject the whole table before touching anything if it carries a slot
/// its object does not declare.
fn check_declared(schema: &SchemaObject, table: TableView<'_>) -> Result<(), RecordError> {
    match table
        .present_offsets()
        .find(|o| schema.field_by_offset(*o).is_none())
    {
        Some(offset) => {
            tracing::warn!("buffer has undeclared field at offset {offset} for {}", schema.name);
            Err(RecordError::UnknownOffset {
                object: schema.name.clone(),
                offset,
            })
        }
        None => Ok(()),
    }
}

/// Append every element of a primitive or string vector. The vector is
/// decoded in full before the first push. Object vectors are walked by
/// the frame loop instead.
fn append_values(repeated: &mut RepeatedField, vector: VectorView<'_>) -> Result<(), RecordError> {
    match repeated.element() {
        ElementType::Bool => append_scalars::<bool>(repeated, vector),
        ElementType::Int8 => append_scalars::<i8>(repeated, vector),
        ElementType::UInt8 => append_scalars::<u8>(repeated, vector),
        ElementType::Int32 => append_scalars::<i32>(repeated, vector),
        ElementType::UInt32 => append_scalars::<u32>(repeated, vector),
        ElementType::Int64 => append_scalars::<i64>(repeated, vector),
        ElementType::UInt64 => append_scalars::<u64>(repeated, vector),
        ElementType::Float => append_scalars::<f32>(repeated, vector),
        ElementType::Double => append_scalars::<f64>(repeated, vector),
        ElementType::String => {
            for s in vector.strings()? {
                repeated.push(s)?;
            }
            Ok(())
        }
        ElementType::Object => Ok(()),
    }
}

fn append_scalars<T>(repeated: &mut RepeatedField, vector: VectorView<'_>) -> Result<(), RecordError>
where
    T: LeScalar + Into<Variant>,
{
    for value in vector.scalars::<T>()? {
        repeated.push(value)?;
    }
    Ok(())
}
