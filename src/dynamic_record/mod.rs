mod merge_op;
pub mod record;
pub mod repeated;
mod serialize_op;
mod view_op;

pub use record::{DynamicRecord, FieldMap, FieldSelector, RecordFactory};
pub use repeated::{ElementType, RepeatedField, RepeatedSlot, ValueSlot};
pub use serialize_op::SerializeOptions;
