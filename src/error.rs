// ─── Error ──────────────────────────────────────────────────────────────────
use crate::schema::BaseType;
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Unknown field: {0}")]
    UnknownField(SmolStr),
    #[error("No field at offset {offset} in {object}")]
    UnknownOffset { object: SmolStr, offset: u16 },
    #[error("Unknown object: {0}")]
    UnknownObject(SmolStr),
    #[error("No root table specified")]
    NoRootTable,
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    #[error("Type mismatch for {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: SmolStr,
        expected: BaseType,
        actual: BaseType,
    },
    #[error("Unsupported type {base_type} for field {field}")]
    UnsupportedType { field: SmolStr, base_type: BaseType },
    #[error("Could not parse '{text}' as {target}")]
    Parse { text: String, target: BaseType },
    #[error("Empty field path")]
    EmptyPath,
    #[error("Could not resolve path step {step}: {reason}")]
    UnresolvedStep { step: usize, reason: String },
    #[error("Field {field} at path step {step} is not of type Object")]
    NotAnObject { step: usize, field: SmolStr },
    #[error("Invalid buffer: {0}")]
    InvalidBuffer(&'static str),
    #[error("Invalid option: {0}")]
    InvalidOption(String),
    #[error("Schema codec error: {0}")]
    SchemaCodec(String),
}

/// Coarse classification of [`RecordError`] for callers that only care
/// about the failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    TypeMismatch,
    UnsupportedType,
    Parse,
    PathResolution,
    Decode,
    Config,
}

impl RecordError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordError::UnknownField(_)
            | RecordError::UnknownOffset { .. }
            | RecordError::UnknownObject(_)
            | RecordError::NoRootTable
            | RecordError::InvalidSchema(_)
            | RecordError::SchemaCodec(_) => ErrorKind::Schema,
            RecordError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            RecordError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            RecordError::Parse { .. } => ErrorKind::Parse,
            RecordError::EmptyPath
            | RecordError::UnresolvedStep { .. }
            | RecordError::NotAnObject { .. } => ErrorKind::PathResolution,
            RecordError::InvalidBuffer(_) => ErrorKind::Decode,
            RecordError::InvalidOption(_) => ErrorKind::Config,
        }
    }
}
