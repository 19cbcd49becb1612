use crate::error::RecordError;
use crate::schema::{BaseType, SchemaCatalog, SchemaField, SchemaObject};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::str::FromStr;

// ─── FieldStep ──────────────────────────────────────────────────────────────

/// One hop of a field path: a field name, or an already resolved slot offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStep {
    Name(SmolStr),
    Offset(u16),
}

impl FieldStep {
    /// Look the step up in `object`. Names go through the hash index,
    /// offsets through a scan of the declared fields.
    pub fn lookup<'s>(&self, object: &'s SchemaObject) -> Option<&'s SchemaField> {
        match self {
            FieldStep::Name(name) => object.field(name),
            FieldStep::Offset(offset) => object.field_by_offset(*offset),
        }
    }
}

impl std::fmt::Display for FieldStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldStep::Name(name) => f.write_str(name),
            FieldStep::Offset(offset) => write!(f, "{offset}"),
        }
    }
}

impl From<&str> for FieldStep {
    fn from(name: &str) -> Self {
        FieldStep::Name(SmolStr::new(name))
    }
}

impl From<u16> for FieldStep {
    fn from(offset: u16) -> Self {
        FieldStep::Offset(offset)
    }
}

// ─── FieldPath ──────────────────────────────────────────────────────────────

/// Chain of steps addressing a nested field without static types.
///
/// Text form joins steps with `.`; purely numeric steps are offsets
/// (`"person.address.city"`, `"4.6"`). Catalog validation keeps field
/// names out of that numeric form, so printing and parsing a path built
/// from a catalog's names gives back the same steps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath {
    steps: Vec<FieldStep>,
}

impl FieldPath {
    pub fn new(steps: Vec<FieldStep>) -> Self {
        Self { steps }
    }

    #[inline]
    pub fn steps(&self) -> &[FieldStep] {
        &self.steps
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Resolve against the catalog's root table.
    pub fn resolve(&self, catalog: &SchemaCatalog) -> Result<ResolvedFieldPath, RecordError> {
        let root = catalog.root_index().ok_or_else(|| {
            tracing::warn!("cannot resolve field path {self}: no root table");
            RecordError::NoRootTable
        })?;
        self.resolve_from(catalog, root)
    }

    /// Resolve against the object at `object_index`. Every non-final step
    /// must be an `Object` field; the final step may be of any type.
    pub fn resolve_from(
        &self,
        catalog: &SchemaCatalog,
        object_index: usize,
    ) -> Result<ResolvedFieldPath, RecordError> {
        if self.steps.is_empty() {
            return Err(RecordError::EmptyPath);
        }
        let last = self.steps.len() - 1;
        let mut current = object_index;
        let mut resolved = Vec::with_capacity(self.steps.len());

        for (i, step) in self.steps.iter().enumerate() {
            let object = catalog.object(current).ok_or_else(|| RecordError::UnresolvedStep {
                step: i,
                reason: format!("object index {current} out of range"),
            })?;
            let field = step.lookup(object).ok_or_else(|| {
                tracing::warn!("could not find field {step} in {}", object.name);
                RecordError::UnresolvedStep {
                    step: i,
                    reason: format!("{} has no field {step}", object.name),
                }
            })?;
            resolved.push(ResolvedStep {
                object: current,
                offset: field.offset,
                base_type: field.base_type,
            });

            if i < last {
                if field.base_type != BaseType::Object {
                    tracing::warn!("field {} is not of type Object", field.name);
                    return Err(RecordError::NotAnObject {
                        step: i,
                        field: field.name.clone(),
                    });
                }
                current = field.object_index().ok_or_else(|| RecordError::UnresolvedStep {
                    step: i,
                    reason: format!("field {} has no nested object", field.name),
                })?;
            }
        }

        Ok(ResolvedFieldPath {
            root: object_index,
            steps: resolved,
        })
    }
}

impl From<Vec<FieldStep>> for FieldPath {
    fn from(steps: Vec<FieldStep>) -> Self {
        Self { steps }
    }
}

impl FromStr for FieldPath {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(RecordError::EmptyPath);
        }
        let steps = s
            .split('.')
            .enumerate()
            .map(|(i, part)| {
                let part = part.trim();
                if part.is_empty() {
                    return Err(RecordError::UnresolvedStep {
                        step: i,
                        reason: "empty step".into(),
                    });
                }
                Ok(if part.bytes().all(|b| b.is_ascii_digit()) {
                    let offset = part.parse::<u16>().map_err(|_| RecordError::UnresolvedStep {
                        step: i,
                        reason: format!("offset {part} out of range"),
                    })?;
                    FieldStep::Offset(offset)
                } else {
                    FieldStep::Name(SmolStr::new(part))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

// ─── ResolvedFieldPath ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedStep {
    /// Object declaring the field.
    pub object: usize,
    pub offset: u16,
    pub base_type: BaseType,
}

/// Immutable result of resolving a [`FieldPath`]. The source path is left
/// untouched; `to_field_path` gives the offset-only rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFieldPath {
    root: usize,
    steps: Vec<ResolvedStep>,
}

impl ResolvedFieldPath {
    #[inline]
    pub fn root(&self) -> usize {
        self.root
    }

    #[inline]
    pub fn steps(&self) -> &[ResolvedStep] {
        &self.steps
    }

    pub fn offsets(&self) -> Vec<u16> {
        self.steps.iter().map(|s| s.offset).collect()
    }

    /// The final field's definition.
    pub fn leaf<'s>(&self, catalog: &'s SchemaCatalog) -> Option<&'s SchemaField> {
        let last = self.steps.last()?;
        catalog.object(last.object)?.field_by_offset(last.offset)
    }

    /// The path with every name replaced by its resolved offset.
    pub fn to_field_path(&self) -> FieldPath {
        FieldPath::new(self.steps.iter().map(|s| FieldStep::Offset(s.offset)).collect())
    }
}
