use crate::schema::{BaseType, SchemaField};
use serde::ser::{Serialize, Serializer};
use smol_str::SmolStr;

// ─── Variant ────────────────────────────────────────────────────────────────

/// A single scalar or string field value.
///
/// Closed over exactly the base types a record can store inline or as a
/// string blob; `Object` and `Vector` fields live in their own containers.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(SmolStr),
}

impl Variant {
    pub fn base_type(&self) -> BaseType {
        match self {
            Variant::Bool(_) => BaseType::Bool,
            Variant::Int8(_) => BaseType::Int8,
            Variant::UInt8(_) => BaseType::UInt8,
            Variant::Int32(_) => BaseType::Int32,
            Variant::UInt32(_) => BaseType::UInt32,
            Variant::Int64(_) => BaseType::Int64,
            Variant::UInt64(_) => BaseType::UInt64,
            Variant::Float(_) => BaseType::Float,
            Variant::Double(_) => BaseType::Double,
            Variant::String(_) => BaseType::String,
        }
    }

    /// Zero value of `base_type`, or `None` for types a Variant cannot hold.
    pub fn zero(base_type: BaseType) -> Option<Variant> {
        Some(match base_type {
            BaseType::Bool => Variant::Bool(false),
            BaseType::Int8 => Variant::Int8(0),
            BaseType::UInt8 => Variant::UInt8(0),
            BaseType::Int32 => Variant::Int32(0),
            BaseType::UInt32 => Variant::UInt32(0),
            BaseType::Int64 => Variant::Int64(0),
            BaseType::UInt64 => Variant::UInt64(0),
            BaseType::Float => Variant::Float(0.0),
            BaseType::Double => Variant::Double(0.0),
            BaseType::String => Variant::String(SmolStr::default()),
            BaseType::Int16
            | BaseType::UInt16
            | BaseType::Object
            | BaseType::Vector
            | BaseType::Union => return None,
        })
    }

    /// Declared default of a scalar or string field; what a decoder sees
    /// when the field is absent from a table.
    pub fn default_for(field: &SchemaField) -> Option<Variant> {
        let int = field.default_integer;
        let real = field.default_real;
        Some(match field.base_type {
            BaseType::Bool => Variant::Bool(int != 0),
            BaseType::Int8 => Variant::Int8(int as i8),
            BaseType::UInt8 => Variant::UInt8(int as u8),
            BaseType::Int32 => Variant::Int32(int as i32),
            BaseType::UInt32 => Variant::UInt32(int as u32),
            BaseType::Int64 => Variant::Int64(int),
            BaseType::UInt64 => Variant::UInt64(int as u64),
            BaseType::Float => Variant::Float(real as f32),
            BaseType::Double => Variant::Double(real),
            other => return Variant::zero(other),
        })
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Variant::String(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integer variant widened to i64, if it fits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Variant::Int8(v) => Some(v as i64),
            Variant::UInt8(v) => Some(v as i64),
            Variant::Int32(v) => Some(v as i64),
            Variant::UInt32(v) => Some(v as i64),
            Variant::Int64(v) => Some(v),
            Variant::UInt64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Variant::UInt64(v) => Some(v),
            _ => self.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }

    /// Any numeric variant as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Variant::Float(v) => Some(v as f64),
            Variant::Double(v) => Some(v),
            Variant::UInt64(v) => Some(v as f64),
            _ => self.as_i64().map(|v| v as f64),
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Bool(v) => write!(f, "{v}"),
            Variant::Int8(v) => write!(f, "{v}"),
            Variant::UInt8(v) => write!(f, "{v}"),
            Variant::Int32(v) => write!(f, "{v}"),
            Variant::UInt32(v) => write!(f, "{v}"),
            Variant::Int64(v) => write!(f, "{v}"),
            Variant::UInt64(v) => write!(f, "{v}"),
            Variant::Float(v) => write!(f, "{v}"),
            Variant::Double(v) => write!(f, "{v}"),
            Variant::String(v) => f.write_str(v),
        }
    }
}

// ─── Serialize ──────────────────────────────────────────────────────────────

impl Serialize for Variant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Variant::Bool(v) => serializer.serialize_bool(*v),
            Variant::Int8(v) => serializer.serialize_i8(*v),
            Variant::UInt8(v) => serializer.serialize_u8(*v),
            Variant::Int32(v) => serializer.serialize_i32(*v),
            Variant::UInt32(v) => serializer.serialize_u32(*v),
            Variant::Int64(v) => serializer.serialize_i64(*v),
            Variant::UInt64(v) => serializer.serialize_u64(*v),
            Variant::Float(v) => serializer.serialize_f32(*v),
            Variant::Double(v) => serializer.serialize_f64(*v),
            Variant::String(v) => serializer.serialize_str(v.as_str()),
        }
    }
}

// ─── From impls ─────────────────────────────────────────────────────────────

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Variant {
                #[inline]
                fn from(v: $ty) -> Self {
                    Variant::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    i8 => Int8,
    u8 => UInt8,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    SmolStr => String,
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::String(SmolStr::from(s))
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Variant::String(SmolStr::from(s))
    }
}

impl From<Variant> for serde_json::Value {
    fn from(v: Variant) -> Self {
        match v {
            Variant::Bool(b) => serde_json::Value::Bool(b),
            Variant::Int8(i) => serde_json::json!(i),
            Variant::UInt8(u) => serde_json::json!(u),
            Variant::Int32(i) => serde_json::json!(i),
            Variant::UInt32(u) => serde_json::json!(u),
            Variant::Int64(i) => serde_json::json!(i),
            Variant::UInt64(u) => serde_json::json!(u),
            Variant::Float(f) => serde_json::json!(f),
            Variant::Double(f) => serde_json::json!(f),
            Variant::String(s) => serde_json::Value::String(s.to_string()),
        }
    }
}
