use crate::value::Value;

///
/// ValueTag
///
/// Wire type code of a value, as written in front of every element of an
/// encoded document.
///
/// IMPORTANT:
/// Codes are part of the persisted term format and must never change.
///
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValueTag {
    Double = 0x01,
    Text = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    Undefined = 0x06,
    ObjectId = 0x07,
    Bool = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    Regex = 0x0B,
    DbPointer = 0x0C,
    Code = 0x0D,
    Symbol = 0x0E,
    CodeWithScope = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    Decimal128 = 0x13,
    MaxKey = 0x7F,
    MinKey = 0xFF,
}

impl ValueTag {
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        let tag = match byte {
            0x01 => Self::Double,
            0x02 => Self::Text,
            0x03 => Self::Document,
            0x04 => Self::Array,
            0x05 => Self::Binary,
            0x06 => Self::Undefined,
            0x07 => Self::ObjectId,
            0x08 => Self::Bool,
            0x09 => Self::DateTime,
            0x0A => Self::Null,
            0x0B => Self::Regex,
            0x0C => Self::DbPointer,
            0x0D => Self::Code,
            0x0E => Self::Symbol,
            0x0F => Self::CodeWithScope,
            0x10 => Self::Int32,
            0x11 => Self::Timestamp,
            0x12 => Self::Int64,
            0x13 => Self::Decimal128,
            0x7F => Self::MaxKey,
            0xFF => Self::MinKey,
            _ => return None,
        };

        Some(tag)
    }

    /// Numeric code used by `$type` predicates (MinKey is -1).
    #[must_use]
    pub const fn type_code(self) -> i64 {
        match self {
            Self::MinKey => -1,
            other => other.to_u8() as i64,
        }
    }

    /// Resolve a `$type` numeric code.
    #[must_use]
    pub const fn from_type_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Self::MinKey),
            0..=0x7F => Self::from_u8(code as u8),
            _ => None,
        }
    }

    /// Stable type name, as accepted by `$type` and used in diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Text => "string",
            Self::Document => "object",
            Self::Array => "array",
            Self::Binary => "binData",
            Self::Undefined => "undefined",
            Self::ObjectId => "objectId",
            Self::Bool => "bool",
            Self::DateTime => "date",
            Self::Null => "null",
            Self::Regex => "regex",
            Self::DbPointer => "dbPointer",
            Self::Code => "javascript",
            Self::Symbol => "symbol",
            Self::CodeWithScope => "javascriptWithScope",
            Self::Int32 => "int",
            Self::Timestamp => "timestamp",
            Self::Int64 => "long",
            Self::Decimal128 => "decimal",
            Self::MaxKey => "maxKey",
            Self::MinKey => "minKey",
        }
    }

    /// Resolve a `$type` name. `"number"` maps to double, which shares the
    /// numeric sort bracket with every other number type.
    #[must_use]
    pub fn from_label(name: &str) -> Option<Self> {
        const ALL: [ValueTag; 21] = [
            ValueTag::Double,
            ValueTag::Text,
            ValueTag::Document,
            ValueTag::Array,
            ValueTag::Binary,
            ValueTag::Undefined,
            ValueTag::ObjectId,
            ValueTag::Bool,
            ValueTag::DateTime,
            ValueTag::Null,
            ValueTag::Regex,
            ValueTag::DbPointer,
            ValueTag::Code,
            ValueTag::Symbol,
            ValueTag::CodeWithScope,
            ValueTag::Int32,
            ValueTag::Timestamp,
            ValueTag::Int64,
            ValueTag::Decimal128,
            ValueTag::MaxKey,
            ValueTag::MinKey,
        ];

        if name == "number" {
            return Some(Self::Double);
        }

        ALL.into_iter().find(|tag| tag.label() == name)
    }

    #[must_use]
    pub const fn is_number(self) -> bool {
        matches!(
            self,
            Self::Int32 | Self::Int64 | Self::Double | Self::Decimal128
        )
    }
}

/// Wire tag of a value.
#[must_use]
pub const fn value_tag(value: &Value) -> ValueTag {
    match value {
        Value::MinKey => ValueTag::MinKey,
        Value::Undefined => ValueTag::Undefined,
        Value::Null => ValueTag::Null,
        Value::Int32(_) => ValueTag::Int32,
        Value::Int64(_) => ValueTag::Int64,
        Value::Double(_) => ValueTag::Double,
        Value::Decimal128(_) => ValueTag::Decimal128,
        Value::Text(_) => ValueTag::Text,
        Value::Symbol(_) => ValueTag::Symbol,
        Value::Document(_) => ValueTag::Document,
        Value::Array(_) => ValueTag::Array,
        Value::Binary { .. } => ValueTag::Binary,
        Value::ObjectId(_) => ValueTag::ObjectId,
        Value::Bool(_) => ValueTag::Bool,
        Value::DateTime(_) => ValueTag::DateTime,
        Value::Timestamp { .. } => ValueTag::Timestamp,
        Value::Regex { .. } => ValueTag::Regex,
        Value::DbPointer { .. } => ValueTag::DbPointer,
        Value::Code(_) => ValueTag::Code,
        Value::CodeWithScope { .. } => ValueTag::CodeWithScope,
        Value::MaxKey => ValueTag::MaxKey,
    }
}
