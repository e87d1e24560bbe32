mod compare;
mod decimal;
mod json;
mod rank;
mod tag;
pub mod wire;

#[cfg(test)]
mod tests;

use std::fmt;

// re-exports
pub use compare::{ValueComparison, compare_values, values_equal};
pub use decimal::{Decimal128, DecimalParts};
pub use json::JsonValueError;
pub use rank::{canonical_rank, tag_rank};
pub use tag::{ValueTag, value_tag};

/// Ordered document fields. Duplicate keys are permitted and preserved.
pub type Document = Vec<(String, Value)>;

///
/// Value
///
/// Dynamic document value. Variants mirror the wire type codes in
/// [`ValueTag`]; cross-type ordering follows [`canonical_rank`].
///

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    MinKey,
    Undefined,
    Null,
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal128(Decimal128),
    Text(String),
    Symbol(String),
    Document(Document),
    Array(Vec<Self>),
    Binary { subtype: u8, bytes: Vec<u8> },
    ObjectId([u8; 12]),
    Bool(bool),
    DateTime(i64),
    Timestamp { time: u32, increment: u32 },
    Regex { pattern: String, options: String },
    DbPointer { namespace: String, id: [u8; 12] },
    Code(String),
    CodeWithScope { code: String, scope: Document },
    MaxKey,
}

impl Value {
    #[must_use]
    pub const fn tag(&self) -> ValueTag {
        value_tag(self)
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.tag().label()
    }

    #[must_use]
    pub const fn canonical_rank(&self) -> u8 {
        canonical_rank(self)
    }

    #[must_use]
    pub const fn is_number(&self) -> bool {
        self.tag().is_number()
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    #[must_use]
    pub const fn is_document(&self) -> bool {
        matches!(self, Self::Document(_))
    }

    #[must_use]
    pub fn is_nan(&self) -> bool {
        match self {
            Self::Double(v) => v.is_nan(),
            Self::Decimal128(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Build a document value from `(key, value)` pairs.
    pub fn document<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Self)>,
    {
        Self::Document(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// First field named `key` in a document value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Document(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Dotted-path lookup through nested documents and array positions.
    /// Does not expand arrays.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Self> {
        let mut current = self;
        for part in path.split('.') {
            current = match current {
                Self::Document(_) => current.get(part)?,
                Self::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Value as a double, for numeric types.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int32(v) => Some(f64::from(*v)),
            Self::Int64(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::Decimal128(v) => Some(v.to_f64()),
            _ => None,
        }
    }

    /// Exact integral value of a numeric, when representable as `i64`.
    #[must_use]
    pub fn as_i64_exact(&self) -> Option<i64> {
        match self {
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            Self::Double(v) => double_to_i64_exact(*v),
            Self::Decimal128(v) => v.to_i64_exact(),
            _ => None,
        }
    }

    /// Numeric or bool value coerced to `i64` (doubles truncate toward zero).
    #[must_use]
    pub fn as_i64_lossy(&self) -> Option<i64> {
        match self {
            Self::Bool(v) => Some(i64::from(*v)),
            Self::Double(v) if v.is_finite() => Some(*v as i64),
            Self::Decimal128(v) => v.to_i64_exact().or_else(|| {
                let d = v.to_f64();
                d.is_finite().then_some(d as i64)
            }),
            other => other.as_i64_exact(),
        }
    }

    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal128> {
        match self {
            Self::Int32(v) => Some(Decimal128::from_i64(i64::from(*v))),
            Self::Int64(v) => Some(Decimal128::from_i64(*v)),
            Self::Double(v) => Some(Decimal128::from_f64(*v)),
            Self::Decimal128(v) => Some(*v),
            _ => None,
        }
    }
}

/// Rewrite a numeric value into the smallest type that represents it:
/// int32 when exact, else int64 when exact, else double when the value is
/// within double range, else decimal. Non-numeric values pass through.
#[must_use]
pub fn normalize_numeric(value: &Value) -> Value {
    if !value.is_number() {
        return value.clone();
    }

    if let Some(exact) = value.as_i64_exact() {
        return i32::try_from(exact).map_or(Value::Int64(exact), Value::Int32);
    }

    match value {
        Value::Double(v) => Value::Double(*v),
        Value::Decimal128(d) if d.is_in_double_range() => Value::Double(d.to_f64()),
        other => other.clone(),
    }
}

fn double_to_i64_exact(value: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or above it overflows
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    if !value.is_finite() || value.fract() != 0.0 || !(-LIMIT..LIMIT).contains(&value) {
        return None;
    }

    Some(value as i64)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinKey => f.write_str("{ \"$minKey\" : 1 }"),
            Self::MaxKey => f.write_str("{ \"$maxKey\" : 1 }"),
            Self::Undefined => f.write_str("{ \"$undefined\" : true }"),
            Self::Null => f.write_str("null"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{{ \"$numberLong\" : \"{v}\" }}"),
            Self::Double(v) => {
                if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Self::Decimal128(v) => write!(f, "{{ \"$numberDecimal\" : \"{v}\" }}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Symbol(v) => write!(f, "{{ \"$symbol\" : {v:?} }}"),
            Self::Document(fields) => write_document(f, fields),
            Self::Array(items) => {
                f.write_str("[ ")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(" ]")
            }
            Self::Binary { subtype, bytes } => {
                write!(f, "{{ \"$binary\" : {{ \"hex\" : \"")?;
                write_hex(f, bytes)?;
                write!(f, "\", \"subType\" : \"{subtype:02x}\" }} }}")
            }
            Self::ObjectId(id) => {
                f.write_str("{ \"$oid\" : \"")?;
                write_hex(f, id)?;
                f.write_str("\" }")
            }
            Self::Bool(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{{ \"$date\" : {v} }}"),
            Self::Timestamp { time, increment } => {
                write!(f, "{{ \"$timestamp\" : {{ \"t\" : {time}, \"i\" : {increment} }} }}")
            }
            Self::Regex { pattern, options } => {
                write!(f, "{{ \"$regex\" : {pattern:?}, \"$options\" : {options:?} }}")
            }
            Self::DbPointer { namespace, id } => {
                write!(f, "{{ \"$dbPointer\" : {{ \"$ref\" : {namespace:?}, \"$id\" : \"")?;
                write_hex(f, id)?;
                f.write_str("\" } }")
            }
            Self::Code(code) => write!(f, "{{ \"$code\" : {code:?} }}"),
            Self::CodeWithScope { code, scope } => {
                write!(f, "{{ \"$code\" : {code:?}, \"$scope\" : ")?;
                write_document(f, scope)?;
                f.write_str(" }")
            }
        }
    }
}

fn write_document(f: &mut fmt::Formatter<'_>, fields: &[(String, Value)]) -> fmt::Result {
    if fields.is_empty() {
        return f.write_str("{ }");
    }

    f.write_str("{ ")?;
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key:?} : {value}")?;
    }
    f.write_str(" }")
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for byte in bytes {
        write!(f, "{byte:02x}")?;
    }
    Ok(())
}
