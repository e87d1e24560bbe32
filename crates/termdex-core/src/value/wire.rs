//! Binary document encoding.
//!
//! Documents are little-endian `i32` total length, a run of elements, and a
//! trailing NUL. Each element is a type code, a NUL-terminated key and the
//! value payload. Arrays are documents keyed `"0"`, `"1"`, ...

use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    value::{Decimal128, Document, Value, ValueTag},
};
use thiserror::Error as ThisError;

/// Smallest valid document: length prefix plus terminator.
pub const EMPTY_DOCUMENT_LEN: usize = 5;

///
/// WireError
///

#[derive(Debug, ThisError)]
pub enum WireError {
    #[error("buffer too short: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("invalid document length {declared} (buffer holds {available})")]
    BadLength { declared: i64, available: usize },

    #[error("unknown value type code 0x{0:02x}")]
    UnknownType(u8),

    #[error("missing string terminator at offset {0}")]
    MissingTerminator(usize),

    #[error("invalid utf-8 in string at offset {0}")]
    InvalidUtf8(usize),

    #[error("key or pattern contains an interior NUL: {0:?}")]
    InteriorNul(String),

    #[error("expected a single-element document, found {0} elements")]
    NotSingleElement(usize),

    #[error("{0} trailing bytes after document")]
    TrailingBytes(usize),
}

impl From<WireError> for InternalError {
    fn from(err: WireError) -> Self {
        let class = match err {
            WireError::InteriorNul(_) => ErrorClass::Encoding,
            _ => ErrorClass::Corruption,
        };

        Self::new(class, ErrorOrigin::Value, err.to_string())
    }
}

// ----------------------------------------------------------------------
// sizes
// ----------------------------------------------------------------------

/// Payload length of a value, excluding its type code and key.
#[must_use]
pub fn value_len(value: &Value) -> usize {
    match value {
        Value::MinKey | Value::MaxKey | Value::Undefined | Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int32(_) => 4,
        Value::Int64(_) | Value::Double(_) | Value::DateTime(_) | Value::Timestamp { .. } => 8,
        Value::Decimal128(_) => 16,
        Value::ObjectId(_) => 12,
        Value::Text(s) | Value::Symbol(s) | Value::Code(s) => string_len(s),
        Value::Document(fields) => document_len(fields),
        Value::Array(items) => array_len(items),
        Value::Binary { bytes, .. } => 4 + 1 + bytes.len(),
        Value::Regex { pattern, options } => pattern.len() + 1 + options.len() + 1,
        Value::DbPointer { namespace, .. } => string_len(namespace) + 12,
        Value::CodeWithScope { code, scope } => 4 + string_len(code) + document_len(scope),
    }
}

/// Full element length: type code, key, NUL and payload.
#[must_use]
pub fn element_len(key: &str, value: &Value) -> usize {
    1 + key.len() + 1 + value_len(value)
}

#[must_use]
pub fn document_len(fields: &[(String, Value)]) -> usize {
    EMPTY_DOCUMENT_LEN
        + fields
            .iter()
            .map(|(k, v)| element_len(k, v))
            .sum::<usize>()
}

#[must_use]
pub fn array_len(items: &[Value]) -> usize {
    EMPTY_DOCUMENT_LEN
        + items
            .iter()
            .enumerate()
            .map(|(i, v)| element_len(&i.to_string(), v))
            .sum::<usize>()
}

const fn string_len(s: &str) -> usize {
    4 + s.len() + 1
}

// ----------------------------------------------------------------------
// encoding
// ----------------------------------------------------------------------

/// Encode `{key: value}` as a standalone document.
pub fn encode_single(key: &str, value: &Value) -> Result<Vec<u8>, WireError> {
    let mut writer = DocumentWriter::new();
    writer.append(key, value)?;

    Ok(writer.finish())
}

pub fn encode_document(fields: &[(String, Value)]) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::with_capacity(document_len(fields));
    write_document(&mut buf, fields)?;

    Ok(buf)
}

///
/// DocumentWriter
///
/// Incremental document builder. `len()` reports the size the document
/// would have if finished now.
///

#[derive(Debug)]
pub struct DocumentWriter {
    buf: Vec<u8>,
}

impl DocumentWriter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: vec![0; 4],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len() + 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.len() == 4
    }

    pub fn append(&mut self, key: &str, value: &Value) -> Result<(), WireError> {
        write_element(&mut self.buf, key, value)
    }

    /// Append a nested document built by another writer.
    pub fn append_document(&mut self, key: &str, nested: Self) -> Result<(), WireError> {
        self.append_raw(ValueTag::Document, key, &nested.finish())
    }

    /// Append a nested array built by another writer (keys must be indexes).
    pub fn append_array(&mut self, key: &str, nested: Self) -> Result<(), WireError> {
        self.append_raw(ValueTag::Array, key, &nested.finish())
    }

    fn append_raw(&mut self, tag: ValueTag, key: &str, payload: &[u8]) -> Result<(), WireError> {
        self.buf.push(tag.to_u8());
        write_cstring(&mut self.buf, key)?;
        self.buf.extend_from_slice(payload);

        Ok(())
    }

    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.push(0);
        let len = self.buf.len() as i32;
        self.buf[..4].copy_from_slice(&len.to_le_bytes());

        self.buf
    }
}

impl Default for DocumentWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn write_document(buf: &mut Vec<u8>, fields: &[(String, Value)]) -> Result<(), WireError> {
    let start = buf.len();
    buf.extend_from_slice(&[0; 4]);
    for (key, value) in fields {
        write_element(buf, key, value)?;
    }
    buf.push(0);
    patch_len(buf, start);

    Ok(())
}

fn write_array(buf: &mut Vec<u8>, items: &[Value]) -> Result<(), WireError> {
    let start = buf.len();
    buf.extend_from_slice(&[0; 4]);
    for (i, value) in items.iter().enumerate() {
        write_element(buf, &i.to_string(), value)?;
    }
    buf.push(0);
    patch_len(buf, start);

    Ok(())
}

fn patch_len(buf: &mut [u8], start: usize) {
    let len = (buf.len() - start) as i32;
    buf[start..start + 4].copy_from_slice(&len.to_le_bytes());
}

fn write_element(buf: &mut Vec<u8>, key: &str, value: &Value) -> Result<(), WireError> {
    buf.push(value.tag().to_u8());
    write_cstring(buf, key)?;
    write_value(buf, value)
}

fn write_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), WireError> {
    match value {
        Value::MinKey | Value::MaxKey | Value::Undefined | Value::Null => {}
        Value::Bool(v) => buf.push(u8::from(*v)),
        Value::Int32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Int64(v) | Value::DateTime(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Double(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Decimal128(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::ObjectId(id) => buf.extend_from_slice(id),
        Value::Timestamp { time, increment } => {
            buf.extend_from_slice(&increment.to_le_bytes());
            buf.extend_from_slice(&time.to_le_bytes());
        }
        Value::Text(s) | Value::Symbol(s) | Value::Code(s) => write_string(buf, s),
        Value::Document(fields) => write_document(buf, fields)?,
        Value::Array(items) => write_array(buf, items)?,
        Value::Binary { subtype, bytes } => {
            buf.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
            buf.push(*subtype);
            buf.extend_from_slice(bytes);
        }
        Value::Regex { pattern, options } => {
            write_cstring(buf, pattern)?;
            write_cstring(buf, options)?;
        }
        Value::DbPointer { namespace, id } => {
            write_string(buf, namespace);
            buf.extend_from_slice(id);
        }
        Value::CodeWithScope { code, scope } => {
            let start = buf.len();
            buf.extend_from_slice(&[0; 4]);
            write_string(buf, code);
            write_document(buf, scope)?;
            patch_len(buf, start);
        }
    }

    Ok(())
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&((s.len() + 1) as i32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

fn write_cstring(buf: &mut Vec<u8>, s: &str) -> Result<(), WireError> {
    if s.as_bytes().contains(&0) {
        return Err(WireError::InteriorNul(s.to_string()));
    }
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);

    Ok(())
}

// ----------------------------------------------------------------------
// decoding
// ----------------------------------------------------------------------

/// Decode a document that spans the whole buffer.
pub fn decode_document(bytes: &[u8]) -> Result<Document, WireError> {
    let mut reader = Reader::new(bytes);
    let fields = reader.document()?;
    if reader.remaining() > 0 {
        return Err(WireError::TrailingBytes(reader.remaining()));
    }

    Ok(fields)
}

/// Decode a `{key: value}` document with exactly one element.
pub fn decode_single(bytes: &[u8]) -> Result<(String, Value), WireError> {
    let mut fields = decode_document(bytes)?;
    if fields.len() != 1 {
        return Err(WireError::NotSingleElement(fields.len()));
    }

    fields.pop().ok_or(WireError::NotSingleElement(0))
}

/// Declared length of the document at the start of `bytes`.
pub fn peek_document_len(bytes: &[u8]) -> Result<usize, WireError> {
    Reader::new(bytes).document_header()
}

///
/// Reader
///
/// Bounds-checked cursor over encoded bytes.
///

#[derive(Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;

        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);

        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    fn i32(&mut self) -> Result<i32, WireError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, WireError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn cstring(&mut self) -> Result<String, WireError> {
        let start = self.pos;
        let rest = &self.bytes[start..];
        let end = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(WireError::MissingTerminator(start))?;
        let text = std::str::from_utf8(&rest[..end]).map_err(|_| WireError::InvalidUtf8(start))?;
        self.pos += end + 1;

        Ok(text.to_string())
    }

    fn string(&mut self) -> Result<String, WireError> {
        let start = self.pos;
        let declared = self.i32()?;
        let len = usize::try_from(declared)
            .ok()
            .filter(|len| *len >= 1)
            .ok_or(WireError::BadLength {
                declared: i64::from(declared),
                available: self.remaining(),
            })?;
        let raw = self.take(len)?;
        if raw[len - 1] != 0 {
            return Err(WireError::MissingTerminator(start));
        }
        let text =
            std::str::from_utf8(&raw[..len - 1]).map_err(|_| WireError::InvalidUtf8(start))?;

        Ok(text.to_string())
    }

    fn document_header(&mut self) -> Result<usize, WireError> {
        let declared = self.i32()?;
        let available = self.remaining() + 4;
        usize::try_from(declared)
            .ok()
            .filter(|len| *len >= EMPTY_DOCUMENT_LEN && *len <= available)
            .ok_or(WireError::BadLength {
                declared: i64::from(declared),
                available,
            })
    }

    /// Read one document, checking its declared length and terminator.
    pub fn document(&mut self) -> Result<Document, WireError> {
        let start = self.pos;
        let len = self.document_header()?;
        let end = start + len;

        let mut fields = Vec::new();
        while self.pos < end - 1 {
            fields.push(self.element()?);
        }
        if self.pos != end - 1 || self.u8()? != 0 {
            return Err(WireError::MissingTerminator(end - 1));
        }

        Ok(fields)
    }

    /// Read one element: type code, key and value.
    pub fn element(&mut self) -> Result<(String, Value), WireError> {
        let code = self.u8()?;
        let tag = ValueTag::from_u8(code).ok_or(WireError::UnknownType(code))?;
        let key = self.cstring()?;
        let value = self.value(tag)?;

        Ok((key, value))
    }

    fn value(&mut self, tag: ValueTag) -> Result<Value, WireError> {
        let value = match tag {
            ValueTag::MinKey => Value::MinKey,
            ValueTag::MaxKey => Value::MaxKey,
            ValueTag::Undefined => Value::Undefined,
            ValueTag::Null => Value::Null,
            ValueTag::Bool => Value::Bool(self.u8()? != 0),
            ValueTag::Int32 => Value::Int32(self.i32()?),
            ValueTag::Int64 => Value::Int64(self.i64()?),
            ValueTag::DateTime => Value::DateTime(self.i64()?),
            ValueTag::Double => Value::Double(f64::from_le_bytes(self.array()?)),
            ValueTag::Decimal128 => Value::Decimal128(Decimal128::from_le_bytes(self.array()?)),
            ValueTag::ObjectId => Value::ObjectId(self.array()?),
            ValueTag::Timestamp => {
                let increment = self.u32()?;
                let time = self.u32()?;
                Value::Timestamp { time, increment }
            }
            ValueTag::Text => Value::Text(self.string()?),
            ValueTag::Symbol => Value::Symbol(self.string()?),
            ValueTag::Code => Value::Code(self.string()?),
            ValueTag::Document => Value::Document(self.document()?),
            ValueTag::Array => Value::Array(self.document()?.into_iter().map(|(_, v)| v).collect()),
            ValueTag::Binary => {
                let declared = self.i32()?;
                let len = usize::try_from(declared).map_err(|_| WireError::BadLength {
                    declared: i64::from(declared),
                    available: self.remaining(),
                })?;
                let subtype = self.u8()?;
                Value::Binary {
                    subtype,
                    bytes: self.take(len)?.to_vec(),
                }
            }
            ValueTag::Regex => Value::Regex {
                pattern: self.cstring()?,
                options: self.cstring()?,
            },
            ValueTag::DbPointer => Value::DbPointer {
                namespace: self.string()?,
                id: self.array()?,
            },
            ValueTag::CodeWithScope => {
                let _total = self.i32()?;
                let code = self.string()?;
                let scope = self.document()?;
                Value::CodeWithScope { code, scope }
            }
        };

        Ok(value)
    }
}
